use crate::analysis::ranking::PairCorrelation;
use crate::data::labels::{normalize_label, LabelMapping};

/// Persona the completion service is asked to adopt.
pub const SYSTEM_PERSONA: &str = "Eres un experto en análisis de datos.";

/// Instruction placed above the correlation listing.
pub const INSTRUCTION: &str =
    "Analiza las siguientes correlaciones en una encuesta sobre juventudes y ofrece insights clave:";

/// The two messages of a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativePrompt {
    pub system: String,
    pub user: String,
}

/// One `left<TAB>right<TAB>coefficient` line per ranked pair, by identifier.
pub fn render_pairs(ranked: &[PairCorrelation]) -> String {
    ranked
        .iter()
        .map(|pair| format!("{}\t{}\t{:.4}\n", pair.left, pair.right, pair.coefficient))
        .collect()
}

/// `left ↔ right: r` with tab-free labels.
fn labelled_line(left: &str, right: &str, coefficient: &str) -> String {
    format!("{} ↔ {}: {coefficient}", normalize_label(left), normalize_label(right))
}

/// Ranked pairs rendered straight from their identifiers' display labels.
pub fn render_labelled_pairs(ranked: &[PairCorrelation], mapping: &LabelMapping) -> String {
    let shown = |id: &str| mapping.label_for(id).unwrap_or(id).to_string();
    ranked
        .iter()
        .map(|pair| {
            let r = format!("{:.4}", pair.coefficient);
            labelled_line(&shown(&pair.left), &shown(&pair.right), &r) + "\n"
        })
        .collect()
}

/// Rewrite identifier pair lines of [`render_pairs`] into labelled lines.
///
/// Only whole fields are looked up, so `q1` never matches inside `q10`.
/// Rewritten lines contain no tabs and are not touched by a second pass.
pub fn substitute_labels(text: &str, mapping: &LabelMapping) -> String {
    text.split('\n')
        .map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            match fields.as_slice() {
                &[left, right, r] => {
                    let left = mapping.label_for(left).unwrap_or(left);
                    let right = mapping.label_for(right).unwrap_or(right);
                    labelled_line(left, right, r)
                }
                _ => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full prompt for the ranked list, with identifiers shown as labels.
pub fn build_prompt(ranked: &[PairCorrelation], mapping: &LabelMapping) -> NarrativePrompt {
    let listing = render_labelled_pairs(ranked, mapping);
    NarrativePrompt {
        system: SYSTEM_PERSONA.to_string(),
        user: format!("{INSTRUCTION}\n\n{listing}"),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn pair(left: &str, right: &str, coefficient: f64) -> PairCorrelation {
        PairCorrelation {
            left: left.into(),
            right: right.into(),
            coefficient,
        }
    }

    fn mapping(pairs: &[(&str, &str)]) -> LabelMapping {
        LabelMapping::from_parallel(
            pairs.iter().map(|(id, _)| id.to_string()).collect(),
            pairs.iter().map(|(_, l)| Some(l.to_string())).collect(),
        )
        .unwrap()
    }

    #[test]
    fn renders_one_line_per_pair() {
        let text = render_pairs(&[pair("q1", "q2", 0.81234), pair("q1", "q3", f64::NAN)]);
        assert_eq!(text, "q1\tq2\t0.8123\nq1\tq3\tNaN\n");
    }

    #[test]
    fn identifiers_are_replaced_by_whole_field_only() {
        let m = mapping(&[("q1", "Edad"), ("q10", "Ingreso")]);
        let text = render_pairs(&[pair("q1", "q10", 0.5)]);
        assert_eq!(substitute_labels(&text, &m), "Edad ↔ Ingreso: 0.5000\n");
    }

    #[test]
    fn labels_that_look_like_identifiers_do_not_swap_columns() {
        let m = mapping(&[("q1", "q2"), ("q2", "Ingreso")]);
        let text = render_pairs(&[pair("q1", "q2", 0.5)]);
        let once = substitute_labels(&text, &m);
        assert_eq!(once, "q2 ↔ Ingreso: 0.5000\n");
        assert_eq!(substitute_labels(&once, &m), once);
    }

    #[test]
    fn prompt_wraps_listing_in_instruction() {
        let m = mapping(&[("q1", "Age Group"), ("q2", "Income Bracket")]);
        let prompt = build_prompt(&[pair("q1", "q2", -0.25)], &m);
        assert_eq!(prompt.system, SYSTEM_PERSONA);
        assert!(prompt.user.starts_with(INSTRUCTION));
        assert!(prompt.user.ends_with("Age Group ↔ Income Bracket: -0.2500\n"));
        assert!(!prompt.user.contains("q1"));
    }

    proptest! {
        #[test]
        fn substitution_matches_direct_rendering_and_is_idempotent(
            labels in prop::collection::vec("[a-zA-Z0-9 ]{1,12}", 2..8),
            picks in prop::collection::vec((0usize..8, 0usize..8, -1.0..1.0f64), 1..10),
        ) {
            let ids: Vec<String> = (0..labels.len()).map(|i| format!("q{}", i + 1)).collect();
            let m = LabelMapping::from_parallel(
                ids.clone(),
                labels.iter().cloned().map(Some).collect(),
            )
            .unwrap();
            let ranked: Vec<_> = picks
                .iter()
                .map(|(a, b, r)| pair(&ids[a % ids.len()], &ids[b % ids.len()], *r))
                .collect();
            let once = substitute_labels(&render_pairs(&ranked), &m);
            prop_assert_eq!(&once, &render_labelled_pairs(&ranked, &m));
            prop_assert_eq!(substitute_labels(&once, &m), once);
        }
    }
}
