use super::labels::LabelMapping;

// ---------------------------------------------------------------------------
// Variable list search
// ---------------------------------------------------------------------------

/// Labels to show in the variable list for the given search text.
///
/// Matching is a case-insensitive substring test against both the display
/// label and the identifier; an empty (or blank) query shows everything.
pub fn visible_labels<'a>(mapping: &'a LabelMapping, query: &str) -> Vec<&'a str> {
    let needle = query.trim().to_lowercase();
    mapping
        .iter()
        .filter(|(id, label)| {
            needle.is_empty()
                || label.to_lowercase().contains(&needle)
                || id.to_lowercase().contains(&needle)
        })
        .map(|(_, label)| label)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_matches_label_or_identifier() {
        let mapping = LabelMapping::from_parallel(
            vec!["p12".into(), "p13".into(), "sexo".into()],
            vec![Some("Nivel educativo".into()), Some("Ingreso mensual".into()), None],
        )
        .unwrap();

        assert_eq!(visible_labels(&mapping, "").len(), 3);
        assert_eq!(visible_labels(&mapping, "INGRESO"), vec!["Ingreso mensual"]);
        assert_eq!(visible_labels(&mapping, "p12"), vec!["Nivel educativo"]);
        assert!(visible_labels(&mapping, "zzz").is_empty());
    }
}
