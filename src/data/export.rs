use std::io::Write;

use anyhow::{Context, Result};

use super::sav::SavFile;

// ---------------------------------------------------------------------------
// Variable / description listing
// ---------------------------------------------------------------------------

pub const VARIABLE_HEADER: &str = "Variable";
pub const DESCRIPTION_HEADER: &str = "Descripción";

/// Write a two-column CSV (`Variable`, `Descripción`), one row per column.
///
/// Returns the number of rows written.
pub fn write_label_csv<'a, W, I>(writer: W, rows: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = csv::Writer::from_writer(writer);
    out.write_record([VARIABLE_HEADER, DESCRIPTION_HEADER])
        .context("writing CSV header")?;
    let mut n = 0;
    for (name, description) in rows {
        out.write_record([name, description])
            .with_context(|| format!("writing row for {name}"))?;
        n += 1;
    }
    out.flush().context("flushing CSV output")?;
    Ok(n)
}

/// Raw variable names and labels of a system file. Unlabelled variables
/// get an empty description rather than their name.
pub fn sav_label_rows(file: &SavFile) -> Vec<(String, String)> {
    file.variables
        .iter()
        .map(|v| (v.name.clone(), v.label.clone().unwrap_or_default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::labels::LabelMapping;
    use crate::data::sav::tests::{SavBuilder, Var};

    #[test]
    fn writes_header_and_one_row_per_variable() {
        let mapping = LabelMapping::from_parallel(
            vec!["q1".into(), "q2".into()],
            vec![Some("Edad, en años".into()), None],
        )
        .unwrap();

        let mut buf = Vec::new();
        let n = write_label_csv(&mut buf, mapping.iter()).unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Variable,Descripción\nq1,\"Edad, en años\"\nq2,q2\n"
        );
    }

    #[test]
    fn sav_rows_keep_unlabelled_variables_blank() {
        let bytes = SavBuilder::new(false, false)
            .variable(Var::Num {
                name: "P1",
                label: Some("¿Cuántos años tienes?"),
                format: 0x0005_0802,
            })
            .variable(Var::Num {
                name: "P2",
                label: None,
                format: 0x0005_0802,
            })
            .case(vec![SavBuilder::num(19.0), SavBuilder::num(2.0)])
            .build();
        let file = SavFile::parse(&bytes).unwrap();

        let rows = sav_label_rows(&file);
        assert_eq!(
            rows,
            vec![
                ("P1".to_string(), "¿Cuántos años tienes?".to_string()),
                ("P2".to_string(), String::new()),
            ]
        );

        let mut buf = Vec::new();
        write_label_csv(&mut buf, rows.iter().map(|(n, d)| (n.as_str(), d.as_str()))).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Variable,Descripción\nP1,¿Cuántos años tienes?\nP2,\n"
        );
    }
}
