use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::labels::LabelMapping;
use super::model::{Dataset, Value};
use super::{sav, xlsx};
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Which reader produced a [`LoadedSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Excel,
    Spss,
}

impl SourceFormat {
    /// Pick a reader purely from the file extension (no content sniffing).
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "xlsx" => Ok(SourceFormat::Excel),
            "sav" => Ok(SourceFormat::Spss),
            other => Err(LoadError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// A dataset together with the labels the user picks variables by.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub dataset: Dataset,
    pub labels: LabelMapping,
}

/// Load a survey dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`  – header row followed by data rows
/// * `.xlsx` – first worksheet, first row is the header
/// * `.sav`  – SPSS system file; variable labels become display labels
pub fn load_file(path: &Path) -> Result<LoadedSource, LoadError> {
    let format = SourceFormat::from_path(path)?;

    let (dataset, labels) = match format {
        SourceFormat::Csv => {
            let dataset = load_csv(File::open(path).map_err(|e| io_error(path, e))?)
                .map_err(LoadError::malformed)?;
            let labels = LabelMapping::identity(&dataset.column_names())?;
            (dataset, labels)
        }
        SourceFormat::Excel => {
            let dataset = xlsx::read_first_sheet(File::open(path).map_err(|e| io_error(path, e))?)
                .map_err(LoadError::malformed)?;
            let labels = LabelMapping::identity(&dataset.column_names())?;
            (dataset, labels)
        }
        SourceFormat::Spss => {
            let bytes = std::fs::read(path).map_err(|e| io_error(path, e))?;
            let file = sav::SavFile::parse(&bytes)?;
            let labels = LabelMapping::from_parallel(file.column_names(), file.column_labels())?;
            (file.dataset, labels)
        }
    };

    log::info!(
        "Loaded {} ({:?}): {} rows, {} columns",
        path.display(),
        format,
        dataset.len(),
        dataset.columns().len()
    );

    Ok(LoadedSource {
        path: path.to_path_buf(),
        format,
        dataset,
        labels,
    })
}

fn io_error(path: &Path, source: std::io::Error) -> LoadError {
    LoadError::Io {
        path: path.display().to_string(),
        source,
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one record per respondent.
pub fn load_csv<R: Read>(input: R) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = unique_headers(
        reader
            .headers()
            .context("reading CSV headers")?
            .iter()
            .map(|h| h.to_string()),
    );

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(record.iter().map(guess_value_type).collect());
    }

    Dataset::from_rows(headers, rows).context("assembling CSV columns")
}

/// Tokens read as missing, matching the usual data-frame defaults.
const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A", "#NA",
    "<NA>", "1.#QNAN", "1.#IND", "-1.#QNAN", "-1.#IND",
];

pub(crate) fn guess_value_type(raw: &str) -> Value {
    let s = raw.trim();
    if NA_TOKENS.contains(&s) {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    match s {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Make header names unique: blanks become `Unnamed: {i}`, repeats get
/// `.1`, `.2`, … suffixes.
pub(crate) fn unique_headers(raw: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for (i, name) in raw.enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {i}")
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::data::model::ColumnKind;

    #[test]
    fn csv_infers_numeric_and_text_columns() {
        let data = "age,income,city\n25,50000.5,Lima\n30,,Quito\n40,40000,NA\n";
        let ds = load_csv(data.as_bytes()).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.column("age").unwrap().kind, ColumnKind::Integer);
        assert_eq!(ds.column("income").unwrap().kind, ColumnKind::Float);
        assert_eq!(ds.column("income").unwrap().values[1], Value::Null);
        assert_eq!(ds.column("city").unwrap().kind, ColumnKind::Text);
        assert_eq!(ds.column("city").unwrap().values[2], Value::Null);
    }

    #[test]
    fn duplicate_and_blank_headers_are_made_unique() {
        let headers = unique_headers(["a", "a", "", "a"].iter().map(|s| s.to_string()));
        assert_eq!(headers, vec!["a", "a.1", "Unnamed: 2", "a.2"]);
    }

    #[test]
    fn overlong_rows_are_malformed() {
        assert!(load_csv("a,b\n1,2,3\n".as_bytes()).is_err());
    }

    #[test]
    fn load_file_builds_identity_labels_for_csv() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "age,income,score\n25,50000,7\n30,60000,8\n40,40000,5\n").unwrap();

        let source = load_file(file.path()).unwrap();
        assert_eq!(source.format, SourceFormat::Csv);
        assert_eq!(source.dataset.len(), 3);
        assert_eq!(
            source.labels.labels().collect::<Vec<_>>(),
            vec!["age", "income", "score"]
        );
    }

    #[test]
    fn load_file_uses_spss_variable_labels() {
        use crate::data::sav::tests::{SavBuilder, Var};

        let bytes = SavBuilder::new(false, false)
            .variable(Var::Num {
                name: "q1",
                label: Some("Age Group"),
                format: 0x0005_0802,
            })
            .variable(Var::Num {
                name: "q2",
                label: Some("Income Bracket"),
                format: 0x0005_0802,
            })
            .case(vec![SavBuilder::num(1.0), SavBuilder::num(3.0)])
            .build();
        let mut file = tempfile::Builder::new().suffix(".sav").tempfile().unwrap();
        file.write_all(&bytes).unwrap();

        let source = load_file(file.path()).unwrap();
        assert_eq!(source.format, SourceFormat::Spss);
        assert_eq!(
            source.labels.resolve(&["Age Group", "Income Bracket"]).unwrap(),
            vec!["q1", "q2"]
        );
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = load_file(Path::new("survey.parquet")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(ext) if ext == "parquet"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
