use std::fmt;

use anyhow::{bail, Result};

// ---------------------------------------------------------------------------
// Value – a single cell of a column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring the dtypes survey tools produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// ISO-8601 date / date-time kept as text.
    Date(String),
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:.4}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Null => write!(f, "<null>"),
        }
    }
}

impl Value {
    /// Numeric view of the cell; `None` for missing and non-numeric cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) if v.is_finite() => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Column – one named variable
// ---------------------------------------------------------------------------

/// Storage type of a whole column, inferred from its non-missing cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Bool,
    Date,
    Text,
}

impl ColumnKind {
    /// Only integer and floating-point columns take part in correlations.
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    /// Infer the kind of a column.
    ///
    /// An all-missing column is `Float`, the same way a column of NaNs is a
    /// float column in a data frame. Mixed numeric and text cells are `Text`.
    pub fn infer(values: &[Value]) -> Self {
        let mut kind: Option<ColumnKind> = None;
        for v in values {
            let cell = match v {
                Value::Null => continue,
                Value::Integer(_) => ColumnKind::Integer,
                Value::Float(_) => ColumnKind::Float,
                Value::Bool(_) => ColumnKind::Bool,
                Value::Date(_) => ColumnKind::Date,
                Value::String(_) => ColumnKind::Text,
            };
            kind = Some(match (kind, cell) {
                (None, c) => c,
                (Some(k), c) if k == c => k,
                (Some(ColumnKind::Integer), ColumnKind::Float)
                | (Some(ColumnKind::Float), ColumnKind::Integer) => ColumnKind::Float,
                _ => return ColumnKind::Text,
            });
        }
        kind.unwrap_or(ColumnKind::Float)
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    /// Internal identifier (header / SPSS variable name).
    pub name: String,
    pub values: Vec<Value>,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        let kind = ColumnKind::infer(&values);
        Column {
            name: name.into(),
            values,
            kind,
        }
    }

    /// Numeric cells with missing values as `None`.
    pub fn numeric_values(&self) -> Vec<Option<f64>> {
        self.values.iter().map(Value::as_f64).collect()
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// Ordered collection of equally long columns.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset, rejecting ragged columns.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, |c| c.values.len());
        for col in &columns {
            if col.values.len() != n_rows {
                bail!(
                    "column '{}' has {} rows, expected {n_rows}",
                    col.name,
                    col.values.len()
                );
            }
        }
        Ok(Dataset { columns, n_rows })
    }

    /// Transpose row-oriented cells into columns.
    ///
    /// Rows shorter than the header are padded with missing values.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let width = headers.len();
        let mut columns: Vec<Vec<Value>> = (0..width).map(|_| Vec::with_capacity(rows.len())).collect();
        for (row_no, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                bail!("row {row_no} has {} cells but only {width} headers", row.len());
            }
            row.resize(width, Value::Null);
            for (col, cell) in columns.iter_mut().zip(row) {
                col.push(cell);
            }
        }
        let columns = headers
            .into_iter()
            .zip(columns)
            .map(|(name, values)| Column::new(name, values))
            .collect();
        Dataset::from_columns(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.n_rows
    }

    /// Whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_inference_follows_dtype_rules() {
        let ints = vec![Value::Integer(1), Value::Null, Value::Integer(3)];
        assert_eq!(ColumnKind::infer(&ints), ColumnKind::Integer);

        let mixed = vec![Value::Integer(1), Value::Float(2.5)];
        assert_eq!(ColumnKind::infer(&mixed), ColumnKind::Float);

        let text = vec![Value::Integer(1), Value::String("x".into())];
        assert_eq!(ColumnKind::infer(&text), ColumnKind::Text);

        assert_eq!(ColumnKind::infer(&[Value::Null, Value::Null]), ColumnKind::Float);
        assert!(!ColumnKind::infer(&[Value::Bool(true)]).is_numeric());
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let a = Column::new("a", vec![Value::Integer(1)]);
        let b = Column::new("b", vec![]);
        assert!(Dataset::from_columns(vec![a, b]).is_err());
    }

    #[test]
    fn short_rows_are_padded() {
        let ds = Dataset::from_rows(
            vec!["a".into(), "b".into()],
            vec![vec![Value::Integer(1)], vec![Value::Integer(2), Value::Integer(3)]],
        )
        .unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.column("b").unwrap().values[0], Value::Null);
    }
}
