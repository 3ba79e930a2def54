//! Correlation layer: restrict to numeric columns, correlate, rank.
//!
//! ```text
//!   Dataset + selected identifiers
//!        │
//!        ▼
//!   ┌─────────────┐
//!   │ correlation  │  pairwise-complete Pearson matrix
//!   └─────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ ranking   │  unique pairs, strongest first, top N
//!   └──────────┘
//! ```

pub mod correlation;
pub mod ranking;

use crate::data::model::Dataset;
use crate::error::AnalysisError;

use self::correlation::{pearson_matrix, CorrelationMatrix};
use self::ranking::{rank_pairs, PairCorrelation, TOP_PAIRS};

/// Everything derived from one "analyze" request.
#[derive(Debug, Clone)]
pub struct CorrelationSummary {
    pub matrix: CorrelationMatrix,
    pub ranked: Vec<PairCorrelation>,
    /// Selected identifiers left out because they are not numeric.
    pub skipped: Vec<String>,
}

/// Correlate the numeric columns among `identifiers`.
pub fn summarize(dataset: &Dataset, identifiers: &[String]) -> Result<CorrelationSummary, AnalysisError> {
    let mut numeric = Vec::with_capacity(identifiers.len());
    let mut skipped = Vec::new();

    for id in identifiers {
        let column = dataset
            .column(id)
            .ok_or_else(|| AnalysisError::UnknownColumn(id.clone()))?;
        if column.kind.is_numeric() {
            numeric.push((column.name.clone(), column.numeric_values()));
        } else {
            skipped.push(column.name.clone());
        }
    }

    if numeric.is_empty() {
        return Err(AnalysisError::NoNumericVariables);
    }
    if !skipped.is_empty() {
        log::info!("skipping non-numeric variables: {skipped:?}");
    }

    let matrix = pearson_matrix(&numeric);
    let ranked = rank_pairs(&matrix, TOP_PAIRS);
    log::info!(
        "correlated {} variables over {} rows, {} ranked pairs",
        matrix.size(),
        dataset.len(),
        ranked.len()
    );

    Ok(CorrelationSummary {
        matrix,
        ranked,
        skipped,
    })
}
