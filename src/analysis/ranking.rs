use std::cmp::Ordering;

use super::correlation::CorrelationMatrix;

/// How many pairs are reported and sent for interpretation.
pub const TOP_PAIRS: usize = 10;

/// Correlation between two distinct columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PairCorrelation {
    pub left: String,
    pub right: String,
    pub coefficient: f64,
}

/// Flatten the matrix to unique unordered pairs, strongest positive first.
///
/// Self-pairs and mirrored `(B, A)` entries are dropped. The sort is stable
/// over row-major order, and undefined (`NaN`) coefficients sort last.
pub fn rank_pairs(matrix: &CorrelationMatrix, limit: usize) -> Vec<PairCorrelation> {
    let names = matrix.names();
    let mut pairs: Vec<PairCorrelation> = (0..names.len())
        .flat_map(|i| ((i + 1)..names.len()).map(move |j| (i, j)))
        .map(|(i, j)| PairCorrelation {
            left: names[i].clone(),
            right: names[j].clone(),
            coefficient: matrix.get(i, j),
        })
        .collect();

    pairs.sort_by(|a, b| descending_nan_last(a.coefficient, b.coefficient));
    pairs.truncate(limit);
    pairs
}

fn descending_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
