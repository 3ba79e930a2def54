// ---------------------------------------------------------------------------
// Pairwise-complete Pearson correlation
// ---------------------------------------------------------------------------

/// Square, symmetric matrix of correlation coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    names: Vec<String>,
    /// Row-major `n × n` coefficients.
    values: Vec<f64>,
}

impl CorrelationMatrix {
    /// Column identifiers, in matrix order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn size(&self) -> usize {
        self.names.len()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.size() + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let n = self.size();
        &self.values[row * n..(row + 1) * n]
    }
}

/// Correlate every pair of columns.
///
/// Each pair only uses rows where both cells are present, independently of
/// the other pairs. Pairs with fewer than two such rows, or with a constant
/// side, are `NaN`. The diagonal is exactly 1.
pub fn pearson_matrix(columns: &[(String, Vec<Option<f64>>)]) -> CorrelationMatrix {
    let n = columns.len();
    let mut values = vec![f64::NAN; n * n];
    for i in 0..n {
        values[i * n + i] = 1.0;
        for j in (i + 1)..n {
            let r = pairwise_pearson(&columns[i].1, &columns[j].1);
            values[i * n + j] = r;
            values[j * n + i] = r;
        }
    }
    CorrelationMatrix {
        names: columns.iter().map(|(name, _)| name.clone()).collect(),
        values,
    }
}

/// Pearson coefficient over the rows where both `a` and `b` are present.
pub fn pairwise_pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let count = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / count;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / count;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return f64::NAN;
    }
    (sxy / denom).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn col(name: &str, values: &[Option<f64>]) -> (String, Vec<Option<f64>>) {
        (name.to_string(), values.to_vec())
    }

    #[test]
    fn perfect_and_inverse_relationships() {
        let x = [Some(1.0), Some(2.0), Some(3.0)];
        let up = [Some(2.0), Some(4.0), Some(6.0)];
        let down = [Some(3.0), Some(2.0), Some(1.0)];
        assert!((pairwise_pearson(&x, &up) - 1.0).abs() < 1e-12);
        assert!((pairwise_pearson(&x, &down) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_rows_are_dropped_per_pair() {
        // Row 3 is missing in `b` only; the a–c pair still uses it.
        let a = col("a", &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
        let b = col("b", &[Some(1.0), Some(2.0), Some(3.0), None]);
        let c = col("c", &[Some(1.0), Some(2.0), Some(3.0), Some(-10.0)]);
        let m = pearson_matrix(&[a, b, c]);

        assert!((m.get(0, 1) - 1.0).abs() < 1e-12);
        assert!(m.get(0, 2) < 0.0);
        assert!((m.get(1, 2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_pairs_are_nan_but_diagonal_is_one() {
        let constant = col("k", &[Some(5.0), Some(5.0), Some(5.0)]);
        let x = col("x", &[Some(1.0), Some(2.0), Some(3.0)]);
        let m = pearson_matrix(&[constant, x]);
        assert!(m.get(0, 1).is_nan());
        assert_eq!(m.get(0, 0), 1.0);
        assert_eq!(m.row(1), &[m.get(1, 0), 1.0]);

        assert!(pairwise_pearson(&[Some(1.0), None], &[Some(2.0), Some(3.0)]).is_nan());
    }

    #[test]
    fn survey_example_matrix() {
        let m = pearson_matrix(&[
            col("age", &[Some(25.0), Some(30.0), Some(40.0)]),
            col("income", &[Some(50000.0), Some(60000.0), Some(40000.0)]),
            col("score", &[Some(7.0), Some(8.0), Some(5.0)]),
        ]);
        assert_eq!(m.size(), 3);
        for i in 0..3 {
            assert_eq!(m.get(i, i), 1.0);
        }
        // income and score move together.
        assert!(m.get(1, 2) > 0.95);
        assert!((m.get(0, 1) - m.get(1, 0)).abs() < 1e-15);
    }

    fn column_strategy(rows: usize) -> impl Strategy<Value = Vec<Option<f64>>> {
        prop::collection::vec(prop::option::weighted(0.85, -1.0e3..1.0e3f64), rows)
    }

    proptest! {
        #[test]
        fn matrix_is_symmetric_with_unit_diagonal(
            cols in (2usize..6, 3usize..30).prop_flat_map(|(n, rows)| {
                prop::collection::vec(column_strategy(rows), n)
            })
        ) {
            let named: Vec<_> = cols
                .into_iter()
                .enumerate()
                .map(|(i, c)| (format!("v{i}"), c))
                .collect();
            let m = pearson_matrix(&named);
            for i in 0..m.size() {
                prop_assert_eq!(m.get(i, i), 1.0);
                for j in 0..m.size() {
                    let (a, b) = (m.get(i, j), m.get(j, i));
                    prop_assert!(a.to_bits() == b.to_bits());
                    prop_assert!(a.is_nan() || (-1.0..=1.0).contains(&a));
                }
            }
        }

        #[test]
        fn argument_order_does_not_matter(
            a in column_strategy(12),
            b in column_strategy(12),
        ) {
            let ab = pairwise_pearson(&a, &b);
            let ba = pairwise_pearson(&b, &a);
            prop_assert!(ab.to_bits() == ba.to_bits() || (ab - ba).abs() < 1e-12);
        }
    }
}
