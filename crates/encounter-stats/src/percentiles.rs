//! Nearest-rank percentiles.

/// Computes a single percentile value from sorted data.
///
/// Uses the nearest-rank method: for n values, the k-th percentile is the
/// value at position `floor(n * k / 100)`, clamped to the last index.
///
/// Returns `f64::NAN` if the input is empty.
///
/// # Examples
///
/// ```
/// use encounter_stats::percentiles::compute_percentile;
///
/// let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(compute_percentile(&values, 50.0), 3.0);
/// assert_eq!(compute_percentile(&values, 25.0), 2.0);
/// assert_eq!(compute_percentile(&values, 100.0), 5.0);
/// ```
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn compute_percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return f64::NAN;
    }
    let idx = ((sorted_values.len() as f64 * percentile) / 100.0) as usize;
    let idx = idx.min(sorted_values.len() - 1);
    sorted_values[idx]
}

/// Evenly spaced quantile breaks splitting `values` into `classes` groups.
///
/// Returns `classes + 1` non-decreasing break values, the first being the
/// minimum and the last the maximum. Used for colour scales where an equal
/// number of cells should fall in each colour class.
///
/// # Examples
///
/// ```
/// use encounter_stats::percentiles::quantile_breaks;
///
/// let values = [0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];
/// let breaks = quantile_breaks(&values, 2);
/// assert_eq!(breaks, vec![0.0, 0.5, 0.9]);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn quantile_breaks(values: &[f64], classes: usize) -> Vec<f64> {
    let mut sorted = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect::<Vec<_>>();
    if sorted.is_empty() || classes == 0 {
        return vec![];
    }
    sorted.sort_by(f64::total_cmp);
    let mut breaks = (0..classes)
        .map(|i| compute_percentile(&sorted, 100.0 * i as f64 / classes as f64))
        .collect::<Vec<_>>();
    breaks.push(sorted[sorted.len() - 1]);
    breaks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_percentile_is_nan() {
        assert!(compute_percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_quantile_breaks_are_non_decreasing() {
        let values = [3.0, 3.0, 3.0, 1.0, 7.0, 2.0, 9.0, f64::NAN];
        let breaks = quantile_breaks(&values, 4);
        assert_eq!(breaks.len(), 5);
        assert!(breaks.is_sorted_by(|a, b| a <= b));
        assert_eq!(breaks[0], 1.0);
        assert_eq!(breaks[4], 9.0);
    }
}
