//! Binary classification metrics for encounter-rate models.
//!
//! All functions take model scores in `[0, 1]` and boolean detection labels.
//! Discrimination is measured by AUC; the remaining threshold-dependent
//! metrics (sensitivity, specificity, Cohen's kappa) are reported at the
//! threshold that maximizes kappa, searched over a fixed grid of 101
//! thresholds (0.00, 0.01, ..., 1.00).

use std::iter;

use serde::Serialize;

/// Number of evenly spaced thresholds scanned in `[0, 1]`.
pub const THRESHOLD_GRID_SIZE: usize = 101;

/// Mean squared error between scores and 0/1 labels (Brier score).
///
/// Returns `NaN` for empty input.
///
/// # Examples
///
/// ```
/// use encounter_stats::classification::brier_score;
///
/// let mse = brier_score(&[1.0, 0.0, 0.5], &[true, false, true]);
/// assert!((mse - 0.25 / 3.0).abs() < 1e-12);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn brier_score(scores: &[f64], labels: &[bool]) -> f64 {
    assert_eq!(scores.len(), labels.len(), "scores and labels must match");
    if scores.is_empty() {
        return f64::NAN;
    }
    let sum = iter::zip(scores, labels)
        .map(|(&s, &l)| (s - f64::from(u8::from(l))).powi(2))
        .sum::<f64>();
    sum / scores.len() as f64
}

/// Area under the ROC curve via the Mann-Whitney rank statistic.
///
/// Tied scores receive their average rank. Returns `None` when either class
/// is absent.
///
/// # Examples
///
/// ```
/// use encounter_stats::classification::auc;
///
/// // perfectly separated
/// assert_eq!(auc(&[0.1, 0.2, 0.8, 0.9], &[false, false, true, true]), Some(1.0));
/// // all tied
/// assert_eq!(auc(&[0.5, 0.5, 0.5, 0.5], &[false, true, false, true]), Some(0.5));
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn auc(scores: &[f64], labels: &[bool]) -> Option<f64> {
    assert_eq!(scores.len(), labels.len(), "scores and labels must match");
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order = (0..scores.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; tied block i..=j shares the mean rank
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        let positives_in_block = order[i..=j].iter().filter(|&&k| labels[k]).count();
        positive_rank_sum += mean_rank * positives_in_block as f64;
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Confusion matrix counts at a fixed threshold.
///
/// A score at or above the threshold is a predicted detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    #[must_use]
    pub fn at_threshold(scores: &[f64], labels: &[bool], threshold: f64) -> Self {
        assert_eq!(scores.len(), labels.len(), "scores and labels must match");
        let mut matrix = Self::default();
        for (&score, &label) in iter::zip(scores, labels) {
            match (score >= threshold, label) {
                (true, true) => matrix.true_positive += 1,
                (true, false) => matrix.false_positive += 1,
                (false, false) => matrix.true_negative += 1,
                (false, true) => matrix.false_negative += 1,
            }
        }
        matrix
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    /// True positive rate; `NaN` when there are no observed detections.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn sensitivity(&self) -> f64 {
        self.true_positive as f64 / (self.true_positive + self.false_negative) as f64
    }

    /// True negative rate; `NaN` when there are no observed non-detections.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn specificity(&self) -> f64 {
        self.true_negative as f64 / (self.true_negative + self.false_positive) as f64
    }

    /// Cohen's kappa: agreement beyond chance between predictions and labels.
    ///
    /// Returns 0 when expected agreement is already perfect (a single class
    /// both predicted and observed).
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn kappa(&self) -> f64 {
        let n = self.total() as f64;
        if n == 0.0 {
            return 0.0;
        }
        let tp = self.true_positive as f64;
        let fp = self.false_positive as f64;
        let tn = self.true_negative as f64;
        let fn_ = self.false_negative as f64;

        let observed = (tp + tn) / n;
        let expected = ((tp + fp) * (tp + fn_) + (tn + fn_) * (tn + fp)) / (n * n);
        if (1.0 - expected).abs() < f64::EPSILON {
            0.0
        } else {
            (observed - expected) / (1.0 - expected)
        }
    }
}

/// Threshold-dependent metrics at the kappa-maximizing threshold.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ThresholdMetrics {
    pub threshold: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub kappa: f64,
}

/// Finds the grid threshold with the highest Cohen's kappa.
///
/// Ties keep the lowest threshold.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn max_kappa_threshold(scores: &[f64], labels: &[bool]) -> ThresholdMetrics {
    let mut best: Option<(f64, ConfusionMatrix)> = None;
    for i in 0..THRESHOLD_GRID_SIZE {
        let threshold = i as f64 / (THRESHOLD_GRID_SIZE - 1) as f64;
        let matrix = ConfusionMatrix::at_threshold(scores, labels, threshold);
        let is_better = best
            .as_ref()
            .is_none_or(|(_, best_matrix)| matrix.kappa() > best_matrix.kappa());
        if is_better {
            best = Some((threshold, matrix));
        }
    }
    let (threshold, matrix) = best.unwrap_or((0.5, ConfusionMatrix::default()));
    ThresholdMetrics {
        threshold,
        sensitivity: matrix.sensitivity(),
        specificity: matrix.specificity(),
        kappa: matrix.kappa(),
    }
}

/// Full set of evaluation metrics for one vector of scores.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BinaryMetrics {
    /// Number of scored rows.
    pub count: usize,
    /// Mean squared error against 0/1 labels.
    pub mse: f64,
    /// Area under the ROC curve (`NaN` if only one class is present).
    pub auc: f64,
    /// Metrics at the kappa-maximizing threshold.
    #[serde(flatten)]
    pub at_threshold: ThresholdMetrics,
}

impl BinaryMetrics {
    #[must_use]
    pub fn compute(scores: &[f64], labels: &[bool]) -> Self {
        Self {
            count: scores.len(),
            mse: brier_score(scores, labels),
            auc: auc(scores, labels).unwrap_or(f64::NAN),
            at_threshold: max_kappa_threshold(scores, labels),
        }
    }
}
