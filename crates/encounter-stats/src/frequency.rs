//! Detection frequency over fixed-width bins of a covariate.
//!
//! This is what the exploratory plots show: for every bin of, say, hour of
//! day, how many checklists were submitted and which fraction of them
//! reported the species.

use serde::Serialize;

/// One bin of a [`BinnedFrequency`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrequencyBin {
    /// Inclusive lower bound.
    pub start: f64,
    /// Exclusive upper bound (inclusive for the last bin).
    pub end: f64,
    /// Number of checklists in the bin.
    pub count: usize,
    /// Number of checklists in the bin that detected the species.
    pub detections: usize,
}

impl FrequencyBin {
    /// Fraction of checklists with a detection; `None` for an empty bin.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn frequency(&self) -> Option<f64> {
        (self.count > 0).then(|| self.detections as f64 / self.count as f64)
    }

    #[must_use]
    pub fn midpoint(&self) -> f64 {
        f64::midpoint(self.start, self.end)
    }
}

/// Detection frequency across contiguous fixed-width bins.
#[derive(Debug, Clone, Serialize)]
pub struct BinnedFrequency {
    pub bins: Vec<FrequencyBin>,
}

impl BinnedFrequency {
    /// Bins `(value, detected)` pairs into `[start, end)` split into
    /// `num_bins` equal bins.
    ///
    /// Values outside `[start, end]` and non-finite values are skipped; a
    /// value equal to `end` falls in the last bin.
    ///
    /// # Examples
    ///
    /// ```
    /// use encounter_stats::frequency::BinnedFrequency;
    ///
    /// let data = [(0.5, true), (1.5, false), (1.7, true), (3.0, false)];
    /// let freq = BinnedFrequency::new(data, 0.0, 4.0, 4);
    /// assert_eq!(freq.bins[1].count, 2);
    /// assert_eq!(freq.bins[1].frequency(), Some(0.5));
    /// assert_eq!(freq.bins[2].frequency(), None);
    /// ```
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    #[must_use]
    pub fn new<I>(data: I, start: f64, end: f64, num_bins: usize) -> Self
    where
        I: IntoIterator<Item = (f64, bool)>,
    {
        assert!(end > start, "bin range must be non-empty");
        assert!(num_bins > 0, "need at least one bin");
        let width = (end - start) / num_bins as f64;
        let mut bins = (0..num_bins)
            .map(|i| FrequencyBin {
                start: start + i as f64 * width,
                end: start + (i + 1) as f64 * width,
                count: 0,
                detections: 0,
            })
            .collect::<Vec<_>>();

        for (value, detected) in data {
            if !value.is_finite() || value < start || value > end {
                continue;
            }
            let idx = (((value - start) / width) as usize).min(num_bins - 1);
            bins[idx].count += 1;
            bins[idx].detections += usize::from(detected);
        }

        Self { bins }
    }

    /// Total number of binned checklists.
    #[must_use]
    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}
