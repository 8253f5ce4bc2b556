//! Monotone calibration of raw model scores.
//!
//! The curve is fit with weighted pool-adjacent-violators on `(score, label)`
//! pairs. Each pooled block becomes a knot at the weighted mean of its scores
//! with the block's detection rate as its value, and scores between knots are
//! interpolated linearly. Knot positions strictly increase and knot values
//! never decrease, so the curve is monotone non-decreasing everywhere. Scores
//! outside the knot range take the nearest end value.

use serde::{Deserialize, Serialize};

use crate::classifier::FitError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knot {
    pub score: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCurve {
    knots: Vec<Knot>,
}

struct Block {
    weight: f64,
    score_sum: f64,
    label_sum: f64,
}

impl Block {
    fn rate(&self) -> f64 {
        self.label_sum / self.weight
    }

    fn absorb(&mut self, other: &Self) {
        self.weight += other.weight;
        self.score_sum += other.score_sum;
        self.label_sum += other.label_sum;
    }
}

impl CalibrationCurve {
    /// Fits the curve. Pairs with a non-finite score are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use encounter_model::calibration::CalibrationCurve;
    ///
    /// let scores = [0.1, 0.2, 0.3, 0.4];
    /// let labels = [false, true, false, true];
    /// let curve = CalibrationCurve::fit(&scores, &labels).unwrap();
    /// // 0.2 and 0.3 violate monotonicity and are pooled
    /// assert_eq!(curve.knots().len(), 3);
    /// assert_eq!(curve.apply(0.25), 0.5);
    /// assert_eq!(curve.apply(0.0), 0.0);
    /// assert_eq!(curve.apply(1.0), 1.0);
    /// ```
    pub fn fit(scores: &[f64], labels: &[bool]) -> Result<Self, FitError> {
        assert_eq!(scores.len(), labels.len(), "scores and labels must match");
        let mut pairs = scores
            .iter()
            .zip(labels)
            .filter(|(s, _)| s.is_finite())
            .map(|(&s, &l)| (s, f64::from(u8::from(l))))
            .collect::<Vec<_>>();
        if pairs.is_empty() {
            return Err(FitError::Empty);
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut blocks: Vec<Block> = vec![];
        let mut last_score = f64::NAN;
        for (score, label) in pairs {
            let start_new = score != last_score;
            last_score = score;
            match blocks.last_mut() {
                Some(b) if !start_new => b.absorb(&Block {
                    weight: 1.0,
                    score_sum: score,
                    label_sum: label,
                }),
                _ => blocks.push(Block {
                    weight: 1.0,
                    score_sum: score,
                    label_sum: label,
                }),
            }
            // pool backwards while the new block breaks monotonicity
            while blocks.len() >= 2 {
                let n = blocks.len();
                if blocks[n - 2].rate() <= blocks[n - 1].rate() {
                    break;
                }
                let top = blocks.swap_remove(n - 1);
                blocks[n - 2].absorb(&top);
            }
        }

        let knots = blocks
            .iter()
            .map(|b| Knot {
                score: b.score_sum / b.weight,
                rate: b.rate().clamp(0.0, 1.0),
            })
            .collect();
        Ok(Self { knots })
    }

    #[must_use]
    pub fn knots(&self) -> &[Knot] {
        &self.knots
    }

    /// Calibrated detection probability for a raw score.
    #[must_use]
    pub fn apply(&self, score: f64) -> f64 {
        let (Some(first), Some(last)) = (self.knots.first(), self.knots.last()) else {
            return score.clamp(0.0, 1.0);
        };
        if score.is_nan() || score <= first.score {
            return first.rate;
        }
        if score >= last.score {
            return last.rate;
        }
        let upper = self.knots.partition_point(|k| k.score <= score);
        let (lo, hi) = (self.knots[upper - 1], self.knots[upper]);
        let t = (score - lo.score) / (hi.score - lo.score);
        (lo.rate + t * (hi.rate - lo.rate)).clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn apply_all(&self, scores: &[f64]) -> Vec<f64> {
        scores.iter().map(|&s| self.apply(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng as _, SeedableRng as _};
    use rand_pcg::Pcg64;

    use super::*;

    #[test]
    fn test_curve_is_monotone() {
        let mut rng = Pcg64::seed_from_u64(3);
        let scores = (0..500).map(|_| rng.random::<f64>()).collect::<Vec<_>>();
        let labels = scores
            .iter()
            .map(|&s| rng.random_bool(s * s))
            .collect::<Vec<_>>();
        let curve = CalibrationCurve::fit(&scores, &labels).unwrap();

        assert!(curve.knots().windows(2).all(|w| w[0].score < w[1].score));
        assert!(curve.knots().windows(2).all(|w| w[0].rate <= w[1].rate));
        let grid = (0..=200).map(|i| f64::from(i) / 200.0 * 1.2 - 0.1);
        let calibrated = grid.map(|s| curve.apply(s)).collect::<Vec<_>>();
        assert!(calibrated.windows(2).all(|w| w[0] <= w[1]));
        assert!(calibrated.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_ties_share_a_block() {
        let curve =
            CalibrationCurve::fit(&[0.5, 0.5, 0.5, 0.9], &[true, false, false, true]).unwrap();
        assert_eq!(curve.knots().len(), 2);
        assert!((curve.knots()[0].rate - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(curve.apply(0.9), 1.0);
    }

    #[test]
    fn test_weighted_pooling() {
        // three detections at 0.2 outweigh one non-detection at 0.3
        let curve = CalibrationCurve::fit(
            &[0.1, 0.2, 0.2, 0.2, 0.3],
            &[false, true, true, true, false],
        )
        .unwrap();
        let knots = curve.knots();
        assert_eq!(knots.len(), 2);
        assert!((knots[1].rate - 0.75).abs() < 1e-12);
        assert!((knots[1].score - 0.225).abs() < 1e-12);
    }

    #[test]
    fn test_empty_and_non_finite() {
        assert_eq!(CalibrationCurve::fit(&[], &[]), Err(FitError::Empty));
        assert_eq!(
            CalibrationCurve::fit(&[f64::NAN], &[true]),
            Err(FitError::Empty)
        );
        let curve = CalibrationCurve::fit(&[0.2, f64::NAN], &[true, false]).unwrap();
        assert_eq!(curve.knots().len(), 1);
        assert_eq!(curve.apply(f64::NAN), 1.0);
    }
}
