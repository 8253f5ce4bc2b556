//! Calibrated models and their test-set evaluation.

use rand::Rng;
use serde::{Deserialize, Serialize};

use encounter_stats::classification::BinaryMetrics;

use crate::{
    boosting::{BoostingParams, GradientBoosting},
    calibration::CalibrationCurve,
    classifier::{Classifier, FitError},
    dataset::Dataset,
    forest::{ForestParams, RandomForest},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    RandomForest,
    GradientBoosting,
}

/// A fitted classifier paired with the curve that calibrates its scores.
pub struct CalibratedModel {
    pub model: Box<dyn Classifier>,
    pub curve: CalibrationCurve,
    /// Training rows that contributed a held-out score to the curve.
    pub calibration_rows: usize,
}

impl std::fmt::Debug for CalibratedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibratedModel")
            .field("model", &self.model.name())
            .field("curve", &self.curve)
            .field("calibration_rows", &self.calibration_rows)
            .finish()
    }
}

impl CalibratedModel {
    /// Fits a model of `kind` on `train` and calibrates it on the training
    /// rows' held-out scores: out-of-bag for the forest, out-of-fold for
    /// boosting.
    pub fn fit<R>(
        kind: ModelKind,
        train: &Dataset,
        forest: &ForestParams,
        boosting: &BoostingParams,
        rng: &mut R,
    ) -> Result<Self, FitError>
    where
        R: Rng + ?Sized,
    {
        let (model, scores, labels): (Box<dyn Classifier>, Vec<f64>, Vec<bool>) = match kind {
            ModelKind::RandomForest => {
                let forest = RandomForest::fit(train, forest, rng)?;
                let (scores, labels): (Vec<f64>, Vec<bool>) = forest
                    .oob_scores()
                    .iter()
                    .zip(train.labels())
                    .filter_map(|(s, &l)| s.map(|s| (s, l)))
                    .unzip();
                (Box::new(forest) as Box<dyn Classifier>, scores, labels)
            }
            ModelKind::GradientBoosting => {
                let gbm = GradientBoosting::fit(train, boosting, rng)?;
                let scores = gbm.out_of_fold_scores().to_vec();
                (Box::new(gbm) as Box<dyn Classifier>, scores, train.labels().to_vec())
            }
        };
        let curve = CalibrationCurve::fit(&scores, &labels)?;
        tracing::info!(
            model = model.name(),
            calibration_rows = scores.len(),
            knots = curve.knots().len(),
            "fitted calibration curve"
        );
        Ok(Self {
            model,
            curve,
            calibration_rows: scores.len(),
        })
    }

    #[must_use]
    pub fn raw(&self, x: &[f64]) -> f64 {
        self.model.score(x)
    }

    /// Calibrated encounter rate.
    #[must_use]
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.curve.apply(self.model.score(x))
    }

    /// Scores `data`, returning raw and calibrated values.
    #[must_use]
    pub fn predictions(&self, data: &Dataset) -> Predictions {
        let raw = self.model.score_all(data.rows());
        let calibrated = self.curve.apply_all(&raw);
        Predictions { raw, calibrated }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    pub raw: Vec<f64>,
    pub calibrated: Vec<f64>,
}

/// Test-set metrics before and after calibration.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Evaluation {
    pub raw: BinaryMetrics,
    pub calibrated: BinaryMetrics,
}

impl Evaluation {
    #[must_use]
    pub fn compute(predictions: &Predictions, labels: &[bool]) -> Self {
        Self {
            raw: BinaryMetrics::compute(&predictions.raw, labels),
            calibrated: BinaryMetrics::compute(&predictions.calibrated, labels),
        }
    }
}
