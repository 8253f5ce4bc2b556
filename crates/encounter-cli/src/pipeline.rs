//! Model fitting shared by the `train`, `predict` and `run` commands.
//!
//! [`fit`] runs the whole modelling stage from one seeded generator:
//!
//! 1. Split the joined table into training and test rows
//! 2. Optionally undersample the training rows on the hexagonal grid; test
//!    rows are never thinned
//! 3. Fit the configured classifier and its calibration curve on the
//!    training rows
//! 4. Score the test rows and compute metrics before and after calibration
//! 5. Find the start hour at which predicted detection peaks; maps are
//!    predicted for a standard checklist at that hour
//!
//! A fixed seed and config give the same split, model and predictions on
//! every run.

use std::path::Path;

use anyhow::{Context as _, ensure};
use rand::SeedableRng as _;
use rand_pcg::Pcg64;
use serde::Serialize;

use encounter_data::{checklist::Effort, table::ChecklistTable};
use encounter_model::{
    boosting::BoostingParams,
    calibration::CalibrationCurve,
    dataset::{Dataset, Occasion},
    evaluation::{CalibratedModel, Evaluation, ModelKind, Predictions},
    forest::ForestParams,
    inspect::{self, Importance},
    split::{Split, train_test_split},
};
use encounter_spatial::{
    hexgrid::HexGrid,
    projection::Laea,
    undersample::{UndersampleReport, undersample},
};

use crate::config::PipelineConfig;

/// A calibrated model with its held-out evaluation.
#[derive(Debug)]
pub struct TrainedModel {
    pub split: Split,
    /// Table rows the model was fitted on.
    pub train_rows: Vec<usize>,
    pub undersample: Option<UndersampleReport>,
    pub model: CalibratedModel,
    pub predictions: Predictions,
    pub evaluation: Evaluation,
    pub importance: Option<Vec<Importance>>,
    /// The standard checklist maps are predicted for, at the peak hour.
    pub occasion: Occasion,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Hyperparameters<'a> {
    Forest(&'a ForestParams),
    Boosting(&'a BoostingParams),
}

#[derive(Debug, Serialize)]
pub struct ModelSummary<'a> {
    model: &'static str,
    seed: u64,
    train_rows: usize,
    test_rows: usize,
    undersample: Option<UndersampleReport>,
    hyperparameters: Hyperparameters<'a>,
    calibration_rows: usize,
    calibration: &'a CalibrationCurve,
    evaluation: &'a Evaluation,
    importance: Option<&'a [Importance]>,
    occasion: &'a Occasion,
}

#[derive(Debug, Serialize)]
struct TestPrediction<'a> {
    checklist_id: &'a str,
    species_observed: bool,
    raw: f64,
    calibrated: f64,
}

/// Splits `table`, fits the configured model on the training rows and
/// evaluates it on the test rows.
pub fn fit(table: &ChecklistTable, config: &PipelineConfig) -> anyhow::Result<TrainedModel> {
    ensure!(
        (0.0..=1.0).contains(&config.train_fraction),
        "train_fraction must be in [0, 1], got {}",
        config.train_fraction
    );
    let mut rng = Pcg64::seed_from_u64(config.seed);
    let data = Dataset::from_table(table);
    let split = train_test_split(data.len(), config.train_fraction, &mut rng);

    let (train_rows, undersample) = if config.undersample.enabled {
        let projection = Laea::new(config.map.centre);
        let grid = HexGrid::new(config.undersample.spacing_m)
            .context("Invalid undersampling configuration")?;
        let (kept, report) =
            undersample(&table.select(&split.train), &projection, &grid, &mut rng);
        tracing::info!(
            input = report.input,
            output = report.groups,
            "undersampled training checklists"
        );
        (kept.iter().map(|&i| split.train[i]).collect(), Some(report))
    } else {
        (split.train.clone(), None)
    };

    let train = data.subset(&train_rows);
    let test = data.subset(&split.test);
    tracing::info!(
        train = train.len(),
        test = test.len(),
        prevalence = train.prevalence(),
        "split checklists"
    );

    let model = CalibratedModel::fit(
        config.model,
        &train,
        &config.forest,
        &config.boosting,
        &mut rng,
    )
    .context("Failed to fit encounter model")?;
    let predictions = model.predictions(&test);
    let evaluation = Evaluation::compute(&predictions, test.labels());
    tracing::info!(
        auc = evaluation.calibrated.auc,
        mse = evaluation.calibrated.mse,
        "evaluated on test checklists"
    );
    let importance = model
        .model
        .importance()
        .map(|raw| inspect::normalized_importance(&data.schema, raw));

    let occasion = standard_occasion(table, &train_rows, &train, &model, config)?;
    tracing::info!(
        year = occasion.year,
        hour = occasion.hours_of_day,
        "chose standard checklist"
    );

    Ok(TrainedModel {
        split,
        train_rows,
        undersample,
        model,
        predictions,
        evaluation,
        importance,
        occasion,
    })
}

fn standard_occasion(
    table: &ChecklistTable,
    train_rows: &[usize],
    train: &Dataset,
    model: &CalibratedModel,
    config: &PipelineConfig,
) -> anyhow::Result<Occasion> {
    let prediction = &config.prediction;
    let year = prediction
        .year
        .or_else(|| {
            train_rows
                .iter()
                .map(|&i| table.rows[i].checklist.year)
                .max()
        })
        .context("No training checklists to take the prediction year from")?;
    let mut occasion = Occasion {
        year,
        day_of_year: prediction.day_of_year,
        hours_of_day: prediction.hour_grid_start,
        effort: Effort {
            duration_minutes: prediction.duration_minutes,
            distance_km: prediction.distance_km,
            number_observers: prediction.number_observers,
        },
        traveling: prediction.distance_km > 0.0,
    };
    let grid = inspect::linear_grid(
        prediction.hour_grid_start,
        prediction.hour_grid_end,
        prediction.hour_grid_points,
    );
    occasion.hours_of_day = inspect::peak_hour(model.model.as_ref(), train, &occasion, &grid)
        .context("Failed to find the peak detection hour")?;
    Ok(occasion)
}

impl TrainedModel {
    #[must_use]
    pub fn summary<'a>(&'a self, config: &'a PipelineConfig) -> ModelSummary<'a> {
        ModelSummary {
            model: self.model.model.name(),
            seed: config.seed,
            train_rows: self.train_rows.len(),
            test_rows: self.split.test.len(),
            undersample: self.undersample,
            hyperparameters: match config.model {
                ModelKind::RandomForest => Hyperparameters::Forest(&config.forest),
                ModelKind::GradientBoosting => Hyperparameters::Boosting(&config.boosting),
            },
            calibration_rows: self.model.calibration_rows,
            calibration: &self.model.curve,
            evaluation: &self.evaluation,
            importance: self.importance.as_deref(),
            occasion: &self.occasion,
        }
    }

    /// Writes one row per test checklist with its raw and calibrated score.
    pub fn save_test_predictions(&self, table: &ChecklistTable, path: &Path) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for (k, &i) in self.split.test.iter().enumerate() {
            let checklist = &table.rows[i].checklist;
            writer
                .serialize(TestPrediction {
                    checklist_id: &checklist.checklist_id,
                    species_observed: checklist.species_observed,
                    raw: self.predictions.raw[k],
                    calibrated: self.predictions.calibrated[k],
                })
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            rows = self.split.test.len(),
            "wrote test predictions"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use encounter_data::{
        checklist::{Checklist, ChecklistHeader, Protocol},
        table::EncounterRow,
    };

    use super::*;

    /// A joined table whose detections follow its one covariate.
    #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub(crate) fn synthetic_table(n: usize) -> ChecklistTable {
        let rows = (0..n)
            .map(|i| {
                let forest = f64::from((i % 10) as u32) / 10.0;
                let header = ChecklistHeader {
                    checklist_id: format!("S{i}"),
                    observer_id: format!("obsr{}", i % 7),
                    latitude: 33.0 + forest,
                    longitude: -84.0 + f64::from((i % 13) as u32) * 0.01,
                    observation_date: NaiveDate::from_yo_opt(
                        2018 + (i % 2) as i32,
                        120 + (i % 7) as u32 * 9,
                    )
                    .unwrap(),
                    time_observations_started: NaiveTime::from_hms_opt(5 + (i % 11) as u32, 30, 0)
                        .unwrap(),
                    protocol: if i % 3 == 0 {
                        Protocol::Stationary
                    } else {
                        Protocol::Traveling
                    },
                };
                let effort = Effort {
                    duration_minutes: 30.0 + f64::from((i % 5) as u32) * 10.0,
                    distance_km: 1.0,
                    number_observers: 1 + (i % 3) as u32,
                };
                EncounterRow {
                    checklist: Checklist::new(header, effort, i % 10 >= 5, None),
                    covariates: vec![forest],
                }
            })
            .collect();
        ChecklistTable {
            covariate_names: vec!["pland_forest".to_owned()],
            rows,
        }
    }

    fn small_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.forest.num_trees = 30;
        config.forest.threads = Some(2);
        config
    }

    #[test]
    fn test_fit_is_deterministic() {
        let table = synthetic_table(200);
        let config = small_config();
        let a = fit(&table, &config).unwrap();
        let b = fit(&table, &config).unwrap();
        assert_eq!(a.split, b.split);
        assert_eq!(a.predictions, b.predictions);
        assert_eq!(a.split.test.len(), 40);
        assert_eq!(a.occasion.year, 2019);
        assert!(a.evaluation.calibrated.auc > 0.8);
        let importance = a.importance.as_ref().unwrap();
        assert_eq!(importance[0].feature, "pland_forest");
    }

    #[test]
    fn test_undersampling_shrinks_training_rows() {
        let table = synthetic_table(200);
        let mut config = small_config();
        config.undersample.enabled = true;
        config.undersample.spacing_m = 200_000.0;
        let trained = fit(&table, &config).unwrap();
        let report = trained.undersample.unwrap();
        assert_eq!(report.input, trained.split.train.len());
        assert_eq!(trained.train_rows.len(), report.groups);
        assert!(trained.train_rows.len() < trained.split.train.len());
        assert!(trained.train_rows.iter().all(|i| trained.split.train.contains(i)));
    }

    #[test]
    fn test_invalid_train_fraction() {
        let mut config = small_config();
        config.train_fraction = 1.5;
        assert!(fit(&synthetic_table(20), &config).is_err());
    }

    #[test]
    fn test_bad_model_settings_are_errors() {
        let table = synthetic_table(100);

        let mut config = small_config();
        config.undersample.enabled = true;
        config.undersample.spacing_m = 0.0;
        let err = fit(&table, &config).unwrap_err();
        assert!(format!("{err:#}").contains("spacing"), "{err:#}");

        let mut config = small_config();
        config.forest.num_trees = 0;
        let err = fit(&table, &config).unwrap_err();
        assert!(format!("{err:#}").contains("at least one tree"), "{err:#}");
    }
}
