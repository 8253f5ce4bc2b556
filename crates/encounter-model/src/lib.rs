//! Encounter-rate models.
//!
//! This crate turns a checklist table into a feature matrix, fits a binary
//! detection classifier, and calibrates its scores into encounter rates.
//!
//! # Workflow
//!
//! 1. **Features** ([`dataset::Dataset`]): Checklist timing and effort
//!    followed by the habitat covariates ([`dataset::FeatureSchema`])
//! 2. **Split** ([`split::train_test_split`]): Seeded, disjoint train and
//!    test rows
//! 3. **Fit** ([`forest::RandomForest`] or [`boosting::GradientBoosting`]):
//!    Tree ensembles behind the [`classifier::Classifier`] trait
//! 4. **Calibrate** ([`calibration::CalibrationCurve`]): Monotone map from
//!    held-out scores to observed detection rates
//! 5. **Evaluate** ([`evaluation::Evaluation`]): Test metrics before and
//!    after calibration
//!
//! [`inspect`] reports predictor importance and partial dependence, and
//! [`tuning`] searches boosting hyperparameters with an evolutionary
//! algorithm.
//!
//! # Parallelism
//!
//! Forest trees, cross-validation folds and tuning candidates are fitted on
//! scoped threads. Every unit of work gets its own generator seeded from the
//! caller's, and results are collected in index order, so a fixed seed gives
//! the same model for any thread count.
//!
//! # Examples
//!
//! ```
//! use encounter_model::{
//!     classifier::Classifier,
//!     dataset::{Dataset, FeatureSchema},
//!     forest::{ForestParams, RandomForest},
//!     split::train_test_split,
//!     tree::TreeParams,
//! };
//! use rand::SeedableRng;
//!
//! let schema = FeatureSchema::from_names(vec!["x".to_owned()]);
//! let rows = (0..40).map(|i| vec![f64::from(i)]).collect();
//! let labels = (0..40).map(|i| i >= 30).collect();
//! let data = Dataset::new(schema, rows, labels);
//!
//! let mut rng = rand_pcg::Pcg64::seed_from_u64(0);
//! let split = train_test_split(data.len(), 0.8, &mut rng);
//! let params = ForestParams {
//!     num_trees: 20,
//!     tree: TreeParams { max_depth: None, min_node_size: 2, mtry: None },
//!     ..ForestParams::default()
//! };
//! let forest = RandomForest::fit(&data.subset(&split.train), &params, &mut rng).unwrap();
//! assert!(forest.score(&[39.0]) > forest.score(&[0.0]));
//! ```

pub mod boosting;
pub mod calibration;
pub mod classifier;
pub mod dataset;
pub mod evaluation;
pub mod forest;
pub mod genes;
pub mod inspect;
pub mod split;
pub mod tree;
pub mod tuning;
