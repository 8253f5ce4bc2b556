//! Statistical utilities for the encounter-rate pipeline.
//!
//! This crate provides:
//!
//! - **Descriptive statistics**: mean, median, variance, standard deviation
//! - **Percentiles**: nearest-rank percentiles and quantile colour breaks
//! - **Detection frequency**: per-bin checklist counts and detection rates
//! - **Classification metrics**: MSE, AUC, sensitivity, specificity and
//!   Cohen's kappa at the kappa-maximizing threshold
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`percentiles`]: Percentiles and quantile breaks
//! - [`frequency`]: Binned detection frequency
//! - [`classification`]: Binary classifier evaluation
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use encounter_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```
//!
//! ## Evaluating scores
//!
//! ```
//! use encounter_stats::classification::BinaryMetrics;
//!
//! let scores = [0.1, 0.3, 0.7, 0.9];
//! let labels = [false, false, true, true];
//! let metrics = BinaryMetrics::compute(&scores, &labels);
//! assert_eq!(metrics.auc, 1.0);
//! assert_eq!(metrics.at_threshold.kappa, 1.0);
//! ```

pub mod classification;
pub mod descriptive;
pub mod frequency;
pub mod percentiles;
