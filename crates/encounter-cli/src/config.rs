//! Pipeline settings.
//!
//! Every setting has a built-in default; a TOML file passed with
//! `--config` overrides any subset of them.

use std::{fs, path::Path};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use encounter_data::filter::{EffortLimits, FilterSpec};
use encounter_model::{
    boosting::BoostingParams, evaluation::ModelKind, forest::ForestParams, tuning::TuningConfig,
};
use encounter_spatial::{projection::LonLat, raster::LonLatBounds};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub filter: FilterSpec,
    pub effort: EffortLimits,
    /// Seed of every random step (split, undersampling, model fitting).
    pub seed: u64,
    pub train_fraction: f64,
    pub undersample: UndersampleConfig,
    pub model: ModelKind,
    pub forest: ForestParams,
    pub boosting: BoostingParams,
    pub tuning: TuningConfig,
    pub prediction: PredictionConfig,
    pub map: MapConfig,
    pub plot: PlotConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            filter: FilterSpec::new("Wood Thrush", "US-GA"),
            effort: EffortLimits::default(),
            seed: 1,
            train_fraction: 0.8,
            undersample: UndersampleConfig::default(),
            model: ModelKind::default(),
            forest: ForestParams::default(),
            boosting: BoostingParams::default(),
            tuning: TuningConfig::default(),
            prediction: PredictionConfig::default(),
            map: MapConfig::default(),
            plot: PlotConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndersampleConfig {
    /// Train on the undersampled rows instead of all training rows.
    pub enabled: bool,
    /// Hexagon centre spacing in metres.
    pub spacing_m: f64,
}

impl Default for UndersampleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spacing_m: 3_000.0,
        }
    }
}

/// The standard checklist every surface cell is predicted for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Year of the prediction; the latest training year when unset.
    pub year: Option<i32>,
    pub day_of_year: u32,
    pub duration_minutes: f64,
    pub distance_km: f64,
    pub number_observers: u32,
    /// Hour grid searched for the peak detection hour.
    pub hour_grid_start: f64,
    pub hour_grid_end: f64,
    pub hour_grid_points: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            year: None,
            day_of_year: 166,
            duration_minutes: 60.0,
            distance_km: 1.0,
            number_observers: 1,
            hour_grid_start: 0.0,
            hour_grid_end: 23.5,
            hour_grid_points: 48,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Centre of the equal-area projection.
    pub centre: LonLat,
    /// Area the map is cropped to.
    pub zoom: Option<LonLatBounds>,
    /// Pixel edge length in metres.
    pub resolution_m: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            centre: LonLat::new(-83.7, 33.2),
            zoom: Some(LonLatBounds {
                west: -86.0,
                south: 30.3,
                east: -80.7,
                north: 35.1,
            }),
            resolution_m: 3_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub day_bins: usize,
    pub hour_bins: usize,
    pub duration_bins: usize,
    pub distance_bins: usize,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            day_bins: 52,
            hour_bins: 24,
            duration_bins: 10,
            distance_bins: 10,
        }
    }
}

impl PipelineConfig {
    /// Defaults, overridden by `path` when given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}
