//! Feature matrices built from checklist tables.

use encounter_data::{
    checklist::{Checklist, Effort, Protocol},
    covariates::SurfaceTable,
    table::ChecklistTable,
};
use serde::{Deserialize, Serialize};

/// Effort and timing features, in feature-vector order.
pub const CHECKLIST_FEATURES: [&str; 7] = [
    "year",
    "day_of_year",
    "hours_of_day",
    "duration_minutes",
    "effort_distance_km",
    "number_observers",
    "protocol_traveling",
];

/// Names of the features in a feature vector.
///
/// The checklist features come first, followed by the covariates in table
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    #[must_use]
    pub fn new(covariate_names: &[String]) -> Self {
        let names = CHECKLIST_FEATURES
            .iter()
            .map(|&n| n.to_owned())
            .chain(covariate_names.iter().cloned())
            .collect();
        Self { names }
    }

    /// A schema with arbitrary feature names.
    #[must_use]
    pub fn from_names(names: Vec<String>) -> Self {
        Self { names }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Timing and effort values that make up the checklist part of a feature
/// vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Occasion {
    pub year: i32,
    pub day_of_year: u32,
    pub hours_of_day: f64,
    pub effort: Effort,
    pub traveling: bool,
}

impl Occasion {
    #[must_use]
    pub fn of(checklist: &Checklist) -> Self {
        Self {
            year: checklist.year,
            day_of_year: checklist.day_of_year,
            hours_of_day: checklist.hours_of_day,
            effort: checklist.effort(),
            traveling: checklist.protocol == Protocol::Traveling,
        }
    }

    /// Builds a full feature vector from this occasion and `covariates`.
    #[must_use]
    pub fn features(&self, covariates: &[f64]) -> Vec<f64> {
        let mut x = Vec::with_capacity(CHECKLIST_FEATURES.len() + covariates.len());
        x.extend([
            f64::from(self.year),
            f64::from(self.day_of_year),
            self.hours_of_day,
            self.effort.duration_minutes,
            self.effort.distance_km,
            f64::from(self.effort.number_observers),
            f64::from(u8::from(self.traveling)),
        ]);
        x.extend_from_slice(covariates);
        x
    }
}

/// Row-major feature matrix with binary labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub schema: FeatureSchema,
    rows: Vec<Vec<f64>>,
    labels: Vec<bool>,
}

impl Dataset {
    #[must_use]
    pub fn new(schema: FeatureSchema, rows: Vec<Vec<f64>>, labels: Vec<bool>) -> Self {
        assert_eq!(rows.len(), labels.len(), "rows and labels must match");
        assert!(
            rows.iter().all(|r| r.len() == schema.len()),
            "row width must match the schema"
        );
        Self {
            schema,
            rows,
            labels,
        }
    }

    #[must_use]
    pub fn from_table(table: &ChecklistTable) -> Self {
        let schema = FeatureSchema::new(&table.covariate_names);
        let rows = table
            .rows
            .iter()
            .map(|row| Occasion::of(&row.checklist).features(&row.covariates))
            .collect();
        let labels = table.checklists().map(|c| c.species_observed).collect();
        Self::new(schema, rows, labels)
    }

    /// One unlabeled row per surface cell, all on the same `occasion`.
    ///
    /// The surface covariates must already be in the order of
    /// `surface.names`.
    #[must_use]
    pub fn from_surface(surface: &SurfaceTable, occasion: &Occasion) -> Self {
        let schema = FeatureSchema::new(&surface.names);
        let rows = surface
            .cells
            .iter()
            .map(|cell| occasion.features(&cell.covariates))
            .collect::<Vec<_>>();
        let labels = vec![false; rows.len()];
        Self::new(schema, rows, labels)
    }

    /// A copy with the checklist features of every row replaced by
    /// `occasion`; covariates are kept.
    #[must_use]
    pub fn with_occasion(&self, occasion: &Occasion) -> Self {
        let k = CHECKLIST_FEATURES.len();
        assert!(
            self.schema
                .names()
                .iter()
                .zip(CHECKLIST_FEATURES)
                .filter(|(a, b)| a.as_str() == *b)
                .count()
                == k,
            "schema must start with the checklist features"
        );
        let rows = self
            .rows
            .iter()
            .map(|row| occasion.features(&row[k..]))
            .collect();
        Self {
            schema: self.schema.clone(),
            rows,
            labels: self.labels.clone(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn num_features(&self) -> usize {
        self.schema.len()
    }

    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.rows[i]
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    #[must_use]
    pub fn label(&self, i: usize) -> bool {
        self.labels[i]
    }

    #[must_use]
    pub fn labels(&self) -> &[bool] {
        &self.labels
    }

    #[must_use]
    pub fn value(&self, i: usize, feature: usize) -> f64 {
        self.rows[i][feature]
    }

    /// Fraction of rows with a detection; 0 for an empty dataset.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn prevalence(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|&&l| l).count() as f64 / self.labels.len() as f64
    }

    /// Rows at `indices`, in that order.
    #[must_use]
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            schema: self.schema.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}
