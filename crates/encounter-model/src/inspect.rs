//! Predictor importance and partial dependence.

use serde::Serialize;

use crate::{
    classifier::Classifier,
    dataset::{Dataset, FeatureSchema, Occasion},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Importance {
    pub feature: String,
    pub importance: f64,
}

/// Scales raw importance to sum to 1 and sorts it, most important first.
///
/// All-zero importance stays zero.
#[must_use]
pub fn normalized_importance(schema: &FeatureSchema, raw: &[f64]) -> Vec<Importance> {
    assert_eq!(schema.len(), raw.len(), "one importance per feature");
    let total = raw.iter().sum::<f64>();
    let mut out = schema
        .names()
        .iter()
        .zip(raw)
        .map(|(name, &v)| Importance {
            feature: name.clone(),
            importance: if total > 0.0 { v / total } else { 0.0 },
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DependencePoint {
    pub value: f64,
    pub mean_score: f64,
}

/// Mean model score over `data` with `feature` forced to each grid value.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn partial_dependence<C>(
    model: &C,
    data: &Dataset,
    feature: usize,
    grid: &[f64],
) -> Vec<DependencePoint>
where
    C: Classifier + ?Sized,
{
    assert!(feature < data.num_features(), "feature out of range");
    if data.is_empty() {
        return vec![];
    }
    let mut x = vec![0.0; data.num_features()];
    grid.iter()
        .map(|&value| {
            let total = data
                .rows()
                .iter()
                .map(|row| {
                    x.copy_from_slice(row);
                    x[feature] = value;
                    model.score(&x)
                })
                .sum::<f64>();
            DependencePoint {
                value,
                mean_score: total / data.len() as f64,
            }
        })
        .collect()
}

/// Evenly spaced values from `start` to `end` inclusive.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn linear_grid(start: f64, end: f64, points: usize) -> Vec<f64> {
    match points {
        0 => vec![],
        1 => vec![start],
        _ => (0..points)
            .map(|i| start + (end - start) * i as f64 / (points - 1) as f64)
            .collect(),
    }
}

/// Hour of day at which the partial dependence on `hours_of_day` peaks.
///
/// The rows of `data` are first put on the standard `occasion` (keeping
/// their covariates), so the search varies only the start time. Ties keep
/// the earliest hour. Returns `None` if the schema has no hour feature or
/// `data` is empty.
#[must_use]
pub fn peak_hour<C>(model: &C, data: &Dataset, occasion: &Occasion, grid: &[f64]) -> Option<f64>
where
    C: Classifier + ?Sized,
{
    let hour = data.schema.index_of("hours_of_day")?;
    let standard = data.with_occasion(occasion);
    partial_dependence(model, &standard, hour, grid)
        .into_iter()
        .fold(None, |best: Option<DependencePoint>, p| match best {
            Some(b) if b.mean_score >= p.mean_score => Some(b),
            _ => Some(p),
        })
        .map(|p| p.value)
}

#[cfg(test)]
mod tests {
    use encounter_data::checklist::Effort;

    use super::*;
    use crate::dataset::{CHECKLIST_FEATURES, tests::synthetic};

    /// Scores a fixed feature directly.
    struct FeatureModel(usize);

    impl Classifier for FeatureModel {
        fn name(&self) -> &'static str {
            "feature"
        }

        fn score(&self, x: &[f64]) -> f64 {
            x[self.0]
        }
    }

    /// Peaks at 7 in the morning.
    struct MorningModel;

    impl Classifier for MorningModel {
        fn name(&self) -> &'static str {
            "morning"
        }

        fn score(&self, x: &[f64]) -> f64 {
            1.0 / (1.0 + (x[2] - 7.0).powi(2))
        }
    }

    #[test]
    fn test_normalized_importance() {
        let schema = FeatureSchema::from_names(vec!["a".to_owned(), "b".to_owned()]);
        let imp = normalized_importance(&schema, &[1.0, 3.0]);
        assert_eq!(imp[0].feature, "b");
        assert!((imp[0].importance - 0.75).abs() < 1e-12);
        assert!((imp.iter().map(|i| i.importance).sum::<f64>() - 1.0).abs() < 1e-12);

        let zeros = normalized_importance(&schema, &[0.0, 0.0]);
        assert!(zeros.iter().all(|i| i.importance == 0.0));
    }

    #[test]
    fn test_partial_dependence_of_identity() {
        let data = synthetic(20, 1);
        let pd = partial_dependence(&FeatureModel(0), &data, 0, &[0.25, 0.75]);
        assert_eq!(pd.len(), 2);
        assert!((pd[0].mean_score - 0.25).abs() < 1e-12);
        assert!((pd[1].mean_score - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_linear_grid() {
        assert_eq!(linear_grid(0.0, 1.0, 3), [0.0, 0.5, 1.0]);
        assert_eq!(linear_grid(5.0, 9.0, 1), [5.0]);
        assert!(linear_grid(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_peak_hour() {
        let schema = FeatureSchema::new(&["elevation".to_owned()]);
        let rows = (0..10)
            .map(|i| {
                let mut x = vec![0.0; CHECKLIST_FEATURES.len()];
                x.push(f64::from(i));
                x
            })
            .collect();
        let data = Dataset::new(schema, rows, vec![false; 10]);
        let occasion = Occasion {
            year: 2019,
            day_of_year: 160,
            hours_of_day: 12.0,
            effort: Effort {
                duration_minutes: 60.0,
                distance_km: 1.0,
                number_observers: 1,
            },
            traveling: true,
        };
        let grid = linear_grid(0.0, 23.5, 48);
        assert_eq!(peak_hour(&MorningModel, &data, &occasion, &grid), Some(7.0));

        let no_hour = synthetic(5, 1);
        assert_eq!(peak_hour(&MorningModel, &no_hour, &occasion, &grid), None);
    }
}
