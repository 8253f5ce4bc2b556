//! The classifier seam and the thread pool helpers shared by the ensembles.

use std::thread;

use crate::dataset::Dataset;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum FitError {
    #[display("cannot fit a model on an empty training set")]
    Empty,
    #[display("training set has {detections} detections in {rows} rows; both classes are required")]
    SingleClass { detections: usize, rows: usize },
    #[display("{rows} rows are too few for {folds}-fold cross-validation")]
    TooFewRows { rows: usize, folds: usize },
    #[display("a forest needs at least one tree")]
    NoTrees,
}

/// Fails unless `data` has rows of both classes.
pub fn check_trainable(data: &Dataset) -> Result<(), FitError> {
    if data.is_empty() {
        return Err(FitError::Empty);
    }
    let detections = data.labels().iter().filter(|&&l| l).count();
    if detections == 0 || detections == data.len() {
        return Err(FitError::SingleClass {
            detections,
            rows: data.len(),
        });
    }
    Ok(())
}

/// A fitted binary encounter model.
pub trait Classifier: Send + Sync {
    /// Short model name used in reports.
    fn name(&self) -> &'static str;

    /// Raw detection score in `[0, 1]` for one feature vector.
    fn score(&self, x: &[f64]) -> f64;

    fn score_all(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|x| self.score(x)).collect()
    }

    /// Unnormalized importance of each feature, for models that track it.
    fn importance(&self) -> Option<&[f64]> {
        None
    }
}

/// Number of worker threads for ensemble fitting.
#[must_use]
pub fn worker_count(requested: Option<usize>) -> usize {
    requested
        .or_else(|| thread::available_parallelism().ok().map(usize::from))
        .unwrap_or(1)
        .max(1)
}

/// Runs `f(i)` for `i in 0..n` on up to `workers` threads.
///
/// Results are returned in index order regardless of scheduling.
pub fn parallel_map<T, F>(n: usize, workers: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    let workers = workers.clamp(1, n.max(1));
    let chunk = n.div_ceil(workers).max(1);
    let f = &f;
    thread::scope(|s| {
        let handles = (0..n)
            .step_by(chunk)
            .map(|start| {
                let end = (start + chunk).min(n);
                s.spawn(move || (start..end).map(f).collect::<Vec<_>>())
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .flat_map(|h| match h.join() {
                Ok(results) => results,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FeatureSchema;

    #[test]
    fn test_parallel_map_keeps_order() {
        for workers in [1, 3, 8, 64] {
            let out = parallel_map(37, workers, |i| i * i);
            assert_eq!(out, (0..37).map(|i| i * i).collect::<Vec<_>>());
        }
        assert!(parallel_map(0, 4, |i| i).is_empty());
    }

    #[test]
    fn test_check_trainable() {
        let schema = FeatureSchema::from_names(vec!["x".to_owned()]);
        let one_class = Dataset::new(schema.clone(), vec![vec![0.0], vec![1.0]], vec![true, true]);
        assert_eq!(
            check_trainable(&one_class),
            Err(FitError::SingleClass {
                detections: 2,
                rows: 2
            })
        );
        let empty = Dataset::new(schema, vec![], vec![]);
        assert_eq!(check_trainable(&empty), Err(FitError::Empty));
    }
}
