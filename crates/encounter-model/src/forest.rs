//! Balanced random forest for detection probability.
//!
//! Each tree is grown on a class-balanced bootstrap: with detection
//! prevalence `f` over `n` training rows, `round(f·n)` detections and
//! `round(f·n)` non-detections are drawn with replacement. Rare detections
//! are therefore as frequent as non-detections in every bag, which keeps the
//! trees from collapsing to "never detected".
//!
//! The forest score is the mean over trees of the leaf detection frequency.
//! Rows left out of a tree's bag are scored by that tree to give
//! out-of-bag predictions, which the calibration step uses.

use rand::{Rng, SeedableRng as _};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::{
    classifier::{self, Classifier, FitError},
    dataset::Dataset,
    tree::{RegressionTree, TreeParams},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub num_trees: usize,
    /// Tree limits; `mtry = None` uses `floor(sqrt(p))`.
    pub tree: TreeParams,
    /// Draw class-balanced bags instead of plain bootstrap samples.
    pub balanced: bool,
    /// Worker threads; `None` uses the available parallelism.
    pub threads: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            num_trees: 500,
            tree: TreeParams {
                max_depth: None,
                min_node_size: 10,
                mtry: None,
            },
            balanced: true,
            threads: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    importance: Vec<f64>,
    oob: Vec<Option<f64>>,
}

struct FittedTree {
    tree: RegressionTree,
    importance: Vec<f64>,
    in_bag: Vec<bool>,
}

/// `floor(sqrt(p))`, at least 1.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn default_mtry(num_features: usize) -> usize {
    ((num_features as f64).sqrt().floor() as usize).max(1)
}

/// Draws a bag of row indices.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn draw_bag<R>(labels: &[bool], balanced: bool, rng: &mut R) -> Vec<usize>
where
    R: Rng + ?Sized,
{
    let n = labels.len();
    if !balanced {
        return (0..n).map(|_| rng.random_range(0..n)).collect();
    }
    let (positives, negatives): (Vec<usize>, Vec<usize>) = (0..n).partition(|&i| labels[i]);
    let prevalence = positives.len() as f64 / n as f64;
    let per_class = ((prevalence * n as f64).round() as usize).max(1);
    let mut bag = Vec::with_capacity(2 * per_class);
    for class in [&positives, &negatives] {
        bag.extend((0..per_class).map(|_| class[rng.random_range(0..class.len())]));
    }
    bag
}

impl RandomForest {
    /// Grows the forest. Trees are grown in parallel, each with its own
    /// generator seeded from `rng`, so the result depends only on the data
    /// and the generator state.
    pub fn fit<R>(data: &Dataset, params: &ForestParams, rng: &mut R) -> Result<Self, FitError>
    where
        R: Rng + ?Sized,
    {
        if params.num_trees == 0 {
            return Err(FitError::NoTrees);
        }
        classifier::check_trainable(data)?;
        let tree_params = TreeParams {
            mtry: Some(
                params
                    .tree
                    .mtry
                    .unwrap_or_else(|| default_mtry(data.num_features())),
            ),
            ..params.tree
        };
        let targets = data
            .labels()
            .iter()
            .map(|&l| f64::from(u8::from(l)))
            .collect::<Vec<_>>();
        let seeds = (0..params.num_trees)
            .map(|_| rng.random::<u64>())
            .collect::<Vec<_>>();

        let workers = classifier::worker_count(params.threads);
        let fitted = classifier::parallel_map(params.num_trees, workers, |i| {
            let mut rng = Pcg64::seed_from_u64(seeds[i]);
            let bag = draw_bag(data.labels(), params.balanced, &mut rng);
            let mut in_bag = vec![false; data.len()];
            for &r in &bag {
                in_bag[r] = true;
            }
            let grown = RegressionTree::fit(data, &targets, bag, &tree_params, &mut rng);
            FittedTree {
                tree: grown.tree,
                importance: grown.importance,
                in_bag,
            }
        });

        Ok(Self::assemble(data, fitted))
    }

    #[expect(clippy::cast_precision_loss)]
    fn assemble(data: &Dataset, fitted: Vec<FittedTree>) -> Self {
        let mut importance = vec![0.0; data.num_features()];
        let mut oob_sum = vec![0.0; data.len()];
        let mut oob_count = vec![0_usize; data.len()];
        let mut trees = Vec::with_capacity(fitted.len());
        for t in fitted {
            for (total, v) in importance.iter_mut().zip(&t.importance) {
                *total += v;
            }
            for (i, &in_bag) in t.in_bag.iter().enumerate() {
                if !in_bag {
                    oob_sum[i] += t.tree.predict(data.row(i));
                    oob_count[i] += 1;
                }
            }
            trees.push(t.tree);
        }
        let num_trees = trees.len() as f64;
        for v in &mut importance {
            *v /= num_trees;
        }
        let oob = oob_sum
            .into_iter()
            .zip(oob_count)
            .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
            .collect::<Vec<_>>();
        tracing::debug!(
            trees = trees.len(),
            oob_rows = oob.iter().filter(|v| v.is_some()).count(),
            "grew random forest"
        );
        Self {
            trees,
            importance,
            oob,
        }
    }

    #[must_use]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean impurity decrease per feature, averaged over trees.
    #[must_use]
    pub fn importance(&self) -> &[f64] {
        &self.importance
    }

    /// Out-of-bag score of every training row; `None` for rows that were in
    /// every bag.
    #[must_use]
    pub fn oob_scores(&self) -> &[Option<f64>] {
        &self.oob
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    #[expect(clippy::cast_precision_loss)]
    fn score(&self, x: &[f64]) -> f64 {
        let sum = self.trees.iter().map(|t| t.predict(x)).sum::<f64>();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }

    fn importance(&self) -> Option<&[f64]> {
        Some(&self.importance)
    }
}

#[cfg(test)]
mod tests {
    use encounter_stats::classification::auc;

    use super::*;
    use crate::dataset::tests::synthetic;

    fn small_params() -> ForestParams {
        ForestParams {
            num_trees: 40,
            tree: TreeParams {
                max_depth: None,
                min_node_size: 5,
                mtry: None,
            },
            balanced: true,
            threads: Some(3),
        }
    }

    #[test]
    fn test_balanced_bag_sizes() {
        let labels = (0..100).map(|i| i < 10).collect::<Vec<_>>();
        let bag = draw_bag(&labels, true, &mut Pcg64::seed_from_u64(0));
        assert_eq!(bag.len(), 20);
        assert_eq!(bag.iter().filter(|&&i| labels[i]).count(), 10);
    }

    #[test]
    fn test_forest_separates_signal() {
        let train = synthetic(400, 11);
        let test = synthetic(200, 12);
        let forest =
            RandomForest::fit(&train, &small_params(), &mut Pcg64::seed_from_u64(5)).unwrap();
        let scores = forest.score_all(test.rows());
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        assert!(auc(&scores, test.labels()).unwrap() > 0.7);
        assert!(forest.importance()[0] > forest.importance()[1]);
        assert!(forest.oob_scores().iter().filter(|s| s.is_some()).count() > 300);
    }

    #[test]
    fn test_forest_is_deterministic_across_thread_counts() {
        let data = synthetic(150, 3);
        let fit = |threads| {
            let params = ForestParams {
                threads: Some(threads),
                ..small_params()
            };
            let forest = RandomForest::fit(&data, &params, &mut Pcg64::seed_from_u64(9)).unwrap();
            forest.score_all(data.rows())
        };
        assert_eq!(fit(1), fit(4));
    }

    #[test]
    fn test_zero_trees_is_an_error() {
        let params = ForestParams {
            num_trees: 0,
            ..small_params()
        };
        let result = RandomForest::fit(&synthetic(50, 1), &params, &mut Pcg64::seed_from_u64(0));
        assert!(matches!(result, Err(FitError::NoTrees)));
    }

    #[test]
    fn test_default_mtry() {
        assert_eq!(default_mtry(1), 1);
        assert_eq!(default_mtry(16), 4);
        assert_eq!(default_mtry(30), 5);
    }
}
