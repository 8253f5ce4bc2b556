//! CART regression trees.
//!
//! Trees are grown greedily: every node picks the split that most reduces
//! the sum of squared errors of its targets. For 0/1 targets this is the
//! Gini impurity decrease scaled by the node size, so the same grower serves
//! the random forest (targets are labels) and gradient boosting (targets
//! are residuals).
//!
//! Nodes are stored in a flat array. Rows with `x[feature] <= threshold` go
//! left.

use rand::{Rng, seq::index};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;

/// Growth limits of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth; the root has depth 0. `None` grows until other limits
    /// stop it.
    pub max_depth: Option<usize>,
    /// Minimum number of rows in each child of a split.
    pub min_node_size: usize,
    /// Features tried at each split; `None` tries all of them.
    pub mtry: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

/// A fitted tree with the impurity decrease attributed to each feature.
#[derive(Debug, Clone)]
pub struct GrownTree {
    pub tree: RegressionTree,
    pub importance: Vec<f64>,
}

impl RegressionTree {
    /// Grows a tree on `rows` of `data` (duplicates allowed) against
    /// `targets`, which is indexed by row like `data`.
    pub fn fit<R>(
        data: &Dataset,
        targets: &[f64],
        rows: Vec<usize>,
        params: &TreeParams,
        rng: &mut R,
    ) -> GrownTree
    where
        R: Rng + ?Sized,
    {
        assert_eq!(data.len(), targets.len(), "targets must match rows");
        assert!(!rows.is_empty(), "cannot grow a tree on no rows");
        let mut grower = Grower {
            data,
            targets,
            params,
            rng,
            nodes: vec![],
            importance: vec![0.0; data.num_features()],
        };
        grower.grow(rows, 0);
        GrownTree {
            tree: Self {
                nodes: grower.nodes,
            },
            importance: grower.importance,
        }
    }

    /// Index of the leaf node `x` falls into.
    #[must_use]
    pub fn leaf(&self, x: &[f64]) -> usize {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if x[feature] <= threshold { left } else { right },
            }
        }
    }

    #[must_use]
    pub fn predict(&self, x: &[f64]) -> f64 {
        match self.nodes[self.leaf(x)] {
            Node::Leaf { value } => value,
            Node::Split { .. } => unreachable!("leaf() returns a leaf"),
        }
    }

    /// Replaces the value of every leaf with `f(leaf_index)`.
    pub fn map_leaves<F>(&mut self, mut f: F)
    where
        F: FnMut(usize) -> f64,
    {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            if let Node::Leaf { value } = node {
                *value = f(i);
            }
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn num_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

struct Grower<'a, R: ?Sized> {
    data: &'a Dataset,
    targets: &'a [f64],
    params: &'a TreeParams,
    rng: &'a mut R,
    nodes: Vec<Node>,
    importance: Vec<f64>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl<R> Grower<'_, R>
where
    R: Rng + ?Sized,
{
    #[expect(clippy::cast_precision_loss)]
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        let mean = rows.iter().map(|&r| self.targets[r]).sum::<f64>() / rows.len() as f64;
        self.nodes.push(Node::Leaf { value: mean });

        let depth_left = self.params.max_depth.is_none_or(|max| depth < max);
        if !depth_left || rows.len() < 2 * self.params.min_node_size.max(1) {
            return idx;
        }
        let Some(best) = self.best_split(&rows) else {
            return idx;
        };

        self.importance[best.feature] += best.gain;
        let (left_rows, right_rows): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .partition(|&r| self.data.value(r, best.feature) <= best.threshold);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&mut self, rows: &[usize]) -> Option<Candidate> {
        let p = self.data.num_features();
        let mtry = self.params.mtry.unwrap_or(p).clamp(1, p);
        let features = index::sample(self.rng, p, mtry);

        let mut best: Option<Candidate> = None;
        let mut sorted = rows.to_vec();
        for feature in features {
            let Some(c) = self.best_split_on(feature, &mut sorted) else {
                continue;
            };
            if best.as_ref().is_none_or(|b| c.gain > b.gain) {
                best = Some(c);
            }
        }
        best
    }

    /// Best threshold on one feature; `sorted` is reordered in place.
    #[expect(clippy::cast_precision_loss)]
    fn best_split_on(&self, feature: usize, sorted: &mut [usize]) -> Option<Candidate> {
        let value = |r: usize| self.data.value(r, feature);
        sorted.sort_by(|&a, &b| value(a).total_cmp(&value(b)));

        let n = sorted.len();
        let min = self.params.min_node_size.max(1);
        let total = sorted.iter().map(|&r| self.targets[r]).sum::<f64>();
        let parent = total * total / n as f64;

        let mut best: Option<Candidate> = None;
        let mut left_sum = 0.0;
        for i in 1..n {
            left_sum += self.targets[sorted[i - 1]];
            let (lo, hi) = (value(sorted[i - 1]), value(sorted[i]));
            if i < min || n - i < min || lo == hi {
                continue;
            }
            let right_sum = total - left_sum;
            let (nl, nr) = (i as f64, (n - i) as f64);
            let gain = left_sum * left_sum / nl + right_sum * right_sum / nr - parent;
            if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                best = Some(Candidate {
                    feature,
                    threshold: f64::midpoint(lo, hi),
                    gain,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64;

    use super::*;
    use crate::dataset::{FeatureSchema, tests::synthetic};

    fn params() -> TreeParams {
        TreeParams {
            max_depth: None,
            min_node_size: 1,
            mtry: None,
        }
    }

    #[test]
    fn test_step_function_is_learned() {
        let rows = (0..20).map(|i| vec![f64::from(i)]).collect::<Vec<_>>();
        let labels = (0..20).map(|i| i >= 12).collect::<Vec<_>>();
        let data = Dataset::new(FeatureSchema::from_names(vec!["x".to_owned()]), rows, labels);
        let targets = data
            .labels()
            .iter()
            .map(|&l| f64::from(u8::from(l)))
            .collect::<Vec<_>>();
        let grown = RegressionTree::fit(
            &data,
            &targets,
            (0..20).collect(),
            &params(),
            &mut Pcg64::seed_from_u64(0),
        );
        assert_eq!(grown.tree.num_leaves(), 2);
        assert_eq!(grown.tree.predict(&[11.0]), 0.0);
        assert_eq!(grown.tree.predict(&[11.6]), 1.0);
        assert!(grown.importance[0] > 0.0);
    }

    #[test]
    fn test_depth_and_node_size_limits() {
        let data = synthetic(200, 4);
        let targets = data
            .labels()
            .iter()
            .map(|&l| f64::from(u8::from(l)))
            .collect::<Vec<_>>();
        let stump = RegressionTree::fit(
            &data,
            &targets,
            (0..200).collect(),
            &TreeParams {
                max_depth: Some(1),
                ..params()
            },
            &mut Pcg64::seed_from_u64(0),
        );
        assert!(stump.tree.num_leaves() <= 2);

        let coarse = RegressionTree::fit(
            &data,
            &targets,
            (0..200).collect(),
            &TreeParams {
                min_node_size: 50,
                ..params()
            },
            &mut Pcg64::seed_from_u64(0),
        );
        assert!(coarse.tree.num_leaves() <= 4);
        // the signal feature dominates
        assert!(coarse.importance[0] > coarse.importance[1]);
    }

    #[test]
    fn test_map_leaves() {
        let data = synthetic(50, 2);
        let targets = vec![0.5; 50];
        let mut grown = RegressionTree::fit(
            &data,
            &targets,
            (0..50).collect(),
            &params(),
            &mut Pcg64::seed_from_u64(0),
        );
        // constant targets never split
        assert_eq!(grown.tree.num_leaves(), 1);
        grown.tree.map_leaves(|_| 2.0);
        assert_eq!(grown.tree.predict(data.row(0)), 2.0);
    }
}
