//! Gradient boosted trees with logistic loss.
//!
//! Each round fits a regression tree to the residuals `y - p` of the current
//! model on a row subsample, then replaces every leaf value by the Newton
//! step `Σ(y - p) / Σ p(1 - p)` over the rows in that leaf. The model's
//! log-odds grow by `learning_rate` times the tree output.
//!
//! The number of rounds is chosen by k-fold cross-validation: every fold is
//! boosted until its held-out AUC has not improved for
//! `early_stopping_rounds` rounds, the per-round AUC is averaged over folds,
//! and the round with the best mean AUC is refit on all training rows.

use rand::{Rng, SeedableRng as _, seq::index};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use encounter_stats::classification::auc;

use crate::{
    classifier::{self, Classifier, FitError},
    dataset::Dataset,
    split,
    tree::{RegressionTree, TreeParams},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    /// Upper bound on boosting rounds.
    pub max_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_node_size: usize,
    /// Fraction of rows drawn (without replacement) for each round.
    pub subsample: f64,
    pub cv_folds: usize,
    pub early_stopping_rounds: usize,
    pub threads: Option<usize>,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            max_rounds: 1000,
            learning_rate: 0.05,
            max_depth: 4,
            min_node_size: 10,
            subsample: 0.8,
            cv_folds: 5,
            early_stopping_rounds: 20,
            threads: None,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Log-odds of the training prevalence.
fn base_margin(data: &Dataset) -> f64 {
    let p = data.prevalence().clamp(1e-6, 1.0 - 1e-6);
    (p / (1.0 - p)).ln()
}

/// An additive tree model on the log-odds scale.
#[derive(Debug, Clone)]
pub struct Booster {
    base_margin: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl Booster {
    /// Log-odds using only the first `rounds` trees.
    #[must_use]
    pub fn margin(&self, x: &[f64], rounds: usize) -> f64 {
        self.trees
            .iter()
            .take(rounds)
            .fold(self.base_margin, |m, t| m + self.learning_rate * t.predict(x))
    }

    #[must_use]
    pub fn num_rounds(&self) -> usize {
        self.trees.len()
    }

    /// Boosts on `data`, calling `on_round` with the new tree after each
    /// round. Stops after `rounds` trees or when `on_round` returns `false`.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn train<R, F>(
        data: &Dataset,
        params: &BoostingParams,
        rounds: usize,
        rng: &mut R,
        mut on_round: F,
    ) -> Self
    where
        R: Rng + ?Sized,
        F: FnMut(&RegressionTree) -> bool,
    {
        let n = data.len();
        let mut booster = Self {
            base_margin: base_margin(data),
            learning_rate: params.learning_rate,
            trees: vec![],
        };
        let tree_params = TreeParams {
            max_depth: Some(params.max_depth),
            min_node_size: params.min_node_size,
            mtry: None,
        };
        let labels = data
            .labels()
            .iter()
            .map(|&l| f64::from(u8::from(l)))
            .collect::<Vec<_>>();
        let mut margins = vec![booster.base_margin; n];
        let sample_size = ((n as f64 * params.subsample).round() as usize).clamp(1, n);

        for _ in 0..rounds {
            let probs = margins.iter().map(|&m| sigmoid(m)).collect::<Vec<_>>();
            let residuals = labels
                .iter()
                .zip(&probs)
                .map(|(y, p)| y - p)
                .collect::<Vec<_>>();
            let mut rows = index::sample(rng, n, sample_size).into_vec();
            rows.sort_unstable();

            let mut tree =
                RegressionTree::fit(data, &residuals, rows.clone(), &tree_params, rng).tree;
            let mut numerators = vec![0.0; tree.nodes().len()];
            let mut denominators = vec![0.0; tree.nodes().len()];
            for &r in &rows {
                let leaf = tree.leaf(data.row(r));
                numerators[leaf] += residuals[r];
                denominators[leaf] += probs[r] * (1.0 - probs[r]);
            }
            tree.map_leaves(|leaf| numerators[leaf] / denominators[leaf].max(1e-12));

            for (i, m) in margins.iter_mut().enumerate() {
                *m += params.learning_rate * tree.predict(data.row(i));
            }
            let keep_going = on_round(&tree);
            booster.trees.push(tree);
            if !keep_going {
                break;
            }
        }
        booster
    }
}

/// Outcome of one cross-validation fold.
struct FoldRun {
    validation: Vec<usize>,
    booster: Booster,
    auc_by_round: Vec<f64>,
}

/// Cross-validation summary of a boosting fit.
#[derive(Debug, Clone, Serialize)]
pub struct CrossValidation {
    /// Mean held-out AUC after each round.
    pub mean_auc: Vec<f64>,
    /// Round count with the best mean AUC.
    pub best_rounds: usize,
    pub best_auc: f64,
}

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    booster: Booster,
    cv: CrossValidation,
    out_of_fold: Vec<f64>,
}

fn run_fold(
    data: &Dataset,
    validation: &[usize],
    params: &BoostingParams,
    seed: u64,
) -> FoldRun {
    let train = data.subset(&split::complement(data.len(), validation));
    let valid = data.subset(validation);
    let mut rng = Pcg64::seed_from_u64(seed);

    let mut margins = vec![base_margin(&train); valid.len()];
    let mut auc_by_round = vec![];
    let mut best = f64::NEG_INFINITY;
    let mut since_best = 0;
    let booster = Booster::train(&train, params, params.max_rounds, &mut rng, |tree| {
        for (i, m) in margins.iter_mut().enumerate() {
            *m += params.learning_rate * tree.predict(valid.row(i));
        }
        let round_auc = auc(&margins, valid.labels()).unwrap_or(0.5);
        auc_by_round.push(round_auc);
        if round_auc > best {
            best = round_auc;
            since_best = 0;
        } else {
            since_best += 1;
        }
        since_best < params.early_stopping_rounds
    });
    FoldRun {
        validation: validation.to_vec(),
        booster,
        auc_by_round,
    }
}

#[expect(clippy::cast_precision_loss)]
fn summarize_folds(runs: &[FoldRun]) -> CrossValidation {
    let len = runs.iter().map(|r| r.auc_by_round.len()).max().unwrap_or(0);
    // folds that stopped early keep their last AUC
    let mean_auc = (0..len)
        .map(|round| {
            runs.iter()
                .map(|r| {
                    r.auc_by_round
                        .get(round)
                        .or(r.auc_by_round.last())
                        .copied()
                        .unwrap_or(0.5)
                })
                .sum::<f64>()
                / runs.len() as f64
        })
        .collect::<Vec<_>>();
    let (best_index, best_auc) = mean_auc
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, a)| {
            if a > best.1 { (i, a) } else { best }
        });
    CrossValidation {
        best_rounds: best_index + 1,
        best_auc,
        mean_auc,
    }
}

impl GradientBoosting {
    pub fn fit<R>(data: &Dataset, params: &BoostingParams, rng: &mut R) -> Result<Self, FitError>
    where
        R: Rng + ?Sized,
    {
        classifier::check_trainable(data)?;
        if params.cv_folds < 2 || data.len() < 2 * params.cv_folds {
            return Err(FitError::TooFewRows {
                rows: data.len(),
                folds: params.cv_folds,
            });
        }
        let folds = split::k_folds(data.len(), params.cv_folds, rng);
        let seeds = folds.iter().map(|_| rng.random::<u64>()).collect::<Vec<_>>();
        let workers = classifier::worker_count(params.threads);
        let runs = classifier::parallel_map(folds.len(), workers, |i| {
            run_fold(data, &folds[i], params, seeds[i])
        });

        let cv = summarize_folds(&runs);
        let mut out_of_fold = vec![0.0; data.len()];
        for run in &runs {
            for &i in &run.validation {
                out_of_fold[i] = sigmoid(run.booster.margin(data.row(i), cv.best_rounds));
            }
        }
        tracing::info!(
            best_rounds = cv.best_rounds,
            cv_auc = cv.best_auc,
            "selected boosting rounds"
        );

        let booster = Booster::train(data, params, cv.best_rounds, rng, |_| true);
        Ok(Self {
            booster,
            cv,
            out_of_fold,
        })
    }

    #[must_use]
    pub fn cross_validation(&self) -> &CrossValidation {
        &self.cv
    }

    /// Score of every training row from the fold model that did not see it.
    #[must_use]
    pub fn out_of_fold_scores(&self) -> &[f64] {
        &self.out_of_fold
    }

    #[must_use]
    pub fn num_rounds(&self) -> usize {
        self.booster.num_rounds()
    }
}

impl Classifier for GradientBoosting {
    fn name(&self) -> &'static str {
        "gradient_boosting"
    }

    fn score(&self, x: &[f64]) -> f64 {
        sigmoid(self.booster.margin(x, self.booster.num_rounds()))
    }
}
