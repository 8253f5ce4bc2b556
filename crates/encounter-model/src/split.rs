//! Random partitions of row indices.

use rand::{Rng, seq::SliceRandom as _};
use serde::Serialize;

/// Disjoint train and test row indices, each sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Randomly assigns `round(n * train_fraction)` of `0..n` to the training
/// set and the rest to the test set.
///
/// Every index appears in exactly one partition. The result depends only on
/// `n`, `train_fraction` and the generator state.
///
/// # Examples
///
/// ```
/// use encounter_model::split::train_test_split;
/// use rand::SeedableRng;
///
/// let mut rng = rand_pcg::Pcg64::seed_from_u64(1);
/// let split = train_test_split(10, 0.8, &mut rng);
/// assert_eq!(split.train.len(), 8);
/// assert_eq!(split.test.len(), 2);
/// ```
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn train_test_split<R>(n: usize, train_fraction: f64, rng: &mut R) -> Split
where
    R: Rng + ?Sized,
{
    assert!(
        (0.0..=1.0).contains(&train_fraction),
        "train fraction must be in [0, 1]"
    );
    let mut order = (0..n).collect::<Vec<_>>();
    order.shuffle(rng);
    let n_train = ((n as f64 * train_fraction).round() as usize).min(n);
    let mut test = order.split_off(n_train);
    let mut train = order;
    train.sort_unstable();
    test.sort_unstable();
    Split { train, test }
}

/// Partitions `0..n` into `k` folds of near-equal size.
///
/// Each fold is sorted ascending.
pub fn k_folds<R>(n: usize, k: usize, rng: &mut R) -> Vec<Vec<usize>>
where
    R: Rng + ?Sized,
{
    assert!(k > 0, "need at least one fold");
    let mut order = (0..n).collect::<Vec<_>>();
    order.shuffle(rng);
    let mut folds = vec![vec![]; k];
    for (i, idx) in order.into_iter().enumerate() {
        folds[i % k].push(idx);
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    folds
}

/// Indices of `0..n` not in `fold` (which must be sorted).
#[must_use]
pub fn complement(n: usize, fold: &[usize]) -> Vec<usize> {
    (0..n).filter(|i| fold.binary_search(i).is_err()).collect()
}
