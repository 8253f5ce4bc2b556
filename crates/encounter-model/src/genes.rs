//! Gene vector operations for the hyperparameter search.
//!
//! A gene vector holds one value in `[0, 1]` per tuned hyperparameter; the
//! [`tuning`](crate::tuning) module maps it onto the actual parameter
//! ranges. Every operation here keeps genes inside the unit interval.

use rand::Rng;
use rand_distr::Normal;

/// Builds a gene vector by applying `f` to each index.
///
/// # Examples
///
/// ```
/// use encounter_model::genes;
///
/// let genes = genes::from_fn(|i| 1.0 / (i as f64 + 1.0), 3);
/// assert_eq!(genes, vec![1.0, 0.5, 1.0 / 3.0]);
/// ```
pub fn from_fn<F>(f: F, len: usize) -> Vec<f64>
where
    F: FnMut(usize) -> f64,
{
    (0..len).map(f).collect()
}

/// Genes drawn uniformly from `[0, 1]`.
pub fn random<R>(rng: &mut R, len: usize) -> Vec<f64>
where
    R: Rng + ?Sized,
{
    from_fn(|_| rng.random_range(0.0..=1.0), len)
}

/// BLX-α crossover.
///
/// Each child gene is drawn uniformly from the parents' range widened by
/// `alpha` times its length on both sides, then clamped to `[0, 1]`.
/// `alpha` must be non-negative.
///
/// # Examples
///
/// ```
/// use encounter_model::genes;
/// use rand::SeedableRng;
///
/// let mut rng = rand_pcg::Pcg64::seed_from_u64(0);
/// let child = genes::blx_alpha(&[0.2, 0.9], &[0.4, 0.9], 0.0, &mut rng);
/// assert!((0.2..=0.4).contains(&child[0]));
/// assert_eq!(child[1], 0.9);
/// ```
pub fn blx_alpha<R>(p1: &[f64], p2: &[f64], alpha: f64, rng: &mut R) -> Vec<f64>
where
    R: Rng + ?Sized,
{
    assert_eq!(p1.len(), p2.len());
    from_fn(
        |i| {
            let min = f64::min(p1[i], p2[i]);
            let max = f64::max(p1[i], p2[i]);
            let d = max - min;
            rng.random_range((min - alpha * d)..=(max + alpha * d))
                .clamp(0.0, 1.0)
        },
        p1.len(),
    )
}

/// Adds `N(0, σ)` noise to each gene with probability `rate`, which must
/// lie in `[0, 1]`.
pub fn mutate<R>(genes: &mut [f64], noise: &Normal<f64>, rate: f64, rng: &mut R)
where
    R: Rng + ?Sized,
{
    for g in genes {
        if rng.random_bool(rate) {
            *g = (*g + rng.sample(noise)).clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64;

    use super::*;

    #[test]
    fn test_operations_stay_in_unit_interval() {
        let mut rng = Pcg64::seed_from_u64(7);
        let noise = Normal::new(0.0, 2.0).unwrap();
        for _ in 0..100 {
            let a = random(&mut rng, 4);
            let b = random(&mut rng, 4);
            let mut child = blx_alpha(&a, &b, 0.5, &mut rng);
            mutate(&mut child, &noise, 1.0, &mut rng);
            assert!(child.iter().all(|g| (0.0..=1.0).contains(g)));
        }
    }

    #[test]
    fn test_zero_rate_keeps_genes() {
        let mut genes = vec![0.1, 0.5];
        let noise = Normal::new(0.0, 1.0).unwrap();
        mutate(&mut genes, &noise, 0.0, &mut Pcg64::seed_from_u64(0));
        assert_eq!(genes, [0.1, 0.5]);
    }
}
