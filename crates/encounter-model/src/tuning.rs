//! Evolutionary search over boosting hyperparameters.
//!
//! Candidates are gene vectors in the unit cube (see [`genes`]), decoded
//! onto the ranges of a [`SearchSpace`]. Fitness is the cross-validated AUC
//! of a [`GradientBoosting`] fit with the decoded parameters.
//!
//! Each generation:
//!
//! 1. Scores every candidate (in parallel, each with its own seed).
//! 2. Keeps the `elite_count` best unchanged.
//! 3. Fills the rest with children of tournament-selected parents, using
//!    BLX-α crossover and Gaussian mutation.
//!
//! The search reports its best candidate; it never feeds the model that is
//! trained and evaluated by the pipeline.

use rand::{Rng, SeedableRng as _, seq::IndexedRandom as _};
use rand_distr::{Normal, NormalError};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use encounter_stats::descriptive::DescriptiveStats;

use crate::{
    boosting::{BoostingParams, GradientBoosting},
    classifier::{self, FitError},
    dataset::Dataset,
    genes,
};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum TuneError {
    #[display("invalid mutation sigma")]
    Sigma(NormalError),
    #[display("candidate fit failed")]
    Fit(FitError),
    #[display("population must hold more than {elite_count} candidates")]
    #[from(ignore)]
    Population { elite_count: usize },
    #[display("mutation rate must be in [0, 1], got {rate}")]
    #[from(ignore)]
    MutationRate { rate: f64 },
    #[display("BLX-α must be non-negative and finite, got {alpha}")]
    #[from(ignore)]
    BlxAlpha { alpha: f64 },
}

/// Ranges searched for each tuned hyperparameter, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpace {
    pub learning_rate: (f64, f64),
    pub max_depth: (usize, usize),
    pub subsample: (f64, f64),
    pub min_node_size: (usize, usize),
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            learning_rate: (0.01, 0.3),
            max_depth: (1, 8),
            subsample: (0.5, 1.0),
            min_node_size: (2, 50),
        }
    }
}

const GENE_COUNT: usize = 4;

impl SearchSpace {
    /// Maps genes in `[0, 1]` onto the ranges; everything else comes from
    /// `base`. The learning rate is interpolated on a log scale.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    #[must_use]
    pub fn decode(&self, genes: &[f64], base: &BoostingParams) -> BoostingParams {
        assert_eq!(genes.len(), GENE_COUNT);
        let lerp = |(lo, hi): (f64, f64), t: f64| lo + (hi - lo) * t;
        let step = |(lo, hi): (usize, usize), t: f64| {
            lo + ((hi.saturating_sub(lo)) as f64 * t).round() as usize
        };
        let (lr_lo, lr_hi) = self.learning_rate;
        BoostingParams {
            learning_rate: lerp((lr_lo.ln(), lr_hi.ln()), genes[0]).exp(),
            max_depth: step(self.max_depth, genes[1]),
            subsample: lerp(self.subsample, genes[2]),
            min_node_size: step(self.min_node_size, genes[3]),
            ..*base
        }
    }
}

/// Controls how one generation becomes the next.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationEvolver {
    pub elite_count: usize,
    /// Larger tournaments select more greedily.
    pub tournament_size: usize,
    pub blx_alpha: f64,
    pub mutation_sigma: f64,
    /// Chance that each gene is mutated.
    pub mutation_rate: f64,
}

impl Default for PopulationEvolver {
    fn default() -> Self {
        Self {
            elite_count: 2,
            tournament_size: 2,
            blx_alpha: 0.5,
            mutation_sigma: 0.1,
            mutation_rate: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub population: usize,
    pub generations: usize,
    pub space: SearchSpace,
    pub evolver: PopulationEvolver,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            population: 12,
            generations: 8,
            space: SearchSpace::default(),
            evolver: PopulationEvolver::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct Individual {
    genes: Vec<f64>,
    fitness: f64,
}

/// A scored set of hyperparameters.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub params: BoostingParams,
    pub cv_auc: f64,
    pub rounds: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub generation: usize,
    pub best: Candidate,
    pub fitness: Option<DescriptiveStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TuningReport {
    pub generations: Vec<GenerationSummary>,
    pub best: Candidate,
}

impl PopulationEvolver {
    /// Builds the next generation from `population`, sorted best first.
    fn evolve<R>(
        &self,
        population: &[Individual],
        noise: &Normal<f64>,
        rng: &mut R,
    ) -> Vec<Individual>
    where
        R: Rng + ?Sized,
    {
        assert!(population.is_sorted_by(|a, b| a.fitness >= b.fitness));
        let mut next = population[..self.elite_count].to_vec();
        while next.len() < population.len() {
            let p1 = tournament_select(population, self.tournament_size, rng);
            let p2 = tournament_select(population, self.tournament_size, rng);
            let mut child = genes::blx_alpha(&p1.genes, &p2.genes, self.blx_alpha, rng);
            genes::mutate(&mut child, noise, self.mutation_rate, rng);
            next.push(Individual {
                genes: child,
                fitness: f64::NEG_INFINITY,
            });
        }
        next
    }
}

/// Best of `tournament_size` candidates drawn without replacement.
fn tournament_select<'a, R>(
    population: &'a [Individual],
    tournament_size: usize,
    rng: &mut R,
) -> &'a Individual
where
    R: Rng + ?Sized,
{
    population
        .choose_multiple(rng, tournament_size.max(1))
        .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
        .unwrap_or(&population[0])
}

/// Scores every individual and sorts them best first.
fn evaluate<R>(
    population: &mut Vec<Individual>,
    data: &Dataset,
    config: &TuningConfig,
    base: &BoostingParams,
    rng: &mut R,
) -> Result<Vec<Candidate>, FitError>
where
    R: Rng + ?Sized,
{
    let seeds = population.iter().map(|_| rng.random::<u64>()).collect::<Vec<_>>();
    let workers = classifier::worker_count(base.threads);
    let individuals: &[Individual] = population;
    let results = classifier::parallel_map(individuals.len(), workers, |i| {
        let params = BoostingParams {
            threads: Some(1),
            ..config.space.decode(&individuals[i].genes, base)
        };
        let mut rng = Pcg64::seed_from_u64(seeds[i]);
        GradientBoosting::fit(data, &params, &mut rng).map(|gbm| Candidate {
            params: BoostingParams {
                threads: base.threads,
                ..params
            },
            cv_auc: gbm.cross_validation().best_auc,
            rounds: gbm.cross_validation().best_rounds,
        })
    });
    let candidates = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    let mut scored = population
        .drain(..)
        .zip(candidates)
        .map(|(mut ind, c)| {
            ind.fitness = c.cv_auc;
            (ind, c)
        })
        .collect::<Vec<_>>();
    scored.sort_by(|a, b| b.1.cv_auc.total_cmp(&a.1.cv_auc));
    let (individuals, candidates) = scored.into_iter().unzip();
    *population = individuals;
    Ok(candidates)
}

/// Runs the search on `data`. Parameters that are not tuned come from
/// `base`.
pub fn tune<R>(
    data: &Dataset,
    config: &TuningConfig,
    base: &BoostingParams,
    rng: &mut R,
) -> Result<TuningReport, TuneError>
where
    R: Rng + ?Sized,
{
    let evolver = &config.evolver;
    if config.population <= evolver.elite_count {
        return Err(TuneError::Population {
            elite_count: evolver.elite_count,
        });
    }
    if !(0.0..=1.0).contains(&evolver.mutation_rate) {
        return Err(TuneError::MutationRate {
            rate: evolver.mutation_rate,
        });
    }
    if !(evolver.blx_alpha >= 0.0 && evolver.blx_alpha.is_finite()) {
        return Err(TuneError::BlxAlpha {
            alpha: evolver.blx_alpha,
        });
    }
    let noise = Normal::new(0.0, evolver.mutation_sigma)?;
    let mut population = (0..config.population)
        .map(|_| Individual {
            genes: genes::random(rng, GENE_COUNT),
            fitness: f64::NEG_INFINITY,
        })
        .collect::<Vec<_>>();

    let mut generations = vec![];
    let mut best: Option<Candidate> = None;
    for generation in 0..config.generations.max(1) {
        let candidates = evaluate(&mut population, data, config, base, rng)?;
        let leader = candidates[0].clone();
        tracing::info!(
            generation,
            cv_auc = leader.cv_auc,
            learning_rate = leader.params.learning_rate,
            max_depth = leader.params.max_depth,
            "evaluated generation"
        );
        if best.as_ref().is_none_or(|b| leader.cv_auc > b.cv_auc) {
            best = Some(leader.clone());
        }
        generations.push(GenerationSummary {
            generation,
            best: leader,
            fitness: DescriptiveStats::new(candidates.iter().map(|c| c.cv_auc)),
        });
        if generation + 1 < config.generations {
            population = evolver.evolve(&population, &noise, rng);
        }
    }

    let best = best.unwrap_or_else(|| unreachable!("at least one generation runs"));
    Ok(TuningReport { generations, best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::synthetic;

    #[test]
    fn test_decode_corners() {
        let space = SearchSpace::default();
        let base = BoostingParams::default();
        let low = space.decode(&[0.0; 4], &base);
        assert!((low.learning_rate - 0.01).abs() < 1e-12);
        assert_eq!(low.max_depth, 1);
        assert_eq!(low.min_node_size, 2);
        let high = space.decode(&[1.0; 4], &base);
        assert!((high.learning_rate - 0.3).abs() < 1e-12);
        assert_eq!(high.max_depth, 8);
        assert!((high.subsample - 1.0).abs() < 1e-12);
        assert_eq!(high.cv_folds, base.cv_folds);
    }

    #[test]
    fn test_tournament_prefers_fitter() {
        let population = vec![
            Individual {
                genes: vec![0.0; 4],
                fitness: 0.9,
            },
            Individual {
                genes: vec![1.0; 4],
                fitness: 0.6,
            },
        ];
        let mut rng = Pcg64::seed_from_u64(0);
        for _ in 0..10 {
            assert_eq!(tournament_select(&population, 2, &mut rng).fitness, 0.9);
        }
    }

    #[test]
    fn test_tune_reports_best_candidate() {
        let data = synthetic(200, 51);
        let config = TuningConfig {
            population: 4,
            generations: 2,
            ..TuningConfig::default()
        };
        let base = BoostingParams {
            max_rounds: 30,
            cv_folds: 3,
            early_stopping_rounds: 5,
            threads: Some(2),
            ..BoostingParams::default()
        };
        let report = tune(&data, &config, &base, &mut Pcg64::seed_from_u64(3)).unwrap();
        assert_eq!(report.generations.len(), 2);
        let best_seen = report
            .generations
            .iter()
            .map(|g| g.best.cv_auc)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(report.best.cv_auc, best_seen);
        assert!(report.best.cv_auc > 0.6);
        assert_eq!(report.best.params.threads, Some(2));
    }

    #[test]
    fn test_population_must_exceed_elites() {
        let data = synthetic(50, 1);
        let config = TuningConfig {
            population: 2,
            ..TuningConfig::default()
        };
        let err = tune(
            &data,
            &config,
            &BoostingParams::default(),
            &mut Pcg64::seed_from_u64(0),
        );
        assert!(matches!(err, Err(TuneError::Population { elite_count: 2 })));
    }

    #[test]
    fn test_evolver_settings_are_checked() {
        let data = synthetic(50, 1);
        let run = |evolver| {
            let config = TuningConfig {
                evolver,
                ..TuningConfig::default()
            };
            tune(
                &data,
                &config,
                &BoostingParams::default(),
                &mut Pcg64::seed_from_u64(0),
            )
        };
        for rate in [-0.1, 1.5, f64::NAN] {
            let evolver = PopulationEvolver {
                mutation_rate: rate,
                ..PopulationEvolver::default()
            };
            assert!(matches!(run(evolver), Err(TuneError::MutationRate { .. })));
        }
        let evolver = PopulationEvolver {
            blx_alpha: -0.5,
            ..PopulationEvolver::default()
        };
        assert!(matches!(run(evolver), Err(TuneError::BlxAlpha { .. })));
        let evolver = PopulationEvolver {
            mutation_sigma: -1.0,
            ..PopulationEvolver::default()
        };
        assert!(matches!(run(evolver), Err(TuneError::Sigma(_))));
    }
}
