use std::path::{Path, PathBuf};

use anyhow::{Context as _, ensure};
use rand::SeedableRng as _;
use rand_pcg::Pcg64;

use encounter_data::table::ChecklistTable;
use encounter_model::{
    dataset::Dataset,
    split::train_test_split,
    tuning::{self, TuningReport},
};

use crate::{
    command::Context,
    config::PipelineConfig,
    util::{self, Output},
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TuneArg {
    /// Joined checklist table
    #[arg(long)]
    input: PathBuf,
    /// Output file path (defaults to stdout)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Number of generations, overriding the config
    #[arg(long)]
    generations: Option<usize>,
    /// Population size, overriding the config
    #[arg(long)]
    population: Option<usize>,
}

/// Searches boosting hyperparameters on the training rows of the standard
/// split. The test rows are never seen.
pub(crate) fn tune_stage(
    table: &ChecklistTable,
    output: Option<&Path>,
    config: &PipelineConfig,
) -> anyhow::Result<TuningReport> {
    ensure!(
        (0.0..=1.0).contains(&config.train_fraction),
        "train_fraction must be in [0, 1], got {}",
        config.train_fraction
    );
    let mut rng = Pcg64::seed_from_u64(config.seed);
    let data = Dataset::from_table(table);
    let split = train_test_split(data.len(), config.train_fraction, &mut rng);
    let train = data.subset(&split.train);
    let report = tuning::tune(&train, &config.tuning, &config.boosting, &mut rng)
        .context("Failed to tune boosting hyperparameters")?;
    tracing::info!(
        cv_auc = report.best.cv_auc,
        rounds = report.best.rounds,
        learning_rate = report.best.params.learning_rate,
        max_depth = report.best.params.max_depth,
        "best hyperparameters"
    );
    Output::save_json(&report, output)?;
    Ok(report)
}

pub(crate) fn run(arg: &TuneArg, ctx: &Context) -> anyhow::Result<()> {
    let mut config = ctx.config.clone();
    if let Some(generations) = arg.generations {
        config.tuning.generations = generations;
    }
    if let Some(population) = arg.population {
        config.tuning.population = population;
    }
    let table = util::read_table(&arg.input)?;
    tune_stage(&table, arg.output.as_deref(), &config)?;
    Ok(())
}
