use std::path::{Path, PathBuf};

use encounter_data::table::ChecklistTable;

use crate::{
    command::{Context, ModelChoice},
    config::PipelineConfig,
    pipeline::{self, TrainedModel},
    util::{self, Output},
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Joined checklist table
    #[arg(long)]
    input: PathBuf,
    /// Directory the model summary and test predictions are written to
    #[arg(long)]
    output_dir: PathBuf,
    #[clap(flatten)]
    model: ModelChoice,
}

/// Fits the model and writes `model.json` and `test_predictions.csv` into
/// `dir`.
pub(crate) fn train_stage(
    table: &ChecklistTable,
    dir: &Path,
    config: &PipelineConfig,
) -> anyhow::Result<TrainedModel> {
    util::create_dir(dir)?;
    let trained = pipeline::fit(table, config)?;
    Output::save_json(&trained.summary(config), Some(&dir.join("model.json")))?;
    trained.save_test_predictions(table, &dir.join("test_predictions.csv"))?;
    Ok(trained)
}

pub(crate) fn run(arg: &TrainArg, ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.config_for(&arg.model);
    let table = util::read_table(&arg.input)?;
    train_stage(&table, &arg.output_dir, &config)?;
    Ok(())
}
