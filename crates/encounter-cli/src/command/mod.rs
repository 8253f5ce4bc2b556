use std::path::PathBuf;

use clap::{Parser, Subcommand};

use encounter_model::evaluation::ModelKind;

use crate::config::PipelineConfig;

use self::{
    filter::FilterArg, join::JoinArg, plot::PlotArg, predict::PredictArg, run::RunArg,
    summarize::SummarizeArg, train::TrainArg, tune::TuneArg, undersample::UndersampleArg,
};

mod filter;
mod join;
mod plot;
mod predict;
mod run;
mod summarize;
mod train;
mod tune;
mod undersample;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// TOML file overriding the default pipeline settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Rerun cached stages even when their outputs are up to date
    #[arg(long, global = true)]
    force: bool,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Filter and zero-fill the eBird extracts
    Filter(#[clap(flatten)] FilterArg),
    /// Attach habitat covariates to filtered checklists
    Join(#[clap(flatten)] JoinArg),
    /// Keep one checklist per hexagon, week, year and detection class
    Undersample(#[clap(flatten)] UndersampleArg),
    /// Print descriptive statistics of a checklist table
    Summarize(#[clap(flatten)] SummarizeArg),
    /// Draw detection frequency charts
    Plot(#[clap(flatten)] PlotArg),
    /// Fit, calibrate and evaluate the encounter model
    Train(#[clap(flatten)] TrainArg),
    /// Search boosting hyperparameters
    Tune(#[clap(flatten)] TuneArg),
    /// Predict encounter rates over the prediction surface
    Predict(#[clap(flatten)] PredictArg),
    /// Run every stage from the extracts to the map
    Run(#[clap(flatten)] RunArg),
}

/// Settings and flags shared by every command.
#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub config: PipelineConfig,
    pub force: bool,
}

impl Context {
    /// The config with the model choices of the command line applied.
    fn config_for(&self, args: &ModelChoice) -> PipelineConfig {
        let mut config = self.config.clone();
        if let Some(model) = args.model {
            config.model = model.into();
        }
        if args.undersample {
            config.undersample.enabled = true;
        }
        config
    }
}

/// Model options shared by the commands that fit a model.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ModelChoice {
    /// Model to fit, overriding the config
    #[arg(long, value_enum)]
    model: Option<ModelArg>,
    /// Fit on spatially undersampled training checklists
    #[arg(long)]
    undersample: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ModelArg {
    RandomForest,
    GradientBoosting,
}

impl From<ModelArg> for ModelKind {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::RandomForest => ModelKind::RandomForest,
            ModelArg::GradientBoosting => ModelKind::GradientBoosting,
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    let ctx = Context {
        config: PipelineConfig::load(args.config.as_deref())?,
        force: args.force,
    };
    match args.mode {
        Mode::Filter(arg) => filter::run(&arg, &ctx)?,
        Mode::Join(arg) => join::run(&arg, &ctx)?,
        Mode::Undersample(arg) => undersample::run(&arg, &ctx)?,
        Mode::Summarize(arg) => summarize::run(&arg)?,
        Mode::Plot(arg) => plot::run(&arg, &ctx)?,
        Mode::Train(arg) => train::run(&arg, &ctx)?,
        Mode::Tune(arg) => tune::run(&arg, &ctx)?,
        Mode::Predict(arg) => predict::run(&arg, &ctx)?,
        Mode::Run(arg) => run::run(&arg, &ctx)?,
    }
    Ok(())
}
