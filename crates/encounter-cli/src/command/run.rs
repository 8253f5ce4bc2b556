use std::path::PathBuf;

use crate::{
    command::{
        Context, ModelChoice, filter, join, plot,
        predict::{self, MapInputs},
        summarize, train, tune, undersample,
    },
    util,
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RunArg {
    /// Observation extract (EBD, tab separated)
    #[arg(long)]
    observations: PathBuf,
    /// Sampling event extract (SED, tab separated)
    #[arg(long)]
    sampling_events: PathBuf,
    /// Covariates keyed by latitude, longitude and year
    #[arg(long)]
    covariates: PathBuf,
    /// Prediction surface (`cell_id,latitude,longitude,<covariates>`)
    #[arg(long)]
    surface: PathBuf,
    /// GeoPackage with boundaries drawn over the map
    #[arg(long)]
    boundaries: Option<PathBuf>,
    /// Boundary layer name (defaults to the first feature layer)
    #[arg(long, requires = "boundaries")]
    layer: Option<String>,
    /// Directory every output is written to
    #[arg(long)]
    output_dir: PathBuf,
    #[clap(flatten)]
    model: ModelChoice,
    /// Also search boosting hyperparameters
    #[arg(long)]
    tune: bool,
}

pub(crate) fn run(arg: &RunArg, ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.config_for(&arg.model);
    let dir = &arg.output_dir;
    util::create_dir(dir)?;

    let checklists = dir.join("checklists.csv");
    filter::filter_stage(
        &arg.observations,
        &arg.sampling_events,
        &checklists,
        Some(&dir.join("filter_report.json")),
        ctx,
    )?;
    let encounters = dir.join("encounters.csv");
    join::join_stage(&checklists, &arg.covariates, &encounters, ctx)?;
    let table = util::read_table(&encounters)?;

    summarize::summarize_stage(&table, Some(&dir.join("summary.json")))?;
    undersample::undersample_stage(
        &table,
        &dir.join("undersampled.csv"),
        Some(&dir.join("undersample_report.json")),
        config.undersample.spacing_m,
        &config,
    )?;
    plot::plot_stage(&table, &dir.join("charts"), &config)?;
    let trained = train::train_stage(&table, &dir.join("model"), &config)?;
    if arg.tune {
        tune::tune_stage(&table, Some(&dir.join("tuning.json")), &config)?;
    }
    let inputs = MapInputs {
        surface: &arg.surface,
        boundaries: arg.boundaries.as_deref(),
        layer: arg.layer.as_deref(),
    };
    predict::predict_stage(
        &trained,
        &table.covariate_names,
        inputs,
        &dir.join("map"),
        &config,
    )?;
    tracing::info!(output_dir = %dir.display(), "pipeline finished");
    Ok(())
}
