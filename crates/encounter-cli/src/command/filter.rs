use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use encounter_data::{filter, table::ChecklistTable};

use crate::{
    command::Context,
    util::{self, Output},
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct FilterArg {
    /// Observation extract (EBD, tab separated)
    #[arg(long)]
    observations: PathBuf,
    /// Sampling event extract (SED, tab separated)
    #[arg(long)]
    sampling_events: PathBuf,
    /// Checklist table to write
    #[arg(long)]
    output: PathBuf,
    /// Also write the filter report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

fn open(path: &Path) -> anyhow::Result<BufReader<File>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open extract: {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// Filters and zero-fills the extracts into a checklist table at `output`.
pub(crate) fn filter_stage(
    observations: &Path,
    sampling_events: &Path,
    output: &Path,
    report: Option<&Path>,
    ctx: &Context,
) -> anyhow::Result<()> {
    let config = &ctx.config;
    let params = (&config.filter, &config.effort);
    util::cached_stage(
        "filter",
        &params,
        &[observations, sampling_events],
        output,
        ctx.force,
        || {
            let (checklists, filter_report) = filter::filter_extracts(
                open(observations)?,
                open(sampling_events)?,
                &config.filter,
                &config.effort,
            )
            .context("Failed to filter extracts")?;
            util::write_table(&ChecklistTable::from_checklists(checklists), output)?;
            if let Some(path) = report {
                Output::save_json(&filter_report, Some(path))?;
            }
            Ok(())
        },
    )
}

pub(crate) fn run(arg: &FilterArg, ctx: &Context) -> anyhow::Result<()> {
    filter_stage(
        &arg.observations,
        &arg.sampling_events,
        &arg.output,
        arg.report.as_deref(),
        ctx,
    )
}
