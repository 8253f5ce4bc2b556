use std::path::{Path, PathBuf};

use anyhow::Context as _;

use encounter_data::covariates::{self, CovariateTable};

use crate::{command::Context, util};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct JoinArg {
    /// Checklist table written by `filter`
    #[arg(long)]
    checklists: PathBuf,
    /// Covariates keyed by latitude, longitude and year
    #[arg(long)]
    covariates: PathBuf,
    /// Joined table to write
    #[arg(long)]
    output: PathBuf,
}

/// Attaches covariates to every checklist, dropping checklists without a
/// matching location and year.
pub(crate) fn join_stage(
    checklists: &Path,
    covariate_path: &Path,
    output: &Path,
    ctx: &Context,
) -> anyhow::Result<()> {
    util::cached_stage(
        "join",
        &(),
        &[checklists, covariate_path],
        output,
        ctx.force,
        || {
            let table = util::read_table(checklists)?;
            let covariate_table = CovariateTable::open(covariate_path).with_context(|| {
                format!("Failed to read covariates: {}", covariate_path.display())
            })?;
            let joined = covariates::join(table, &covariate_table);
            util::write_table(&joined.table, output)
        },
    )
}

pub(crate) fn run(arg: &JoinArg, ctx: &Context) -> anyhow::Result<()> {
    join_stage(&arg.checklists, &arg.covariates, &arg.output, ctx)
}
