use std::path::{Path, PathBuf};

use rand::SeedableRng as _;
use rand_pcg::Pcg64;

use encounter_data::table::ChecklistTable;
use encounter_spatial::{
    hexgrid::HexGrid,
    projection::Laea,
    undersample::{self, UndersampleReport},
};

use crate::{
    command::Context,
    config::PipelineConfig,
    util::{self, Output},
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct UndersampleArg {
    /// Checklist table to thin
    #[arg(long)]
    input: PathBuf,
    /// Thinned table to write
    #[arg(long)]
    output: PathBuf,
    /// Hexagon spacing in metres, overriding the config
    #[arg(long)]
    spacing: Option<f64>,
    /// Also write the undersampling report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

/// Keeps one checklist per hexagon, week, year and detection class and
/// writes the kept rows to `output`.
pub(crate) fn undersample_stage(
    table: &ChecklistTable,
    output: &Path,
    report_path: Option<&Path>,
    spacing: f64,
    config: &PipelineConfig,
) -> anyhow::Result<UndersampleReport> {
    let projection = Laea::new(config.map.centre);
    let grid = HexGrid::new(spacing)?;
    let mut rng = Pcg64::seed_from_u64(config.seed);
    let (kept, report) = undersample::undersample(table, &projection, &grid, &mut rng);
    tracing::info!(
        input = report.input,
        output = kept.len(),
        input_detections = report.input_detections,
        output_detections = report.output_detections,
        "undersampled checklists"
    );
    util::write_table(&table.select(&kept), output)?;
    if let Some(path) = report_path {
        Output::save_json(&report, Some(path))?;
    }
    Ok(report)
}

pub(crate) fn run(arg: &UndersampleArg, ctx: &Context) -> anyhow::Result<()> {
    let config = &ctx.config;
    let table = util::read_table(&arg.input)?;
    undersample_stage(
        &table,
        &arg.output,
        arg.report.as_deref(),
        arg.spacing.unwrap_or(config.undersample.spacing_m),
        config,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::synthetic_table;

    #[test]
    fn test_undersample_stage_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let table = synthetic_table(120);
        let config = PipelineConfig::default();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        let report = undersample_stage(&table, &a, None, 3_000.0, &config).unwrap();
        undersample_stage(&table, &b, None, 3_000.0, &config).unwrap();
        assert_eq!(report.input, 120);
        assert_eq!(
            ChecklistTable::open(&a).unwrap(),
            ChecklistTable::open(&b).unwrap()
        );
        assert!(undersample_stage(&table, &a, None, 0.0, &config).is_err());
    }
}
