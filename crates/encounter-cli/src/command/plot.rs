use std::path::{Path, PathBuf};

use anyhow::{Context as _, ensure};

use encounter_data::{checklist::Checklist, table::ChecklistTable};
use encounter_render::chart::{self, ChartLabels};
use encounter_stats::frequency::BinnedFrequency;

use crate::{command::Context, config::PipelineConfig, util};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PlotArg {
    /// Checklist table to plot
    #[arg(long)]
    input: PathBuf,
    /// Directory the SVG charts are written to
    #[arg(long)]
    output_dir: PathBuf,
}

struct ChartSpec {
    file: &'static str,
    title: &'static str,
    x_label: &'static str,
    value: fn(&Checklist) -> f64,
    range: (f64, f64),
    bins: usize,
}

fn chart_specs(config: &PipelineConfig) -> [ChartSpec; 5] {
    let plot = &config.plot;
    let limits = &config.effort;
    [
        ChartSpec {
            file: "day_of_year.svg",
            title: "Detection frequency by day of year",
            x_label: "Day of year",
            value: |c| f64::from(c.day_of_year),
            range: (1.0, 367.0),
            bins: plot.day_bins,
        },
        ChartSpec {
            file: "hours_of_day.svg",
            title: "Detection frequency by start time",
            x_label: "Hours since midnight",
            value: |c| c.hours_of_day,
            range: (0.0, 24.0),
            bins: plot.hour_bins,
        },
        ChartSpec {
            file: "duration_minutes.svg",
            title: "Detection frequency by checklist duration",
            x_label: "Duration (minutes)",
            value: |c| c.duration_minutes,
            range: (0.0, limits.max_duration_minutes),
            bins: plot.duration_bins,
        },
        ChartSpec {
            file: "effort_distance_km.svg",
            title: "Detection frequency by distance travelled",
            x_label: "Distance (km)",
            value: |c| c.effort_distance_km,
            range: (0.0, limits.max_distance_km),
            bins: plot.distance_bins,
        },
        ChartSpec {
            file: "number_observers.svg",
            title: "Detection frequency by number of observers",
            x_label: "Observers",
            value: |c| f64::from(c.number_observers),
            range: (0.5, f64::from(limits.max_observers) + 0.5),
            bins: limits.max_observers as usize,
        },
    ]
}

/// Writes one detection frequency chart per effort variable into `dir`.
pub(crate) fn plot_stage(
    table: &ChecklistTable,
    dir: &Path,
    config: &PipelineConfig,
) -> anyhow::Result<Vec<PathBuf>> {
    util::create_dir(dir)?;
    let mut written = vec![];
    for spec in chart_specs(config) {
        ensure!(
            spec.bins > 0 && spec.range.1 > spec.range.0,
            "{} needs a non-empty range and at least one bin",
            spec.file
        );
        let data = table
            .checklists()
            .map(|c| ((spec.value)(c), c.species_observed));
        let freq = BinnedFrequency::new(data, spec.range.0, spec.range.1, spec.bins);
        let path = dir.join(spec.file);
        let labels = ChartLabels {
            title: spec.title,
            x_label: spec.x_label,
        };
        chart::save_frequency_chart(&path, &freq, labels)
            .with_context(|| format!("Failed to write chart: {}", path.display()))?;
        tracing::info!(path = %path.display(), checklists = freq.total(), "wrote chart");
        written.push(path);
    }
    Ok(written)
}

pub(crate) fn run(arg: &PlotArg, ctx: &Context) -> anyhow::Result<()> {
    let table = util::read_table(&arg.input)?;
    plot_stage(&table, &arg.output_dir, &ctx.config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::pipeline::tests::synthetic_table;

    #[test]
    fn test_plot_writes_every_chart() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("charts");
        let written =
            plot_stage(&synthetic_table(50), &out, &PipelineConfig::default()).unwrap();
        assert_eq!(written.len(), 5);
        for path in written {
            assert!(fs::read_to_string(path).unwrap().starts_with("<svg"));
        }
    }

    #[test]
    fn test_zero_bins_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.plot.hour_bins = 0;
        assert!(plot_stage(&synthetic_table(10), dir.path(), &config).is_err());
    }
}
