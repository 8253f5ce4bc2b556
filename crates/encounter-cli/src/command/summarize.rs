use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Serialize;

use encounter_data::{checklist::Checklist, table::ChecklistTable};
use encounter_stats::descriptive::DescriptiveStats;

use crate::util::{self, Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SummarizeArg {
    /// Checklist table to describe
    #[arg(long)]
    input: PathBuf,
    /// Output file path (defaults to stdout)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
struct Counts {
    checklists: usize,
    detections: usize,
}

impl Counts {
    fn add(&mut self, checklist: &Checklist) {
        self.checklists += 1;
        self.detections += usize::from(checklist.species_observed);
    }
}

#[derive(Debug, Clone, Serialize)]
struct TableSummary {
    total: Counts,
    /// Share of checklists reporting the species.
    prevalence: Option<f64>,
    by_year: BTreeMap<i32, Counts>,
    by_protocol: BTreeMap<String, Counts>,
    day_of_year: Option<DescriptiveStats>,
    hours_of_day: Option<DescriptiveStats>,
    duration_minutes: Option<DescriptiveStats>,
    effort_distance_km: Option<DescriptiveStats>,
    number_observers: Option<DescriptiveStats>,
    covariates: BTreeMap<String, Option<DescriptiveStats>>,
}

#[expect(clippy::cast_precision_loss)]
fn summarize(table: &ChecklistTable) -> TableSummary {
    let mut total = Counts::default();
    let mut by_year = BTreeMap::<i32, Counts>::new();
    let mut by_protocol = BTreeMap::<String, Counts>::new();
    for checklist in table.checklists() {
        total.add(checklist);
        by_year.entry(checklist.year).or_default().add(checklist);
        by_protocol
            .entry(checklist.protocol.to_string())
            .or_default()
            .add(checklist);
    }
    let stats = |f: fn(&Checklist) -> f64| DescriptiveStats::new(table.checklists().map(f));
    let covariates = table
        .covariate_names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values = table.rows.iter().map(|row| row.covariates[j]);
            (name.clone(), DescriptiveStats::new(values.filter(|v| v.is_finite())))
        })
        .collect();
    TableSummary {
        total,
        prevalence: (total.checklists > 0)
            .then(|| total.detections as f64 / total.checklists as f64),
        by_year,
        by_protocol,
        day_of_year: stats(|c| f64::from(c.day_of_year)),
        hours_of_day: stats(|c| c.hours_of_day),
        duration_minutes: stats(|c| c.duration_minutes),
        effort_distance_km: stats(|c| c.effort_distance_km),
        number_observers: stats(|c| f64::from(c.number_observers)),
        covariates,
    }
}

pub(crate) fn summarize_stage(table: &ChecklistTable, output: Option<&Path>) -> anyhow::Result<()> {
    Output::save_json(&summarize(table), output)
}

pub(crate) fn run(arg: &SummarizeArg) -> anyhow::Result<()> {
    let table = util::read_table(&arg.input)?;
    summarize_stage(&table, arg.output.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::synthetic_table;

    #[test]
    fn test_summary_counts() {
        let summary = summarize(&synthetic_table(30));
        assert_eq!(summary.total.checklists, 30);
        assert_eq!(summary.total.detections, 15);
        assert_eq!(summary.prevalence, Some(0.5));
        assert_eq!(summary.by_year.len(), 2);
        assert_eq!(
            summary.by_protocol.values().map(|c| c.checklists).sum::<usize>(),
            30
        );
        assert!(summary.covariates.contains_key("pland_forest"));
    }

    #[test]
    fn test_empty_table() {
        let summary = summarize(&ChecklistTable::default());
        assert_eq!(summary.prevalence, None);
        assert!(summary.duration_minutes.is_none());
    }
}
