//! Spatiotemporal undersampling of checklists.
//!
//! Dense birding hotspots contribute many near-identical checklists. To
//! reduce that spatial bias, checklists are grouped by detection label, year,
//! week and hexagonal cell, and one checklist per group is kept.

use std::collections::BTreeMap;

use encounter_data::table::ChecklistTable;
use rand::Rng;
use serde::Serialize;

use crate::{
    hexgrid::{HexCell, HexGrid},
    projection::{Laea, LonLat},
};

/// Grouping key of the undersampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleGroup {
    pub species_observed: bool,
    pub year: i32,
    pub week: u32,
    pub cell: HexCell,
}

/// Counts before and after undersampling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UndersampleReport {
    pub input: usize,
    pub input_detections: usize,
    pub groups: usize,
    pub output_detections: usize,
}

/// Assigns every row of `table` to its group.
#[must_use]
pub fn group_rows(
    table: &ChecklistTable,
    projection: &Laea,
    grid: &HexGrid,
) -> BTreeMap<SampleGroup, Vec<usize>> {
    let mut groups: BTreeMap<SampleGroup, Vec<usize>> = BTreeMap::new();
    for (i, checklist) in table.checklists().enumerate() {
        let point = projection.forward(LonLat::new(checklist.longitude, checklist.latitude));
        let key = SampleGroup {
            species_observed: checklist.species_observed,
            year: checklist.year,
            week: checklist.week,
            cell: grid.cell(point),
        };
        groups.entry(key).or_default().push(i);
    }
    groups
}

/// Picks one row uniformly at random from every group.
///
/// Returns the kept row indices in ascending order. Groups are visited in key
/// order, so the result depends only on the table and the generator state.
pub fn undersample<R>(
    table: &ChecklistTable,
    projection: &Laea,
    grid: &HexGrid,
    rng: &mut R,
) -> (Vec<usize>, UndersampleReport)
where
    R: Rng + ?Sized,
{
    let groups = group_rows(table, projection, grid);
    let mut kept = groups
        .values()
        .map(|rows| rows[rng.random_range(0..rows.len())])
        .collect::<Vec<_>>();
    kept.sort_unstable();

    let report = UndersampleReport {
        input: table.len(),
        input_detections: table.detections(),
        groups: groups.len(),
        output_detections: kept
            .iter()
            .filter(|&&i| table.rows[i].checklist.species_observed)
            .count(),
    };
    tracing::info!(
        input = report.input,
        kept = kept.len(),
        detections_before = report.input_detections,
        detections_after = report.output_detections,
        "undersampled checklists"
    );
    (kept, report)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use encounter_data::checklist::{Checklist, ChecklistHeader, Effort, Protocol};
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64;

    use super::*;

    fn checklist(id: usize, latitude: f64, longitude: f64, day: u32, detected: bool) -> Checklist {
        let header = ChecklistHeader {
            checklist_id: format!("S{id}"),
            observer_id: "obsr1".to_owned(),
            latitude,
            longitude,
            observation_date: NaiveDate::from_yo_opt(2018, day).unwrap(),
            time_observations_started: chrono::NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            protocol: Protocol::Stationary,
        };
        let effort = Effort {
            duration_minutes: 30.0,
            distance_km: 0.0,
            number_observers: 1,
        };
        Checklist::new(header, effort, detected, None)
    }

    fn table() -> ChecklistTable {
        let mut checklists = vec![];
        // ten checklists at one hotspot in the same week, four detections
        for i in 0..10 {
            checklists.push(checklist(i, 33.75, -84.39, 140, i < 4));
        }
        // same hotspot, a different week
        checklists.push(checklist(10, 33.75, -84.39, 160, false));
        // a distant site
        checklists.push(checklist(11, 34.5, -83.0, 140, false));
        ChecklistTable::from_checklists(checklists)
    }

    fn setup() -> (Laea, HexGrid) {
        (Laea::new(LonLat::new(-83.5, 32.7)), HexGrid::new(3000.0).unwrap())
    }

    #[test]
    fn test_one_row_per_group() {
        let (laea, grid) = setup();
        let table = table();
        let mut rng = Pcg64::seed_from_u64(42);
        let (kept, report) = undersample(&table, &laea, &grid, &mut rng);
        // hotspot detections, hotspot non-detections, other week, other site
        assert_eq!(report.groups, 4);
        assert_eq!(kept.len(), 4);
        assert_eq!(report.output_detections, 1);
        assert!(kept.windows(2).all(|w| w[0] < w[1]));
        assert!(kept.contains(&10));
        assert!(kept.contains(&11));
    }

    #[test]
    fn test_deterministic_for_seed() {
        let (laea, grid) = setup();
        let table = table();
        let run = |seed| undersample(&table, &laea, &grid, &mut Pcg64::seed_from_u64(seed)).0;
        assert_eq!(run(7), run(7));
    }
}
