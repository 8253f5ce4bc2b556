//! Filtering and zero-fill: raw extracts to a labelled checklist table.
//!
//! The stage runs in three passes over the data:
//!
//! 1. read sampling events and target-species reports that satisfy the
//!    [`FilterSpec`] (see [`crate::ebd`])
//! 2. zero-fill: every retained event becomes exactly one labelled row
//! 3. post-filter on effort, dropping rows with missing or excessive effort

use std::{collections::HashMap, io};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    checklist::{Checklist, ChecklistHeader, Effort, Protocol},
    ebd::{self, ExtractError, SamplingEvent},
};

/// Which checklists and which species the pipeline targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Common name of the target species.
    pub species: String,
    /// State or province code, e.g. `US-GA`.
    pub region: String,
    pub protocols: Vec<Protocol>,
    /// Keep only checklists reporting every species detected.
    pub complete_only: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl FilterSpec {
    /// Complete stationary and traveling checklists over all dates.
    #[must_use]
    pub fn new(species: &str, region: &str) -> Self {
        Self {
            species: species.to_owned(),
            region: region.to_owned(),
            protocols: vec![Protocol::Stationary, Protocol::Traveling],
            complete_only: true,
            start_date: None,
            end_date: None,
        }
    }

    #[must_use]
    pub fn date_range_admits(&self, date: NaiveDate) -> bool {
        self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }
}

/// Upper bounds on effort, plus the first year with usable data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffortLimits {
    pub max_duration_minutes: f64,
    pub max_distance_km: f64,
    pub max_observers: u32,
    pub min_year: i32,
}

impl Default for EffortLimits {
    fn default() -> Self {
        Self {
            max_duration_minutes: 300.0,
            max_distance_km: 5.0,
            max_observers: 10,
            min_year: 2010,
        }
    }
}

impl EffortLimits {
    #[must_use]
    pub fn admits(&self, checklist: &Checklist) -> bool {
        checklist.duration_minutes <= self.max_duration_minutes
            && checklist.effort_distance_km <= self.max_distance_km
            && checklist.number_observers <= self.max_observers
            && checklist.year >= self.min_year
    }
}

/// A sampling event with its detection label, before the effort check.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroFilled {
    pub event: SamplingEvent,
    pub species_observed: bool,
    pub observation_count: Option<u32>,
}

/// Row counts at each step of the filter stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterReport {
    pub sampling_events: usize,
    pub collapsed_shared: usize,
    pub detections: usize,
    pub missing_effort: usize,
    pub outside_limits: usize,
    pub retained: usize,
}

/// Labels every sampling event with whether the species was reported.
///
/// The output has exactly one row per input event, in input order.
#[must_use]
pub fn zero_fill(
    events: Vec<SamplingEvent>,
    detections: &HashMap<String, Option<u32>>,
) -> Vec<ZeroFilled> {
    events
        .into_iter()
        .map(|event| {
            let detection = detections.get(&event.checklist_id);
            ZeroFilled {
                species_observed: detection.is_some(),
                observation_count: detection.copied().flatten(),
                event,
            }
        })
        .collect()
}

impl ZeroFilled {
    /// Converts to a [`Checklist`], or `None` if start time or any effort
    /// field is missing.
    ///
    /// Distance is not required for protocols that do not record it.
    #[must_use]
    pub fn into_checklist(self) -> Option<Checklist> {
        let event = self.event;
        let distance_km = if event.protocol.uses_distance() {
            event.effort_distance_km?
        } else {
            0.0
        };
        let effort = Effort {
            duration_minutes: event.duration_minutes?,
            distance_km,
            number_observers: event.number_observers?,
        };
        let header = ChecklistHeader {
            checklist_id: event.checklist_id,
            observer_id: event.observer_id,
            latitude: event.latitude,
            longitude: event.longitude,
            observation_date: event.observation_date,
            time_observations_started: event.time_observations_started?,
            protocol: event.protocol,
        };
        Some(Checklist::new(
            header,
            effort,
            self.species_observed,
            self.observation_count,
        ))
    }
}

/// Converts zero-filled rows to checklists and drops those failing `limits`.
pub fn post_filter(
    rows: Vec<ZeroFilled>,
    limits: &EffortLimits,
    report: &mut FilterReport,
) -> Vec<Checklist> {
    let mut checklists = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(checklist) = row.into_checklist() else {
            report.missing_effort += 1;
            continue;
        };
        if !limits.admits(&checklist) {
            report.outside_limits += 1;
            continue;
        }
        checklists.push(checklist);
    }
    report.retained = checklists.len();
    checklists
}

/// Runs the whole filter stage on the two extracts.
pub fn filter_extracts<E, S>(
    observations: E,
    sampling_events: S,
    spec: &FilterSpec,
    limits: &EffortLimits,
) -> Result<(Vec<Checklist>, FilterReport), ExtractError>
where
    E: io::Read,
    S: io::Read,
{
    let events = ebd::read_sampling_events(sampling_events, spec)?;
    let detections = ebd::read_detections(observations, spec)?;
    tracing::info!(
        events = events.events.len(),
        collapsed = events.collapsed_shared,
        detections = detections.len(),
        "read extracts"
    );

    let mut report = FilterReport {
        sampling_events: events.events.len(),
        collapsed_shared: events.collapsed_shared,
        ..FilterReport::default()
    };
    let filled = zero_fill(events.events, &detections);
    report.detections = filled.iter().filter(|row| row.species_observed).count();
    let checklists = post_filter(filled, limits, &mut report);
    tracing::info!(
        retained = report.retained,
        missing_effort = report.missing_effort,
        outside_limits = report.outside_limits,
        "filtered checklists"
    );
    Ok((checklists, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebd::tests::{ebd_fixture, sed_fixture};

    #[test]
    fn test_zero_fill_preserves_count() {
        let spec = FilterSpec::new("Wood Thrush", "US-GA");
        let events = ebd::read_sampling_events(sed_fixture().as_bytes(), &spec).unwrap();
        let detections = ebd::read_detections(ebd_fixture().as_bytes(), &spec).unwrap();
        let n = events.events.len();
        let filled = zero_fill(events.events, &detections);
        assert_eq!(filled.len(), n);
        assert_eq!(filled.iter().filter(|r| r.species_observed).count(), 2);
    }

    #[test]
    fn test_filter_extracts_applies_effort_limits() {
        let spec = FilterSpec::new("Wood Thrush", "US-GA");
        let (checklists, report) = filter_extracts(
            ebd_fixture().as_bytes(),
            sed_fixture().as_bytes(),
            &spec,
            &EffortLimits::default(),
        )
        .unwrap();
        // S6 exceeds duration, S7 predates the minimum year
        let ids = checklists
            .iter()
            .map(|c| c.checklist_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["S1", "G1"]);
        assert_eq!(report.outside_limits, 2);
        assert_eq!(report.retained, 2);

        let limits = EffortLimits::default();
        for checklist in &checklists {
            assert!(limits.admits(checklist));
            assert!(checklist.species_observed);
        }
        assert_eq!(checklists[1].effort_distance_km, 0.0);
    }

    #[test]
    fn test_missing_effort_is_dropped() {
        let spec = FilterSpec::new("Wood Thrush", "US-GA");
        let mut events = ebd::read_sampling_events(sed_fixture().as_bytes(), &spec)
            .unwrap()
            .events;
        events.truncate(1);
        events[0].duration_minutes = None;
        let mut report = FilterReport::default();
        let checklists = post_filter(
            zero_fill(events, &HashMap::new()),
            &EffortLimits::default(),
            &mut report,
        );
        assert!(checklists.is_empty());
        assert_eq!(report.missing_effort, 1);
    }

    #[test]
    fn test_date_range() {
        let mut spec = FilterSpec::new("Wood Thrush", "US-GA");
        spec.start_date = NaiveDate::from_ymd_opt(2016, 5, 15);
        assert!(!spec.date_range_admits(NaiveDate::from_ymd_opt(2016, 5, 14).unwrap()));
        assert!(spec.date_range_admits(NaiveDate::from_ymd_opt(2016, 5, 15).unwrap()));
    }
}
