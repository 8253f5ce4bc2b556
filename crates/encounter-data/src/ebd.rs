//! Readers for the raw tab-separated database extracts.
//!
//! Two files are read:
//!
//! - the **sampling event** extract: one row per submitted checklist
//! - the **observation** extract: one row per (checklist, species) report
//!
//! Both use the upper-case column names of the public extract format. Only
//! the columns needed downstream are deserialized; any others are ignored.
//! Rows are streamed, so only rows passing the [`FilterSpec`] are kept in
//! memory.

use std::{
    collections::{HashMap, HashSet},
    io,
};

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::{checklist::Protocol, filter::FilterSpec};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ExtractError {
    #[display("failed to read extract header")]
    Header { source: csv::Error },
    #[display("failed to parse extract row {row}")]
    Row { row: u64, source: csv::Error },
}

/// A raw row of either extract.
///
/// Species columns are absent from the sampling event extract and default
/// to `None`.
#[derive(Debug, Clone, Deserialize)]
struct RawRow {
    #[serde(rename = "SAMPLING EVENT IDENTIFIER")]
    sampling_event_identifier: String,
    #[serde(rename = "GROUP IDENTIFIER", default)]
    group_identifier: Option<String>,
    #[serde(rename = "OBSERVER ID")]
    observer_id: String,
    #[serde(rename = "STATE CODE")]
    state_code: String,
    #[serde(rename = "LATITUDE")]
    latitude: f64,
    #[serde(rename = "LONGITUDE")]
    longitude: f64,
    #[serde(rename = "OBSERVATION DATE")]
    observation_date: NaiveDate,
    #[serde(rename = "TIME OBSERVATIONS STARTED", default)]
    time_observations_started: Option<NaiveTime>,
    #[serde(rename = "PROTOCOL TYPE")]
    protocol_type: Protocol,
    #[serde(rename = "DURATION MINUTES", default)]
    duration_minutes: Option<f64>,
    #[serde(rename = "EFFORT DISTANCE KM", default)]
    effort_distance_km: Option<f64>,
    #[serde(rename = "NUMBER OBSERVERS", default)]
    number_observers: Option<u32>,
    #[serde(rename = "ALL SPECIES REPORTED")]
    all_species_reported: u8,
    #[serde(rename = "COMMON NAME", default)]
    common_name: Option<String>,
    #[serde(rename = "OBSERVATION COUNT", default)]
    observation_count: Option<String>,
}

impl RawRow {
    /// Key identifying the outing: the group identifier for shared
    /// checklists, the sampling event identifier otherwise.
    fn outing_key(&self) -> &str {
        self.group_identifier
            .as_deref()
            .filter(|g| !g.is_empty())
            .unwrap_or(&self.sampling_event_identifier)
    }

    fn matches_event(&self, spec: &FilterSpec) -> bool {
        self.state_code == spec.region
            && spec.protocols.contains(&self.protocol_type)
            && (!spec.complete_only || self.all_species_reported == 1)
            && spec.date_range_admits(self.observation_date)
    }
}

/// A retained sampling event (checklist without a detection label).
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingEvent {
    /// Outing key: group identifier for shared checklists.
    pub checklist_id: String,
    pub observer_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub observation_date: NaiveDate,
    pub time_observations_started: Option<NaiveTime>,
    pub protocol: Protocol,
    pub duration_minutes: Option<f64>,
    pub effort_distance_km: Option<f64>,
    pub number_observers: Option<u32>,
}

/// Sampling events read from an extract, after shared-checklist collapse.
#[derive(Debug, Clone, Default)]
pub struct SamplingEvents {
    pub events: Vec<SamplingEvent>,
    /// Rows that were dropped because another member of the same shared
    /// checklist was already retained.
    pub collapsed_shared: usize,
}

fn tsv_reader<R>(reader: R) -> csv::Reader<R>
where
    R: io::Read,
{
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(reader)
}

fn rows<R>(reader: R) -> Result<impl Iterator<Item = Result<RawRow, ExtractError>>, ExtractError>
where
    R: io::Read,
{
    let mut reader = tsv_reader(reader);
    let headers = reader
        .headers()
        .map_err(|source| ExtractError::Header { source })?
        .clone();
    Ok(reader.into_records().enumerate().map(move |(i, record)| {
        let row = i as u64 + 1;
        record
            .and_then(|record| record.deserialize::<RawRow>(Some(&headers)))
            .map_err(|source| ExtractError::Row { row, source })
    }))
}

/// Reads sampling events matching the region, protocol, completeness and
/// date constraints of `spec`.
///
/// Members of a shared checklist (same group identifier) are collapsed to
/// the first one in file order, re-keyed by the group identifier.
pub fn read_sampling_events<R>(reader: R, spec: &FilterSpec) -> Result<SamplingEvents, ExtractError>
where
    R: io::Read,
{
    let mut seen = HashSet::new();
    let mut result = SamplingEvents::default();
    for row in rows(reader)? {
        let row = row?;
        if !row.matches_event(spec) {
            continue;
        }
        let key = row.outing_key().to_owned();
        if !seen.insert(key.clone()) {
            result.collapsed_shared += 1;
            continue;
        }
        result.events.push(SamplingEvent {
            checklist_id: key,
            observer_id: row.observer_id,
            latitude: row.latitude,
            longitude: row.longitude,
            observation_date: row.observation_date,
            time_observations_started: row.time_observations_started,
            protocol: row.protocol_type,
            duration_minutes: row.duration_minutes,
            effort_distance_km: row.effort_distance_km,
            number_observers: row.number_observers,
        });
    }
    Ok(result)
}

/// Reads target-species reports, keyed by outing.
///
/// The value is the reported count, `None` when only presence ("X") was
/// recorded. When several members of a shared checklist report the species,
/// the largest count wins.
pub fn read_detections<R>(
    reader: R,
    spec: &FilterSpec,
) -> Result<HashMap<String, Option<u32>>, ExtractError>
where
    R: io::Read,
{
    let mut detections: HashMap<String, Option<u32>> = HashMap::new();
    for row in rows(reader)? {
        let row = row?;
        if row.common_name.as_deref() != Some(spec.species.as_str()) || !row.matches_event(spec) {
            continue;
        }
        let count = row
            .observation_count
            .as_deref()
            .and_then(|c| c.trim().parse::<u32>().ok());
        detections
            .entry(row.outing_key().to_owned())
            .and_modify(|existing| *existing = (*existing).max(count))
            .or_insert(count);
    }
    Ok(detections)
}
