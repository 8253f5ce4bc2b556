//! Checklists: one submitted observation event with effort metadata.
//!
//! A [`Checklist`] is created once by the filtering stage and is immutable
//! afterwards. Its derived temporal fields (`year`, `day_of_year`, `week`,
//! `hours_of_day`) are computed from the observation date and start time at
//! construction and never recomputed.

use std::fmt;

use chrono::{Datelike as _, NaiveDate, NaiveTime, Timelike as _};
use serde::{Deserialize, Serialize};

/// Survey protocol of a checklist.
///
/// Only the stationary and traveling protocols carry effort information the
/// model can use; every other protocol is kept as its raw name so it can be
/// reported, but is normally excluded by the protocol whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Protocol {
    Stationary,
    Traveling,
    Other(String),
}

impl Protocol {
    /// Whether the protocol records a travelled distance.
    #[must_use]
    pub fn uses_distance(&self) -> bool {
        matches!(self, Self::Traveling)
    }
}

impl From<String> for Protocol {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Stationary" | "stationary" => Self::Stationary,
            "Traveling" | "traveling" => Self::Traveling,
            _ => Self::Other(value),
        }
    }
}

impl From<Protocol> for String {
    fn from(value: Protocol) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stationary => f.write_str("Stationary"),
            Self::Traveling => f.write_str("Traveling"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Survey effort of a checklist.
///
/// `distance_km` is zero for protocols that do not record distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Effort {
    pub duration_minutes: f64,
    pub distance_km: f64,
    pub number_observers: u32,
}

/// One checklist with its detection label for the target species.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Checklist {
    pub checklist_id: String,
    pub observer_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub observation_date: NaiveDate,
    pub time_observations_started: NaiveTime,
    pub protocol: Protocol,
    pub duration_minutes: f64,
    pub effort_distance_km: f64,
    pub number_observers: u32,
    pub species_observed: bool,
    /// Number of individuals reported; `None` for zero-filled rows and for
    /// presence-only ("X") reports.
    pub observation_count: Option<u32>,
    pub year: i32,
    pub day_of_year: u32,
    pub week: u32,
    pub hours_of_day: f64,
}

/// Column names of a checklist row, in file order.
pub const CHECKLIST_COLUMNS: [&str; 16] = [
    "checklist_id",
    "observer_id",
    "latitude",
    "longitude",
    "observation_date",
    "time_observations_started",
    "protocol",
    "duration_minutes",
    "effort_distance_km",
    "number_observers",
    "species_observed",
    "observation_count",
    "year",
    "day_of_year",
    "week",
    "hours_of_day",
];

/// Identity, location and timing of a checklist before effort is checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistHeader {
    pub checklist_id: String,
    pub observer_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub observation_date: NaiveDate,
    pub time_observations_started: NaiveTime,
    pub protocol: Protocol,
}

impl Checklist {
    /// Builds a checklist and derives its temporal fields.
    ///
    /// Distance is forced to zero when the protocol does not record it.
    #[must_use]
    pub fn new(
        header: ChecklistHeader,
        effort: Effort,
        species_observed: bool,
        observation_count: Option<u32>,
    ) -> Self {
        let ChecklistHeader {
            checklist_id,
            observer_id,
            latitude,
            longitude,
            observation_date,
            time_observations_started,
            protocol,
        } = header;
        let effort_distance_km = if protocol.uses_distance() {
            effort.distance_km
        } else {
            0.0
        };
        let day_of_year = observation_date.ordinal();
        Self {
            checklist_id,
            observer_id,
            latitude,
            longitude,
            observation_date,
            time_observations_started,
            protocol,
            duration_minutes: effort.duration_minutes,
            effort_distance_km,
            number_observers: effort.number_observers,
            species_observed,
            observation_count,
            year: observation_date.year(),
            day_of_year,
            week: week_of_year(day_of_year),
            hours_of_day: decimal_hour(time_observations_started),
        }
    }

    #[must_use]
    pub fn effort(&self) -> Effort {
        Effort {
            duration_minutes: self.duration_minutes,
            distance_km: self.effort_distance_km,
            number_observers: self.number_observers,
        }
    }

    /// Field values in [`CHECKLIST_COLUMNS`] order, formatted for a flat file.
    #[must_use]
    pub fn to_fields(&self) -> Vec<String> {
        vec![
            self.checklist_id.clone(),
            self.observer_id.clone(),
            self.latitude.to_string(),
            self.longitude.to_string(),
            self.observation_date.format("%Y-%m-%d").to_string(),
            self.time_observations_started.format("%H:%M:%S").to_string(),
            self.protocol.to_string(),
            self.duration_minutes.to_string(),
            self.effort_distance_km.to_string(),
            self.number_observers.to_string(),
            self.species_observed.to_string(),
            self.observation_count
                .map(|c| c.to_string())
                .unwrap_or_default(),
            self.year.to_string(),
            self.day_of_year.to_string(),
            self.week.to_string(),
            self.hours_of_day.to_string(),
        ]
    }
}

/// Week number (1..=53) counting seven-day blocks from January 1st.
#[must_use]
pub fn week_of_year(day_of_year: u32) -> u32 {
    (day_of_year.max(1) - 1) / 7 + 1
}

/// Time of day as a decimal hour in `[0, 24)`.
#[must_use]
pub fn decimal_hour(time: NaiveTime) -> f64 {
    f64::from(time.hour()) + f64::from(time.minute()) / 60.0 + f64::from(time.second()) / 3600.0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn header(id: &str, protocol: Protocol) -> ChecklistHeader {
        ChecklistHeader {
            checklist_id: id.to_owned(),
            observer_id: "obsr1".to_owned(),
            latitude: 33.75,
            longitude: -84.39,
            observation_date: NaiveDate::from_ymd_opt(2016, 5, 14).unwrap(),
            time_observations_started: NaiveTime::from_hms_opt(6, 45, 0).unwrap(),
            protocol,
        }
    }

    pub(crate) fn effort(duration_minutes: f64, distance_km: f64, number_observers: u32) -> Effort {
        Effort {
            duration_minutes,
            distance_km,
            number_observers,
        }
    }

    #[test]
    fn test_derived_fields() {
        let checklist = Checklist::new(
            header("S1", Protocol::Traveling),
            effort(60.0, 1.5, 2),
            true,
            Some(3),
        );
        assert_eq!(checklist.year, 2016);
        // 2016 is a leap year: Jan 31 + Feb 29 + Mar 31 + Apr 30 + 14
        assert_eq!(checklist.day_of_year, 135);
        assert_eq!(checklist.week, 20);
        assert!((checklist.hours_of_day - 6.75).abs() < 1e-12);
        assert!((checklist.effort_distance_km - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stationary_distance_is_zero() {
        let checklist = Checklist::new(
            header("S1", Protocol::Stationary),
            effort(30.0, 2.0, 1),
            false,
            None,
        );
        assert_eq!(checklist.effort_distance_km, 0.0);
    }

    #[test]
    fn test_protocol_round_trips_through_string() {
        for protocol in [
            Protocol::Stationary,
            Protocol::Traveling,
            Protocol::Other("Area".to_owned()),
        ] {
            assert_eq!(Protocol::from(String::from(protocol.clone())), protocol);
        }
    }

    #[test]
    fn test_week_of_year_bounds() {
        assert_eq!(week_of_year(1), 1);
        assert_eq!(week_of_year(7), 1);
        assert_eq!(week_of_year(8), 2);
        assert_eq!(week_of_year(366), 53);
    }

    #[test]
    fn test_fields_match_columns() {
        let checklist = Checklist::new(
            header("S1", Protocol::Traveling),
            effort(60.0, 1.5, 2),
            false,
            None,
        );
        assert_eq!(checklist.to_fields().len(), CHECKLIST_COLUMNS.len());
    }
}
