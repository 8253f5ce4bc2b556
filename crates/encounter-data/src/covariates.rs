//! Habitat covariates and the prediction surface.
//!
//! Covariates are produced externally per `(location, year)` and joined onto
//! checklists exactly. The prediction surface is a grid of cells carrying the
//! same covariate schema, used only for inference.

use std::{
    collections::{HashMap, hash_map::Entry},
    fs::File,
    io,
    path::Path,
};

use crate::table::{ChecklistTable, EncounterRow};

const COORDINATE_SCALE: f64 = 1e6;

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum CovariateError {
    #[display("I/O error")]
    Io(io::Error),
    #[display("CSV error")]
    Csv(csv::Error),
    #[display("missing column {name:?}")]
    #[from(ignore)]
    MissingColumn { name: &'static str },
    #[display("row {row}: column {column:?} is not a number: {value:?}")]
    #[from(ignore)]
    Number {
        row: usize,
        column: String,
        value: String,
    },
    #[display("row {row}: duplicate covariates for ({latitude}, {longitude}) in {year}")]
    #[from(ignore)]
    DuplicateKey {
        row: usize,
        latitude: f64,
        longitude: f64,
        year: i32,
    },
    #[display("covariate schema mismatch: table has {expected:?}, other has {found:?}")]
    #[from(ignore)]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// A checklist location quantized to micro-degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey {
    lat_micro: i64,
    lon_micro: i64,
}

impl LocationKey {
    #[expect(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            lat_micro: (latitude * COORDINATE_SCALE).round() as i64,
            lon_micro: (longitude * COORDINATE_SCALE).round() as i64,
        }
    }
}

/// Covariates of one `(location, year)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CovariateRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub year: i32,
    pub values: Vec<f64>,
}

/// Covariates keyed by `(location, year)`.
#[derive(Debug, Clone, Default)]
pub struct CovariateTable {
    pub names: Vec<String>,
    records: HashMap<(LocationKey, i32), CovariateRecord>,
}

/// A prediction surface cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceCell {
    pub cell_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub covariates: Vec<f64>,
}

/// Prediction surface cells sharing one covariate schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceTable {
    pub names: Vec<String>,
    pub cells: Vec<SurfaceCell>,
}

/// Outcome of [`join`].
#[derive(Debug, Clone)]
pub struct JoinOutput {
    pub table: ChecklistTable,
    /// Checklists without matching covariates.
    pub dropped: usize,
}

fn column_index(headers: &csv::StringRecord, name: &'static str) -> Result<usize, CovariateError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or(CovariateError::MissingColumn { name })
}

fn parse_number<T>(
    record: &csv::StringRecord,
    index: usize,
    row: usize,
    headers: &csv::StringRecord,
) -> Result<T, CovariateError>
where
    T: std::str::FromStr,
{
    let value = record.get(index).unwrap_or_default();
    value.trim().parse().map_err(|_| CovariateError::Number {
        row,
        column: headers.get(index).unwrap_or_default().to_owned(),
        value: value.to_owned(),
    })
}

/// Names of the columns not listed in `key_columns`, with their indices.
fn value_columns(headers: &csv::StringRecord, key_columns: &[usize]) -> Vec<(usize, String)> {
    headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !key_columns.contains(i))
        .map(|(i, name)| (i, name.to_owned()))
        .collect()
}

impl CovariateTable {
    /// Reads `latitude,longitude,year,<covariates...>` rows.
    ///
    /// Columns may appear in any order; every column other than the three
    /// key columns is a covariate.
    pub fn read<R>(reader: R) -> Result<Self, CovariateError>
    where
        R: io::Read,
    {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();
        let lat = column_index(&headers, "latitude")?;
        let lon = column_index(&headers, "longitude")?;
        let year = column_index(&headers, "year")?;
        let columns = value_columns(&headers, &[lat, lon, year]);

        let mut table = Self {
            names: columns.iter().map(|(_, name)| name.clone()).collect(),
            records: HashMap::new(),
        };
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row = i + 1;
            let values = columns
                .iter()
                .map(|&(index, _)| parse_number(&record, index, row, &headers))
                .collect::<Result<Vec<f64>, _>>()?;
            table.insert(
                row,
                CovariateRecord {
                    latitude: parse_number(&record, lat, row, &headers)?,
                    longitude: parse_number(&record, lon, row, &headers)?,
                    year: parse_number(&record, year, row, &headers)?,
                    values,
                },
            )?;
        }
        Ok(table)
    }

    pub fn open<P>(path: P) -> Result<Self, CovariateError>
    where
        P: AsRef<Path>,
    {
        Self::read(io::BufReader::new(File::open(path)?))
    }

    fn insert(&mut self, row: usize, record: CovariateRecord) -> Result<(), CovariateError> {
        let key = (LocationKey::new(record.latitude, record.longitude), record.year);
        match self.records.entry(key) {
            Entry::Occupied(_) => Err(CovariateError::DuplicateKey {
                row,
                latitude: record.latitude,
                longitude: record.longitude,
                year: record.year,
            }),
            Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn get(&self, latitude: f64, longitude: f64, year: i32) -> Option<&CovariateRecord> {
        self.records.get(&(LocationKey::new(latitude, longitude), year))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Inner-joins checklists with covariates on `(location, year)`.
///
/// Checklists without a match are dropped and counted. Covariates already
/// present on `table` are replaced.
#[must_use]
pub fn join(table: ChecklistTable, covariates: &CovariateTable) -> JoinOutput {
    let total = table.rows.len();
    let rows = table
        .rows
        .into_iter()
        .filter_map(|row| {
            let c = &row.checklist;
            let record = covariates.get(c.latitude, c.longitude, c.year)?;
            Some(EncounterRow {
                covariates: record.values.clone(),
                checklist: row.checklist,
            })
        })
        .collect::<Vec<_>>();
    let dropped = total - rows.len();
    if dropped > 0 {
        tracing::warn!(dropped, total, "checklists without covariates were dropped");
    }
    JoinOutput {
        table: ChecklistTable {
            covariate_names: covariates.names.clone(),
            rows,
        },
        dropped,
    }
}

impl SurfaceTable {
    /// Reads `cell_id,latitude,longitude,<covariates...>` rows.
    pub fn read<R>(reader: R) -> Result<Self, CovariateError>
    where
        R: io::Read,
    {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();
        let id = column_index(&headers, "cell_id")?;
        let lat = column_index(&headers, "latitude")?;
        let lon = column_index(&headers, "longitude")?;
        let columns = value_columns(&headers, &[id, lat, lon]);

        let mut cells = vec![];
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row = i + 1;
            cells.push(SurfaceCell {
                cell_id: record.get(id).unwrap_or_default().to_owned(),
                latitude: parse_number(&record, lat, row, &headers)?,
                longitude: parse_number(&record, lon, row, &headers)?,
                covariates: columns
                    .iter()
                    .map(|&(index, _)| parse_number(&record, index, row, &headers))
                    .collect::<Result<_, _>>()?,
            });
        }
        Ok(Self {
            names: columns.into_iter().map(|(_, name)| name).collect(),
            cells,
        })
    }

    pub fn open<P>(path: P) -> Result<Self, CovariateError>
    where
        P: AsRef<Path>,
    {
        Self::read(io::BufReader::new(File::open(path)?))
    }

    /// Reorders the covariates of every cell to `names`.
    ///
    /// Fails if the surface lacks any of `names`.
    pub fn align_to(&mut self, names: &[String]) -> Result<(), CovariateError> {
        let order = names
            .iter()
            .map(|name| self.names.iter().position(|n| n == name))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| CovariateError::SchemaMismatch {
                expected: names.to_vec(),
                found: self.names.clone(),
            })?;
        for cell in &mut self.cells {
            cell.covariates = order.iter().map(|&i| cell.covariates[i]).collect();
        }
        self.names = names.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::{
        Checklist, Protocol,
        tests::{effort, header},
    };

    const COVARIATES: &str = "\
latitude,longitude,year,pland_forest,elevation_mean
33.75,-84.39,2016,0.4,310
33.75,-84.39,2017,0.5,310
34.0,-84.0,2016,0.1,250
";

    fn checklist_at(id: &str, latitude: f64, longitude: f64) -> Checklist {
        let mut header = header(id, Protocol::Traveling);
        header.latitude = latitude;
        header.longitude = longitude;
        Checklist::new(header, effort(60.0, 1.0, 1), false, None)
    }

    #[test]
    fn test_join_matches_location_and_year() {
        let covariates = CovariateTable::read(COVARIATES.as_bytes()).unwrap();
        assert_eq!(covariates.len(), 3);
        let table = ChecklistTable::from_checklists(vec![
            checklist_at("S1", 33.75, -84.39),
            checklist_at("S2", 35.0, -84.0),
            checklist_at("S3", 34.0, -84.0),
        ]);
        let output = join(table, &covariates);
        assert_eq!(output.dropped, 1);
        assert_eq!(output.table.covariate_names, ["pland_forest", "elevation_mean"]);
        let ids = output
            .table
            .checklists()
            .map(|c| c.checklist_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["S1", "S3"]);
        assert_eq!(output.table.rows[0].covariates, [0.4, 310.0]);
    }

    #[test]
    fn test_duplicate_key_is_error() {
        let data = format!("{COVARIATES}33.750000,-84.390000,2016,0.9,1\n");
        let err = CovariateTable::read(data.as_bytes()).unwrap_err();
        assert!(matches!(err, CovariateError::DuplicateKey { row: 4, .. }));
    }

    #[test]
    fn test_missing_key_column() {
        let err = CovariateTable::read("latitude,longitude,forest\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CovariateError::MissingColumn { name: "year" }));
    }

    #[test]
    fn test_surface_align() {
        let data = "cell_id,latitude,longitude,elevation_mean,pland_forest\nc1,33.0,-84.0,200,0.3\n";
        let mut surface = SurfaceTable::read(data.as_bytes()).unwrap();
        let names = vec!["pland_forest".to_owned(), "elevation_mean".to_owned()];
        surface.align_to(&names).unwrap();
        assert_eq!(surface.cells[0].covariates, [0.3, 200.0]);

        let err = surface.align_to(&["shrub".to_owned()]).unwrap_err();
        assert!(matches!(err, CovariateError::SchemaMismatch { .. }));
    }
}
