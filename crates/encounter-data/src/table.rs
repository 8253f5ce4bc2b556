//! The checklist table: the flat-file intermediate passed between stages.
//!
//! A table file is comma-separated with a header. The first columns are
//! [`CHECKLIST_COLUMNS`]; any further columns are numeric covariates added by
//! the join stage, named by the header.

use std::{fs::File, io, path::Path};

use crate::checklist::{CHECKLIST_COLUMNS, Checklist};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum TableError {
    #[display("I/O error")]
    Io(io::Error),
    #[display("CSV error")]
    Csv(csv::Error),
    #[display("unexpected header: expected column {index} to be {expected:?}, found {found:?}")]
    #[from(ignore)]
    Header {
        index: usize,
        expected: &'static str,
        found: String,
    },
    #[display("row {row}: covariate {column:?} is not a number: {value:?}")]
    #[from(ignore)]
    Covariate {
        row: usize,
        column: String,
        value: String,
    },
}

/// One checklist with its (possibly empty) covariate vector.
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterRow {
    pub checklist: Checklist,
    /// Values in [`ChecklistTable::covariate_names`] order.
    pub covariates: Vec<f64>,
}

/// Checklists sharing one covariate schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChecklistTable {
    pub covariate_names: Vec<String>,
    pub rows: Vec<EncounterRow>,
}

impl ChecklistTable {
    /// A table without covariates, as produced by the filter stage.
    #[must_use]
    pub fn from_checklists(checklists: Vec<Checklist>) -> Self {
        Self {
            covariate_names: vec![],
            rows: checklists
                .into_iter()
                .map(|checklist| EncounterRow {
                    checklist,
                    covariates: vec![],
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn checklists(&self) -> impl Iterator<Item = &Checklist> {
        self.rows.iter().map(|row| &row.checklist)
    }

    /// Number of rows with a detection.
    #[must_use]
    pub fn detections(&self) -> usize {
        self.checklists().filter(|c| c.species_observed).count()
    }

    /// Keeps the rows at `indices`, in that order.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            covariate_names: self.covariate_names.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    pub fn read<R>(reader: R) -> Result<Self, TableError>
    where
        R: io::Read,
    {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();
        for (index, &expected) in CHECKLIST_COLUMNS.iter().enumerate() {
            let found = headers.get(index).unwrap_or_default();
            if found != expected {
                return Err(TableError::Header {
                    index,
                    expected,
                    found: found.to_owned(),
                });
            }
        }
        let checklist_headers: csv::StringRecord =
            headers.iter().take(CHECKLIST_COLUMNS.len()).collect();
        let covariate_names = headers
            .iter()
            .skip(CHECKLIST_COLUMNS.len())
            .map(str::to_owned)
            .collect::<Vec<_>>();

        let mut rows = vec![];
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let checklist_fields: csv::StringRecord =
                record.iter().take(CHECKLIST_COLUMNS.len()).collect();
            let checklist: Checklist = checklist_fields.deserialize(Some(&checklist_headers))?;
            let covariates = record
                .iter()
                .skip(CHECKLIST_COLUMNS.len())
                .zip(&covariate_names)
                .map(|(value, column)| {
                    value.trim().parse::<f64>().map_err(|_| TableError::Covariate {
                        row: row + 1,
                        column: column.clone(),
                        value: value.to_owned(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(EncounterRow {
                checklist,
                covariates,
            });
        }
        Ok(Self {
            covariate_names,
            rows,
        })
    }

    pub fn write<W>(&self, writer: W) -> Result<(), TableError>
    where
        W: io::Write,
    {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(
            CHECKLIST_COLUMNS
                .iter()
                .copied()
                .chain(self.covariate_names.iter().map(String::as_str)),
        )?;
        for row in &self.rows {
            let fields = row
                .checklist
                .to_fields()
                .into_iter()
                .chain(row.covariates.iter().map(f64::to_string));
            writer.write_record(fields)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn open<P>(path: P) -> Result<Self, TableError>
    where
        P: AsRef<Path>,
    {
        Self::read(io::BufReader::new(File::open(path)?))
    }

    pub fn save<P>(&self, path: P) -> Result<(), TableError>
    where
        P: AsRef<Path>,
    {
        self.write(io::BufWriter::new(File::create(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::{
        Protocol,
        tests::{effort, header},
    };

    fn table() -> ChecklistTable {
        let rows = vec![
            EncounterRow {
                checklist: Checklist::new(
                    header("S1", Protocol::Traveling),
                    effort(60.0, 1.5, 2),
                    true,
                    Some(4),
                ),
                covariates: vec![0.25, 310.5],
            },
            EncounterRow {
                checklist: Checklist::new(
                    header("S2", Protocol::Stationary),
                    effort(20.0, 0.0, 1),
                    false,
                    None,
                ),
                covariates: vec![0.0, 295.0],
            },
        ];
        ChecklistTable {
            covariate_names: vec!["pland_forest".to_owned(), "elevation_mean".to_owned()],
            rows,
        }
    }

    #[test]
    fn test_write_then_read_preserves_rows() {
        let table = table();
        let mut buf = vec![];
        table.write(&mut buf).unwrap();
        let read = ChecklistTable::read(buf.as_slice()).unwrap();
        assert_eq!(read, table);
    }

    #[test]
    fn test_save_and_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checklists.csv");
        let table = ChecklistTable::from_checklists(
            table().rows.into_iter().map(|r| r.checklist).collect(),
        );
        table.save(&path).unwrap();
        let read = ChecklistTable::open(&path).unwrap();
        assert!(read.covariate_names.is_empty());
        assert_eq!(read.len(), 2);
        assert_eq!(read.detections(), 1);
    }

    #[test]
    fn test_rejects_wrong_header() {
        let err = ChecklistTable::read("id,observer\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::Header { index: 0, .. }));
    }

    #[test]
    fn test_rejects_non_numeric_covariate() {
        let mut buf = vec![];
        table().write(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap().replace(",310.5", ",high");
        let err = ChecklistTable::read(text.as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::Covariate { row: 1, .. }));
    }
}
