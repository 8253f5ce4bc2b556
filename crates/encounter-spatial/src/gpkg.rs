//! Reading boundary layers from GeoPackage files.
//!
//! A GeoPackage is an SQLite database. Feature layers are listed in
//! `gpkg_contents`, and `gpkg_geometry_columns` names the blob column of
//! each layer.

use std::path::Path;

use rusqlite::{Connection, OpenFlags, OptionalExtension as _};

use crate::{
    projection::LonLat,
    wkb::{self, WkbError},
};

/// Geographic WGS84, the only coordinate system boundaries may use.
pub const WGS84_SRS_ID: i32 = 4326;

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum GpkgError {
    #[display("SQLite error")]
    Sqlite(rusqlite::Error),
    #[display("no feature layer named {name:?}")]
    #[from(ignore)]
    MissingLayer { name: String },
    #[display("GeoPackage has no feature layers")]
    NoLayers,
    #[display("feature {fid} of layer {layer:?} has an invalid geometry")]
    #[from(ignore)]
    Geometry {
        layer: String,
        fid: i64,
        source: WkbError,
    },
    #[display("layer {layer:?} uses SRS {srs_id}, expected {WGS84_SRS_ID}")]
    #[from(ignore)]
    Srs { layer: String, srs_id: i32 },
}

/// Polylines of every feature in one layer, in geographic coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundaryLayer {
    pub name: String,
    pub lines: Vec<Vec<LonLat>>,
}

/// Lists the feature layers of a GeoPackage.
pub fn feature_layers(conn: &Connection) -> Result<Vec<String>, GpkgError> {
    let mut stmt = conn.prepare(
        "SELECT table_name FROM gpkg_contents WHERE data_type = 'features' ORDER BY table_name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Reads every geometry of layer `name` (the first layer when `None`).
///
/// Features with a NULL geometry are skipped.
pub fn read_boundaries<P>(path: P, name: Option<&str>) -> Result<BoundaryLayer, GpkgError>
where
    P: AsRef<Path>,
{
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let layers = feature_layers(&conn)?;
    let layer = match name {
        Some(name) => layers
            .into_iter()
            .find(|l| l == name)
            .ok_or_else(|| GpkgError::MissingLayer {
                name: name.to_owned(),
            })?,
        None => layers.into_iter().next().ok_or(GpkgError::NoLayers)?,
    };

    let column: String = conn
        .query_row(
            "SELECT column_name FROM gpkg_geometry_columns WHERE table_name = ?1",
            [&layer],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| GpkgError::MissingLayer {
            name: layer.clone(),
        })?;

    let sql = format!(
        "SELECT rowid, {} FROM {}",
        quote_identifier(&column),
        quote_identifier(&layer)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, Option<Vec<u8>>>(1)?))
    })?;

    let mut lines = vec![];
    for row in rows {
        let (fid, blob) = row?;
        let Some(blob) = blob else { continue };
        let geometry = wkb::decode_gpkg_geometry(&blob).map_err(|source| GpkgError::Geometry {
            layer: layer.clone(),
            fid,
            source,
        })?;
        if geometry.srs_id != WGS84_SRS_ID {
            return Err(GpkgError::Srs {
                layer,
                srs_id: geometry.srs_id,
            });
        }
        lines.extend(geometry.lines);
    }
    tracing::debug!(layer = %layer, lines = lines.len(), "read boundary layer");
    Ok(BoundaryLayer { name: layer, lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wkb::tests::square_blob;

    fn write_gpkg(path: &Path, blobs: &[Option<Vec<u8>>]) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE gpkg_contents (table_name TEXT PRIMARY KEY, data_type TEXT NOT NULL);
             CREATE TABLE gpkg_geometry_columns (table_name TEXT, column_name TEXT);
             INSERT INTO gpkg_contents VALUES ('states', 'features'), ('grid', 'tiles');
             INSERT INTO gpkg_geometry_columns VALUES ('states', 'geom');
             CREATE TABLE states (fid INTEGER PRIMARY KEY, geom BLOB);",
        )
        .unwrap();
        for blob in blobs {
            conn.execute("INSERT INTO states (geom) VALUES (?1)", [blob]).unwrap();
        }
    }

    #[test]
    fn test_read_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boundaries.gpkg");
        write_gpkg(&path, &[Some(square_blob(4326)), None, Some(square_blob(4326))]);

        let layer = read_boundaries(&path, None).unwrap();
        assert_eq!(layer.name, "states");
        assert_eq!(layer.lines.len(), 2);

        let err = read_boundaries(&path, Some("counties")).unwrap_err();
        assert!(matches!(err, GpkgError::MissingLayer { .. }));
    }

    #[test]
    fn test_rejects_projected_srs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boundaries.gpkg");
        write_gpkg(&path, &[Some(square_blob(3857))]);
        let err = read_boundaries(&path, Some("states")).unwrap_err();
        assert!(matches!(err, GpkgError::Srs { srs_id: 3857, .. }));
    }
}
