//! Decoding of GeoPackage geometry blobs.
//!
//! A blob is a GeoPackage header (magic `GP`, version, flags, SRS id and an
//! optional envelope) followed by standard well-known binary. Only the line
//! and polygon types needed to draw boundaries are supported.

use crate::projection::LonLat;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum WkbError {
    #[display("not a GeoPackage geometry blob")]
    Magic,
    #[display("invalid envelope indicator {indicator}")]
    Envelope { indicator: u8 },
    #[display("unexpected end of geometry blob")]
    Truncated,
    #[display("unsupported geometry type {geometry_type}")]
    Unsupported { geometry_type: u32 },
}

/// A decoded boundary geometry: a set of polylines (polygon rings are
/// closed polylines).
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub srs_id: i32,
    pub lines: Vec<Vec<LonLat>>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    little_endian: bool,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self {
            bytes,
            pos,
            little_endian: true,
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], WkbError> {
        let end = self.pos.checked_add(N).ok_or(WkbError::Truncated)?;
        let chunk = self.bytes.get(self.pos..end).ok_or(WkbError::Truncated)?;
        self.pos = end;
        let mut buf = [0; N];
        buf.copy_from_slice(chunk);
        Ok(buf)
    }

    fn u8(&mut self) -> Result<u8, WkbError> {
        Ok(self.take::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, WkbError> {
        let b = self.take()?;
        Ok(if self.little_endian {
            u32::from_le_bytes(b)
        } else {
            u32::from_be_bytes(b)
        })
    }

    fn i32(&mut self) -> Result<i32, WkbError> {
        let b = self.take()?;
        Ok(if self.little_endian {
            i32::from_le_bytes(b)
        } else {
            i32::from_be_bytes(b)
        })
    }

    fn f64(&mut self) -> Result<f64, WkbError> {
        let b = self.take()?;
        Ok(if self.little_endian {
            f64::from_le_bytes(b)
        } else {
            f64::from_be_bytes(b)
        })
    }

    fn byte_order(&mut self) -> Result<(), WkbError> {
        self.little_endian = self.u8()? == 1;
        Ok(())
    }

    /// Count prefix, bounded by the remaining bytes so corrupt input cannot
    /// trigger huge allocations.
    fn count(&mut self, min_item_size: usize) -> Result<usize, WkbError> {
        let n = usize::try_from(self.u32()?).map_err(|_| WkbError::Truncated)?;
        let remaining = self.bytes.len().saturating_sub(self.pos);
        if n.saturating_mul(min_item_size) > remaining {
            return Err(WkbError::Truncated);
        }
        Ok(n)
    }

    fn points(&mut self, dims: usize) -> Result<Vec<LonLat>, WkbError> {
        let n = self.count(8 * dims)?;
        (0..n)
            .map(|_| {
                let x = self.f64()?;
                let y = self.f64()?;
                for _ in 2..dims {
                    self.f64()?;
                }
                Ok(LonLat::new(x, y))
            })
            .collect()
    }

    fn geometry(&mut self, lines: &mut Vec<Vec<LonLat>>) -> Result<(), WkbError> {
        self.byte_order()?;
        let code = self.u32()?;
        // ISO Z/M/ZM offsets (1000, 2000, 3000)
        let (base, dims) = match code / 1000 {
            0 => (code, 2),
            1 | 2 => (code % 1000, 3),
            3 => (code % 1000, 4),
            _ => return Err(WkbError::Unsupported { geometry_type: code }),
        };
        match base {
            2 => lines.push(self.points(dims)?),
            3 => {
                for _ in 0..self.count(4)? {
                    lines.push(self.points(dims)?);
                }
            }
            5 | 6 => {
                for _ in 0..self.count(5)? {
                    self.geometry(lines)?;
                }
            }
            _ => return Err(WkbError::Unsupported { geometry_type: code }),
        }
        Ok(())
    }
}

/// Decodes a GeoPackage geometry blob.
///
/// Supported types: LineString, Polygon, MultiLineString and MultiPolygon,
/// with optional Z/M ordinates (ignored).
pub fn decode_gpkg_geometry(blob: &[u8]) -> Result<Geometry, WkbError> {
    if !blob.starts_with(b"GP") {
        return Err(WkbError::Magic);
    }
    let mut cursor = Cursor::new(blob, 3);
    let flags = cursor.u8()?;
    cursor.little_endian = flags & 1 == 1;
    let srs_id = cursor.i32()?;
    let envelope = match (flags >> 1) & 0b111 {
        0 => 0,
        1 => 32,
        2 | 3 => 48,
        4 => 64,
        indicator => return Err(WkbError::Envelope { indicator }),
    };
    cursor.pos += envelope;
    let mut lines = vec![];
    cursor.geometry(&mut lines)?;
    Ok(Geometry { srs_id, lines })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Little-endian blob with an XY envelope holding one polygon ring.
    pub(crate) fn square_blob(srs_id: i32) -> Vec<u8> {
        let mut blob = b"GP".to_vec();
        blob.push(0); // version
        blob.push(0b0000_0011); // XY envelope, little endian
        blob.extend(srs_id.to_le_bytes());
        for v in [-84.0_f64, -83.0, 33.0, 34.0] {
            blob.extend(v.to_le_bytes());
        }
        blob.push(1);
        blob.extend(3_u32.to_le_bytes());
        blob.extend(1_u32.to_le_bytes());
        blob.extend(5_u32.to_le_bytes());
        let ring = [
            (-84.0_f64, 33.0_f64),
            (-83.0, 33.0),
            (-83.0, 34.0),
            (-84.0, 34.0),
            (-84.0, 33.0),
        ];
        for (x, y) in ring {
            blob.extend(x.to_le_bytes());
            blob.extend(y.to_le_bytes());
        }
        blob
    }

    #[test]
    fn test_decode_polygon() {
        let geometry = decode_gpkg_geometry(&square_blob(4326)).unwrap();
        assert_eq!(geometry.srs_id, 4326);
        assert_eq!(geometry.lines.len(), 1);
        assert_eq!(geometry.lines[0].len(), 5);
        assert_eq!(geometry.lines[0][2], LonLat::new(-83.0, 34.0));
    }

    #[test]
    fn test_decode_big_endian_multilinestring() {
        let mut blob = b"GP".to_vec();
        blob.extend([0, 0b0000_0000]); // no envelope, big endian header
        blob.extend(4326_i32.to_be_bytes());
        blob.push(0);
        blob.extend(5_u32.to_be_bytes());
        blob.extend(2_u32.to_be_bytes());
        for line in [[(0.0_f64, 0.0_f64), (1.0, 1.0)], [(2.0, 2.0), (3.0, 3.0)]] {
            blob.push(0);
            blob.extend(2_u32.to_be_bytes());
            blob.extend(2_u32.to_be_bytes());
            for (x, y) in line {
                blob.extend(x.to_be_bytes());
                blob.extend(y.to_be_bytes());
            }
        }
        let geometry = decode_gpkg_geometry(&blob).unwrap();
        assert_eq!(geometry.lines.len(), 2);
        assert_eq!(geometry.lines[1][1], LonLat::new(3.0, 3.0));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(decode_gpkg_geometry(b"XX\0\0"), Err(WkbError::Magic));
        let mut blob = square_blob(4326);
        blob.truncate(blob.len() - 4);
        assert_eq!(decode_gpkg_geometry(&blob), Err(WkbError::Truncated));

        let mut point = b"GP\0\x01".to_vec();
        point.extend(4326_i32.to_le_bytes());
        point.push(1);
        point.extend(1_u32.to_le_bytes());
        point.extend(0.0_f64.to_le_bytes());
        point.extend(0.0_f64.to_le_bytes());
        assert_eq!(
            decode_gpkg_geometry(&point),
            Err(WkbError::Unsupported { geometry_type: 1 })
        );
    }
}
