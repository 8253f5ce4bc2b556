//! Pointy-top hexagonal grid over projected coordinates.
//!
//! Cells are addressed by axial coordinates `(q, r)`. Adjacent cell centres
//! are exactly `spacing` metres apart.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::projection::Point;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Axial address of a hexagonal cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HexCell {
    pub q: i64,
    pub r: i64,
}

impl fmt::Display for HexCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.q, self.r)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display, derive_more::Error)]
#[display("hexagon spacing must be positive and finite, got {spacing}")]
pub struct SpacingError {
    pub spacing: f64,
}

/// A hexagonal grid with a fixed centre spacing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HexGrid {
    spacing: f64,
}

impl HexGrid {
    /// Creates a grid whose adjacent cell centres are `spacing` metres apart.
    pub fn new(spacing: f64) -> Result<Self, SpacingError> {
        if spacing > 0.0 && spacing.is_finite() {
            Ok(Self { spacing })
        } else {
            Err(SpacingError { spacing })
        }
    }

    #[must_use]
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Centre-to-vertex distance.
    fn size(&self) -> f64 {
        self.spacing / SQRT_3
    }

    /// Cell containing `point`.
    ///
    /// # Examples
    ///
    /// ```
    /// use encounter_spatial::{hexgrid::{HexCell, HexGrid}, projection::Point};
    ///
    /// let grid = HexGrid::new(3000.0).unwrap();
    /// assert_eq!(grid.cell(Point::new(100.0, -200.0)), HexCell { q: 0, r: 0 });
    /// assert_eq!(grid.cell(Point::new(3000.0, 0.0)), HexCell { q: 1, r: 0 });
    /// ```
    #[must_use]
    pub fn cell(&self, point: Point) -> HexCell {
        let size = self.size();
        let q = (SQRT_3 / 3.0 * point.x - point.y / 3.0) / size;
        let r = (2.0 / 3.0 * point.y) / size;
        cube_round(q, r)
    }

    /// Centre of `cell`.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn centre(&self, cell: HexCell) -> Point {
        let size = self.size();
        let (q, r) = (cell.q as f64, cell.r as f64);
        Point {
            x: size * SQRT_3 * (q + r / 2.0),
            y: size * 1.5 * r,
        }
    }
}

#[expect(clippy::cast_possible_truncation)]
fn cube_round(q: f64, r: f64) -> HexCell {
    let s = -q - r;
    let (mut rq, mut rr, rs) = (q.round(), r.round(), s.round());
    let (dq, dr, ds) = ((rq - q).abs(), (rr - r).abs(), (rs - s).abs());
    if dq > dr && dq > ds {
        rq = -rr - rs;
    } else if dr > ds {
        rr = -rq - rs;
    }
    HexCell {
        q: rq as i64,
        r: rr as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_spacing() {
        for spacing in [0.0, -3000.0, f64::NAN, f64::INFINITY] {
            assert!(HexGrid::new(spacing).is_err(), "{spacing}");
        }
    }

    #[test]
    fn test_centre_round_trips() {
        let grid = HexGrid::new(3000.0).unwrap();
        for q in -5..=5 {
            for r in -5..=5 {
                let cell = HexCell { q, r };
                assert_eq!(grid.cell(grid.centre(cell)), cell);
            }
        }
    }

    #[test]
    fn test_neighbour_spacing() {
        let grid = HexGrid::new(3000.0).unwrap();
        let origin = grid.centre(HexCell { q: 0, r: 0 });
        for (q, r) in [(1, 0), (0, 1), (-1, 1), (-1, 0), (0, -1), (1, -1)] {
            let d = origin.distance(grid.centre(HexCell { q, r }));
            assert!((d - 3000.0).abs() < 1e-6, "({q}, {r}) at {d}");
        }
    }

    #[test]
    fn test_points_go_to_nearest_centre() {
        let grid = HexGrid::new(1000.0).unwrap();
        for i in 0..200 {
            let p = Point::new(f64::from(i) * 37.3 - 3000.0, f64::from(i) * -21.9 + 1500.0);
            let cell = grid.cell(p);
            let own = p.distance(grid.centre(cell));
            for (dq, dr) in [(1, 0), (0, 1), (-1, 1), (-1, 0), (0, -1), (1, -1)] {
                let other = HexCell {
                    q: cell.q + dq,
                    r: cell.r + dr,
                };
                assert!(own <= p.distance(grid.centre(other)) + 1e-9);
            }
        }
    }
}
