//! Rasterizing point predictions onto a projected display window.

use std::iter;

use serde::{Deserialize, Serialize};

use crate::projection::{Laea, LonLat, Point};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum RasterError {
    #[display("no points to rasterize")]
    Empty,
    #[display("surface does not overlap the display extent")]
    NoOverlap,
    #[display("resolution must be positive, got {resolution}")]
    Resolution { resolution: f64 },
}

/// Axis-aligned rectangle in projected metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Bounding box of `points`; `None` when there are none.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point>,
    {
        points.into_iter().fold(None, |extent, p| {
            Some(match extent {
                None => Self {
                    min_x: p.x,
                    min_y: p.y,
                    max_x: p.x,
                    max_y: p.y,
                },
                Some(e) => Self {
                    min_x: e.min_x.min(p.x),
                    min_y: e.min_y.min(p.y),
                    max_x: e.max_x.max(p.x),
                    max_y: e.max_y.max(p.y),
                },
            })
        })
    }

    /// Projected bounding box of a longitude/latitude rectangle.
    ///
    /// Edges are sampled because parallels and meridians are curved in the
    /// projection.
    #[must_use]
    pub fn from_lonlat_bounds(projection: &Laea, bounds: &LonLatBounds) -> Self {
        const STEPS: u32 = 32;
        let lerp = |a: f64, b: f64, i: u32| a + (b - a) * f64::from(i) / f64::from(STEPS);
        let edge = (0..=STEPS).flat_map(|i| {
            let lon = lerp(bounds.west, bounds.east, i);
            let lat = lerp(bounds.south, bounds.north, i);
            [
                LonLat::new(lon, bounds.south),
                LonLat::new(lon, bounds.north),
                LonLat::new(bounds.west, lat),
                LonLat::new(bounds.east, lat),
            ]
        });
        // STEPS > 0, so the iterator is never empty
        Self::from_points(edge.map(|c| projection.forward(c))).unwrap_or(Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
        })
    }

    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let e = Self {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        };
        (e.min_x <= e.max_x && e.min_y <= e.max_y).then_some(e)
    }

    /// Grows the extent by `margin` on every side.
    #[must_use]
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        (self.min_x..=self.max_x).contains(&p.x) && (self.min_y..=self.max_y).contains(&p.y)
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// A longitude/latitude rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLatBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

/// Pixel grid covering a projected extent. Row 0 is the northern edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayWindow {
    pub extent: Extent,
    /// Pixel edge length in metres.
    pub resolution: f64,
    pub width: usize,
    pub height: usize,
}

impl DisplayWindow {
    /// Window over `data` (grown by half a pixel), clipped to `zoom` when
    /// given.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(data: Extent, zoom: Option<&Extent>, resolution: f64) -> Result<Self, RasterError> {
        if !(resolution > 0.0 && resolution.is_finite()) {
            return Err(RasterError::Resolution { resolution });
        }
        let data = data.expand(resolution / 2.0);
        let extent = match zoom {
            Some(zoom) => data.intersect(zoom).ok_or(RasterError::NoOverlap)?,
            None => data,
        };
        let width = ((extent.width() / resolution).ceil() as usize).max(1);
        let height = ((extent.height() / resolution).ceil() as usize).max(1);
        Ok(Self {
            extent,
            resolution,
            width,
            height,
        })
    }

    /// Pixel `(column, row)` containing `p`, if inside the window.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn pixel(&self, p: Point) -> Option<(usize, usize)> {
        if !self.extent.contains(p) {
            return None;
        }
        let col = ((p.x - self.extent.min_x) / self.resolution) as usize;
        let row = ((self.extent.max_y - p.y) / self.resolution) as usize;
        Some((col.min(self.width - 1), row.min(self.height - 1)))
    }

    /// Projected centre of pixel `(column, row)`.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn pixel_centre(&self, col: usize, row: usize) -> Point {
        Point {
            x: self.extent.min_x + (col as f64 + 0.5) * self.resolution,
            y: self.extent.max_y - (row as f64 + 0.5) * self.resolution,
        }
    }
}

/// Single-band raster with empty (no data) pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub window: DisplayWindow,
    /// Row-major, `window.width * window.height` values.
    pub values: Vec<Option<f64>>,
}

impl Raster {
    #[must_use]
    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        self.values[row * self.window.width + col]
    }

    /// Values of non-empty pixels.
    pub fn data(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().filter_map(|v| *v)
    }

    /// Shrinks the raster to the bounding box of its non-empty pixels.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn crop(&self) -> Self {
        let w = self.window.width;
        let filled = || {
            self.values
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_some())
                .map(|(i, _)| (i % w, i / w))
        };
        let (Some(min_col), Some(max_col), Some(min_row), Some(max_row)) = (
            filled().map(|(c, _)| c).min(),
            filled().map(|(c, _)| c).max(),
            filled().map(|(_, r)| r).min(),
            filled().map(|(_, r)| r).max(),
        ) else {
            return self.clone();
        };

        let res = self.window.resolution;
        let old = self.window.extent;
        let window = DisplayWindow {
            extent: Extent {
                min_x: old.min_x + min_col as f64 * res,
                max_x: old.min_x + (max_col + 1) as f64 * res,
                max_y: old.max_y - min_row as f64 * res,
                min_y: old.max_y - (max_row + 1) as f64 * res,
            },
            resolution: res,
            width: max_col - min_col + 1,
            height: max_row - min_row + 1,
        };
        let values = (min_row..=max_row)
            .flat_map(|row| (min_col..=max_col).map(move |col| (col, row)))
            .map(|(col, row)| self.get(col, row))
            .collect();
        Self { window, values }
    }
}

/// Averages `(point, value)` pairs into the pixels of `window`.
///
/// Points outside the window are ignored. Pixels without points stay empty.
#[expect(clippy::cast_precision_loss)]
pub fn rasterize<I>(points: I, window: DisplayWindow) -> Raster
where
    I: IntoIterator<Item = (Point, f64)>,
{
    let n = window.width * window.height;
    let mut sums = vec![0.0; n];
    let mut counts = vec![0_usize; n];
    for (p, value) in points {
        if let Some((col, row)) = window.pixel(p) {
            let i = row * window.width + col;
            sums[i] += value;
            counts[i] += 1;
        }
    }
    let values = iter::zip(sums, counts)
        .map(|(sum, count)| (count > 0).then(|| sum / count as f64))
        .collect();
    Raster { window, values }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Extent {
        Extent {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    #[test]
    fn test_window_clipped_to_zoom() {
        let data = extent(0.0, 0.0, 10_000.0, 10_000.0);
        let zoom = extent(5_000.0, -1_000.0, 20_000.0, 4_000.0);
        let window = DisplayWindow::new(data, Some(&zoom), 1000.0).unwrap();
        assert_eq!(window.extent, extent(5_000.0, -500.0, 10_500.0, 4_000.0));
        assert_eq!(window.width, 6);
        assert_eq!(window.height, 5);

        let far = extent(50_000.0, 50_000.0, 60_000.0, 60_000.0);
        assert!(matches!(
            DisplayWindow::new(data, Some(&far), 1000.0),
            Err(RasterError::NoOverlap)
        ));
    }

    #[test]
    fn test_rasterize_averages_and_crop() {
        let data = extent(0.0, 0.0, 4_000.0, 4_000.0);
        let window = DisplayWindow::new(data, None, 1000.0).unwrap();
        // 5 x 5 pixels over [-500, 4500]
        assert_eq!((window.width, window.height), (5, 5));
        let raster = rasterize(
            [
                (Point::new(1_000.0, 3_000.0), 0.2),
                (Point::new(1_100.0, 3_100.0), 0.4),
                (Point::new(2_000.0, 2_000.0), 0.9),
            ],
            window,
        );
        assert_eq!(raster.data().count(), 2);
        // northern rows first: y = 3000 lies in row 1
        assert!((raster.get(1, 1).unwrap() - 0.3).abs() < 1e-12);

        let cropped = raster.crop();
        assert_eq!((cropped.window.width, cropped.window.height), (2, 2));
        assert!((cropped.get(0, 0).unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(cropped.get(1, 0), None);
        assert!((cropped.get(1, 1).unwrap() - 0.9).abs() < 1e-12);
        let centre = cropped.window.pixel_centre(1, 1);
        assert!(centre.distance(Point::new(2_000.0, 2_000.0)) < 1e-9);
    }

    #[test]
    fn test_lonlat_bounds_contain_corners() {
        let laea = Laea::new(LonLat::new(-83.5, 32.7));
        let bounds = LonLatBounds {
            west: -86.0,
            south: 30.3,
            east: -80.8,
            north: 35.1,
        };
        let e = Extent::from_lonlat_bounds(&laea, &bounds);
        for c in [LonLat::new(-86.0, 30.3), LonLat::new(-80.8, 35.1)] {
            assert!(e.contains(laea.forward(c)));
        }
    }
}
