//! Lambert azimuthal equal-area projection on a sphere.
//!
//! Areas are preserved everywhere, which is what the hexagonal grid needs:
//! every cell covers the same ground area regardless of latitude.

use serde::{Deserialize, Serialize};

/// Authalic radius of the WGS84 ellipsoid, in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_007.181;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub longitude: f64,
    pub latitude: f64,
}

impl LonLat {
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// A projected coordinate in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Spherical Lambert azimuthal equal-area projection about `centre`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Laea {
    centre: LonLat,
    sin_lat0: f64,
    cos_lat0: f64,
}

impl Laea {
    #[must_use]
    pub fn new(centre: LonLat) -> Self {
        let lat0 = centre.latitude.to_radians();
        Self {
            centre,
            sin_lat0: lat0.sin(),
            cos_lat0: lat0.cos(),
        }
    }

    #[must_use]
    pub fn centre(&self) -> LonLat {
        self.centre
    }

    /// Projects a geographic coordinate.
    ///
    /// The antipode of the centre is undefined and projects to non-finite
    /// values.
    ///
    /// # Examples
    ///
    /// ```
    /// use encounter_spatial::projection::{Laea, LonLat};
    ///
    /// let laea = Laea::new(LonLat::new(-84.0, 33.0));
    /// let origin = laea.forward(LonLat::new(-84.0, 33.0));
    /// assert!(origin.x.abs() < 1e-6 && origin.y.abs() < 1e-6);
    ///
    /// // north of the centre lies on the positive y axis
    /// let north = laea.forward(LonLat::new(-84.0, 34.0));
    /// assert!(north.x.abs() < 1e-6 && north.y > 110_000.0);
    /// ```
    #[must_use]
    pub fn forward(&self, coord: LonLat) -> Point {
        let lat = coord.latitude.to_radians();
        let dlon = (coord.longitude - self.centre.longitude).to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_dlon, cos_dlon) = dlon.sin_cos();
        let denom = 1.0 + self.sin_lat0 * sin_lat + self.cos_lat0 * cos_lat * cos_dlon;
        let k = (2.0 / denom).sqrt();
        Point {
            x: EARTH_RADIUS_M * k * cos_lat * sin_dlon,
            y: EARTH_RADIUS_M * k * (self.cos_lat0 * sin_lat - self.sin_lat0 * cos_lat * cos_dlon),
        }
    }

    /// Inverse of [`Laea::forward`].
    #[must_use]
    pub fn inverse(&self, point: Point) -> LonLat {
        let rho = point.x.hypot(point.y);
        if rho < 1e-9 {
            return self.centre;
        }
        let c = 2.0 * (rho / (2.0 * EARTH_RADIUS_M)).clamp(-1.0, 1.0).asin();
        let (sin_c, cos_c) = c.sin_cos();
        let lat = (cos_c * self.sin_lat0 + point.y * sin_c * self.cos_lat0 / rho)
            .clamp(-1.0, 1.0)
            .asin();
        let dlon = (point.x * sin_c)
            .atan2(rho * self.cos_lat0 * cos_c - point.y * self.sin_lat0 * sin_c);
        LonLat {
            longitude: normalize_longitude(self.centre.longitude + dlon.to_degrees()),
            latitude: lat.to_degrees(),
        }
    }
}

fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_inverse_round_trip() {
        let laea = Laea::new(LonLat::new(-83.5, 32.7));
        for coord in [
            LonLat::new(-85.6, 30.4),
            LonLat::new(-80.8, 35.0),
            LonLat::new(-83.5, 32.7),
            LonLat::new(-120.0, 60.0),
        ] {
            let back = laea.inverse(laea.forward(coord));
            assert!((back.longitude - coord.longitude).abs() < 1e-9, "{coord:?} {back:?}");
            assert!((back.latitude - coord.latitude).abs() < 1e-9, "{coord:?} {back:?}");
        }
    }

    #[test]
    fn test_equal_area_on_small_squares() {
        // a 0.01 degree cell near the centre and one far away cover the same
        // area as computed on the sphere
        let laea = Laea::new(LonLat::new(0.0, 45.0));
        let area = |lon: f64, lat: f64| {
            let a = laea.forward(LonLat::new(lon, lat));
            let b = laea.forward(LonLat::new(lon + 0.01, lat));
            let c = laea.forward(LonLat::new(lon + 0.01, lat + 0.01));
            let d = laea.forward(LonLat::new(lon, lat + 0.01));
            // shoelace
            0.5 * ((a.x * b.y - b.x * a.y)
                + (b.x * c.y - c.x * b.y)
                + (c.x * d.y - d.x * c.y)
                + (d.x * a.y - a.x * d.y))
                .abs()
        };
        let spherical = |lat: f64| {
            let r = EARTH_RADIUS_M;
            r * r * 0.01_f64.to_radians()
                * ((lat + 0.01).to_radians().sin() - lat.to_radians().sin())
        };
        for (lon, lat) in [(0.0, 45.0), (20.0, 30.0)] {
            let rel = (area(lon, lat) - spherical(lat)).abs() / spherical(lat);
            assert!(rel < 1e-4, "relative error {rel}");
        }
    }

    #[test]
    fn test_distance() {
        assert!((Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0)) - 5.0).abs() < 1e-12);
    }
}
