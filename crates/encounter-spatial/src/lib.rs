//! Spatial utilities for the encounter-rate pipeline.
//!
//! Everything here works in one of two coordinate systems: geographic
//! longitude and latitude in degrees ([`projection::LonLat`]), and planar
//! metres on a Lambert azimuthal equal-area plane centred on the study
//! region ([`projection::Point`]). Distances, cell sizes and raster
//! resolutions are always in projected metres.
//!
//! # Undersampling Workflow
//!
//! 1. **Project** ([`projection::Laea`]): Checklist locations onto the
//!    equal-area plane
//! 2. **Bin** ([`hexgrid::HexGrid`]): Assign each point to a hexagonal cell
//!    whose neighbours are `spacing` metres apart
//! 3. **Thin** ([`undersample::undersample`]): Keep one checklist per
//!    detection label, year, week and cell
//!
//! # Mapping Workflow
//!
//! 1. **Window** ([`raster::DisplayWindow`]): The extent of the predictions,
//!    optionally clipped to a longitude/latitude zoom box
//! 2. **Rasterize** ([`raster::rasterize`]): Mean of the predictions that
//!    fall in each pixel; pixels without any stay empty
//! 3. **Boundaries** ([`gpkg::read_boundaries`]): Polygon and line features
//!    from a GeoPackage layer, decoded by [`wkb`], for drawing over the map
//!
//! # Examples
//!
//! ```
//! use encounter_spatial::{
//!     hexgrid::HexGrid,
//!     projection::{Laea, LonLat, Point},
//!     raster::{DisplayWindow, Extent, rasterize},
//! };
//!
//! let laea = Laea::new(LonLat::new(-83.5, 32.7));
//! let grid = HexGrid::new(3_000.0).unwrap();
//! let a = laea.forward(LonLat::new(-83.5, 32.7));
//! let b = laea.forward(LonLat::new(-83.501, 32.7005));
//! assert_eq!(grid.cell(a), grid.cell(b));
//!
//! let extent = Extent { min_x: 0.0, min_y: 0.0, max_x: 3_000.0, max_y: 3_000.0 };
//! let window = DisplayWindow::new(extent, None, 1_000.0).unwrap();
//! let points = [
//!     (Point::new(0.0, 0.0), 0.25),
//!     (Point::new(100.0, 100.0), 0.75),
//!     (Point::new(3_000.0, 3_000.0), 1.0),
//! ];
//! let raster = rasterize(points, window);
//! assert_eq!(raster.get(0, 3), Some(0.5));
//! assert_eq!(raster.get(3, 0), Some(1.0));
//! assert_eq!(raster.data().count(), 2);
//! ```

pub mod gpkg;
pub mod hexgrid;
pub mod projection;
pub mod raster;
pub mod undersample;
pub mod wkb;
