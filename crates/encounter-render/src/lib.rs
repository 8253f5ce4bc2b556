//! Charts and maps for the encounter-rate pipeline.
//!
//! Both outputs are drawn with `plotters`: charts through its SVG backend,
//! map boundaries through its bitmap backend on the image buffer that is
//! then encoded as TIFF.
//!
//! # Modules
//!
//! - [`chart`]: Detection frequency and checklist counts per bin, as SVG
//! - [`map`]: A coloured probability raster with boundary lines, as RGB
//!   TIFF
//! - [`colormap`]: The quantile colour scale the map and its legend share
//!
//! # Colour Classes
//!
//! Map colours are assigned by [`colormap::QuantileScale`]: the break
//! points are quantiles of the mapped values, so each palette colour covers
//! roughly the same number of pixels. The scale serializes to JSON and
//! doubles as the map legend.
//!
//! # Examples
//!
//! ```
//! use encounter_render::{
//!     chart::{ChartLabels, frequency_chart},
//!     colormap::{ENCOUNTER_PALETTE, QuantileScale},
//! };
//! use encounter_stats::frequency::BinnedFrequency;
//!
//! let values = (0..80).map(f64::from).collect::<Vec<_>>();
//! let scale = QuantileScale::new(&values, &ENCOUNTER_PALETTE).unwrap();
//! assert_eq!(scale.color(0.0), ENCOUNTER_PALETTE[0]);
//! assert_eq!(scale.color(79.0), ENCOUNTER_PALETTE[7]);
//!
//! let hours = [(5.5, true), (6.2, false), (18.0, true)];
//! let freq = BinnedFrequency::new(hours, 0.0, 24.0, 24);
//! let labels = ChartLabels { title: "Diel pattern", x_label: "Hour of day" };
//! let svg = frequency_chart(&freq, labels).unwrap();
//! assert!(svg.contains("Diel pattern"));
//! ```

pub mod chart;
pub mod colormap;
pub mod map;
