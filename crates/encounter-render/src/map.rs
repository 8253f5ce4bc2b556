//! Encounter-rate maps as RGB TIFF images.
//!
//! A [`Raster`] of calibrated probabilities is coloured with a
//! [`QuantileScale`], boundary lines are stroked over it through a
//! `plotters` bitmap backend on the same pixel buffer, and the image is
//! written uncompressed with one RGB8 pixel per raster cell. Row 0 of the
//! image is the northern edge of the display window.

use std::{
    fs::File,
    io::{self, BufWriter, Seek, Write},
    path::Path,
};

use plotters::prelude::*;
use tiff::encoder::{TiffEncoder, colortype};

use encounter_spatial::{projection::Point, raster::Raster};

use crate::colormap::{ENCOUNTER_PALETTE, QuantileScale, Rgb};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum MapError {
    #[display("raster has no data to colour")]
    Empty,
    #[display("failed to write map image")]
    Io(io::Error),
    #[display("failed to encode TIFF")]
    Tiff(tiff::TiffError),
    #[display("failed to draw boundaries: {message}")]
    #[from(ignore)]
    Draw { message: String },
}

impl<E> From<DrawingAreaErrorKind<E>> for MapError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        Self::Draw {
            message: err.to_string(),
        }
    }
}

/// Bound on pixel offsets so far-off vertices keep rasterising cheap.
const PIXEL_LIMIT: f64 = 1e6;

#[derive(Debug, Clone, PartialEq)]
pub struct MapStyle {
    pub palette: Vec<Rgb>,
    /// Colour of empty pixels.
    pub background: Rgb,
    pub boundary: Rgb,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            palette: ENCOUNTER_PALETTE.to_vec(),
            background: Rgb::WHITE,
            boundary: Rgb::GREY,
        }
    }
}

/// Row-major RGB8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl RgbImage {
    #[must_use]
    pub fn filled(width: usize, height: usize, color: Rgb) -> Self {
        Self {
            width,
            height,
            pixels: color.0.repeat(width * height),
        }
    }

    #[must_use]
    pub fn get(&self, col: usize, row: usize) -> Rgb {
        let i = 3 * (row * self.width + col);
        Rgb([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]])
    }

    pub fn set(&mut self, col: usize, row: usize, color: Rgb) {
        let i = 3 * (row * self.width + col);
        self.pixels[i..i + 3].copy_from_slice(&color.0);
    }

    /// Strokes pixel-space polylines over the image.
    ///
    /// Vertices may lie outside the image; the parts that do are clipped.
    pub fn draw_polylines(
        &mut self,
        lines: &[Vec<(i32, i32)>],
        color: Rgb,
    ) -> Result<(), MapError> {
        let size = (
            u32::try_from(self.width).map_err(|_| tiff::TiffError::LimitsExceeded)?,
            u32::try_from(self.height).map_err(|_| tiff::TiffError::LimitsExceeded)?,
        );
        let root = BitMapBackend::with_buffer(&mut self.pixels, size).into_drawing_area();
        let style = RGBColor::from(color).stroke_width(1);
        for line in lines.iter().filter(|l| l.len() > 1) {
            root.draw(&PathElement::new(line.clone(), style))?;
        }
        root.present()?;
        Ok(())
    }

    pub fn write_tiff<W>(&self, writer: W) -> Result<(), MapError>
    where
        W: Write + Seek,
    {
        let width = u32::try_from(self.width).map_err(|_| tiff::TiffError::LimitsExceeded)?;
        let height = u32::try_from(self.height).map_err(|_| tiff::TiffError::LimitsExceeded)?;
        let mut encoder = TiffEncoder::new(writer)?;
        encoder.write_image::<colortype::RGB8>(width, height, &self.pixels)?;
        Ok(())
    }

    pub fn save_tiff<P>(&self, path: P) -> Result<(), MapError>
    where
        P: AsRef<Path>,
    {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_tiff(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Pixel position of a projected point, possibly outside the image.
#[expect(clippy::cast_possible_truncation)]
fn pixel_position(raster: &Raster, p: Point) -> (i32, i32) {
    let w = &raster.window;
    let col = ((p.x - w.extent.min_x) / w.resolution).floor();
    let row = ((w.extent.max_y - p.y) / w.resolution).floor();
    (
        col.clamp(-PIXEL_LIMIT, PIXEL_LIMIT) as i32,
        row.clamp(-PIXEL_LIMIT, PIXEL_LIMIT) as i32,
    )
}

/// Colours `raster` and draws `boundaries` (projected polylines) on top.
///
/// Returns the image and the colour scale used for the legend.
pub fn render_map(
    raster: &Raster,
    boundaries: &[Vec<Point>],
    style: &MapStyle,
) -> Result<(RgbImage, QuantileScale), MapError> {
    let values = raster.data().collect::<Vec<_>>();
    let scale = QuantileScale::new(&values, &style.palette).ok_or(MapError::Empty)?;
    let (width, height) = (raster.window.width, raster.window.height);

    let mut image = RgbImage::filled(width, height, style.background);
    for row in 0..height {
        for col in 0..width {
            if let Some(v) = raster.get(col, row) {
                image.set(col, row, scale.color(v));
            }
        }
    }
    let lines = boundaries
        .iter()
        .map(|line| line.iter().map(|&p| pixel_position(raster, p)).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    image.draw_polylines(&lines, style.boundary)?;
    tracing::debug!(width, height, breaks = ?scale.breaks(), "rendered map");
    Ok((image, scale))
}
