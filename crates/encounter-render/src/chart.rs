//! Detection frequency charts as SVG.
//!
//! Each chart has two panels sharing the x axis: detection frequency per
//! bin as a line with markers on top, and the number of checklists per bin
//! as bars below. Empty bins break the line.
//!
//! Drawing goes through `plotters` with its SVG backend, so the output is
//! a standalone document with text kept as `<text>` elements.

use std::{fs, io, ops::Range, path::Path};

use encounter_stats::frequency::BinnedFrequency;
use plotters::{coord::Shift, prelude::*};

use crate::colormap::Rgb;

const SIZE: (u32, u32) = (640, 440);
/// Height of the frequency panel; the count panel takes the rest.
const TOP_PANEL_HEIGHT: u32 = 260;

const LINE_COLOR: Rgb = Rgb([145, 32, 110]);
const BAR_COLOR: Rgb = Rgb([160, 160, 160]);

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ChartError {
    #[display("failed to draw chart: {message}")]
    #[from(ignore)]
    Draw { message: String },
    #[display("failed to write chart")]
    Io(io::Error),
}

impl<E> From<DrawingAreaErrorKind<E>> for ChartError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        Self::Draw {
            message: err.to_string(),
        }
    }
}

/// Title and axis label of a frequency chart.
#[derive(Debug, Clone, Copy)]
pub struct ChartLabels<'a> {
    pub title: &'a str,
    pub x_label: &'a str,
}

/// Runs of consecutive non-empty bins as `(midpoint, frequency)` points.
#[must_use]
pub fn frequency_segments(freq: &BinnedFrequency) -> Vec<Vec<(f64, f64)>> {
    let mut segments: Vec<Vec<(f64, f64)>> = vec![vec![]];
    for b in &freq.bins {
        match b.frequency() {
            Some(f) => {
                if let Some(current) = segments.last_mut() {
                    current.push((b.midpoint(), f));
                }
            }
            None => segments.push(vec![]),
        }
    }
    segments.retain(|s| !s.is_empty());
    segments
}

fn x_range(freq: &BinnedFrequency) -> Range<f64> {
    match (freq.bins.first(), freq.bins.last()) {
        (Some(first), Some(last)) => first.start..last.end,
        _ => 0.0..1.0,
    }
}

fn draw_frequency_panel<DB>(
    area: &DrawingArea<DB, Shift>,
    freq: &BinnedFrequency,
    title: &str,
) -> Result<(), ChartError>
where
    DB: DrawingBackend,
{
    let max_freq = freq
        .bins
        .iter()
        .filter_map(|b| b.frequency())
        .fold(0.0, f64::max)
        .max(0.01);
    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 16))
        .margin(8)
        .x_label_area_size(20)
        .y_label_area_size(56)
        .build_cartesian_2d(x_range(freq), 0.0..max_freq * 1.05)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Detection frequency")
        .y_labels(5)
        .draw()?;

    let color = RGBColor::from(LINE_COLOR);
    for segment in frequency_segments(freq) {
        chart.draw_series(LineSeries::new(segment.iter().copied(), color.stroke_width(2)))?;
        chart.draw_series(segment.into_iter().map(|p| Circle::new(p, 3, color.filled())))?;
    }
    Ok(())
}

fn draw_count_panel<DB>(
    area: &DrawingArea<DB, Shift>,
    freq: &BinnedFrequency,
    x_label: &str,
) -> Result<(), ChartError>
where
    DB: DrawingBackend,
{
    let max_count = freq.bins.iter().map(|b| b.count).max().unwrap_or(0).max(1);
    #[expect(clippy::cast_precision_loss)]
    let max_count = max_count as f64;
    let mut chart = ChartBuilder::on(area)
        .margin(8)
        .x_label_area_size(36)
        .y_label_area_size(56)
        .build_cartesian_2d(x_range(freq), 0.0..max_count * 1.05)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(x_label)
        .y_desc("Checklists")
        .y_labels(4)
        .draw()?;

    let color = RGBColor::from(BAR_COLOR);
    chart.draw_series(freq.bins.iter().filter(|b| b.count > 0).map(|b| {
        #[expect(clippy::cast_precision_loss)]
        let count = b.count as f64;
        Rectangle::new([(b.start, 0.0), (b.end, count)], color.filled())
    }))?;
    Ok(())
}

/// Renders `freq` as an SVG document.
///
/// # Examples
///
/// ```
/// use encounter_render::chart::{ChartLabels, frequency_chart};
/// use encounter_stats::frequency::BinnedFrequency;
///
/// let freq = BinnedFrequency::new([(1.0, true), (2.5, false)], 0.0, 4.0, 4);
/// let labels = ChartLabels { title: "Diel", x_label: "Hour of day" };
/// let svg = frequency_chart(&freq, labels).unwrap();
/// assert!(svg.starts_with("<svg"));
/// assert_eq!(svg.matches("<circle").count(), 2);
/// ```
pub fn frequency_chart(
    freq: &BinnedFrequency,
    labels: ChartLabels<'_>,
) -> Result<String, ChartError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE)?;
        let (top, bottom) = root.split_vertically(TOP_PANEL_HEIGHT);
        draw_frequency_panel(&top, freq, labels.title)?;
        draw_count_panel(&bottom, freq, labels.x_label)?;
        root.present()?;
    }
    Ok(svg)
}

/// Writes a chart to `path`.
pub fn save_frequency_chart<P>(
    path: P,
    freq: &BinnedFrequency,
    labels: ChartLabels<'_>,
) -> Result<(), ChartError>
where
    P: AsRef<Path>,
{
    fs::write(path, frequency_chart(freq, labels)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> ChartLabels<'static> {
        ChartLabels {
            title: "Checklist duration",
            x_label: "Minutes",
        }
    }

    #[test]
    fn test_empty_bins_split_the_line() {
        let data = [(0.5, true), (0.6, false), (2.5, true), (3.5, false)];
        let freq = BinnedFrequency::new(data, 0.0, 4.0, 4);
        let segments = frequency_segments(&freq);
        assert_eq!(segments, vec![vec![(0.5, 0.5)], vec![(2.5, 1.0), (3.5, 0.0)]]);

        let svg = frequency_chart(&freq, labels()).unwrap();
        assert_eq!(svg.matches("<circle").count(), 3);
        assert!(svg.contains("Checklist duration"));
        assert!(svg.contains("Detection frequency"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_all_empty_bins_still_render() {
        let freq = BinnedFrequency::new(std::iter::empty(), 0.0, 24.0, 24);
        assert!(frequency_segments(&freq).is_empty());
        let svg = frequency_chart(&freq, labels()).unwrap();
        assert_eq!(svg.matches("<circle").count(), 0);
    }

    #[test]
    fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.svg");
        let freq = BinnedFrequency::new([(1.0, true)], 0.0, 2.0, 2);
        save_frequency_chart(&path, &freq, labels()).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("<svg"));
    }
}
