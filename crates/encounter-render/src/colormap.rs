//! Quantile colour scales.

use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};

use encounter_stats::percentiles::quantile_breaks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const WHITE: Self = Self([255, 255, 255]);
    pub const GREY: Self = Self([102, 102, 102]);
}

impl From<Rgb> for RGBColor {
    fn from(Rgb([r, g, b]): Rgb) -> Self {
        RGBColor(r, g, b)
    }
}

/// Light yellow to dark purple, low to high.
pub const ENCOUNTER_PALETTE: [Rgb; 8] = [
    Rgb([254, 235, 174]),
    Rgb([252, 197, 127]),
    Rgb([249, 148, 84]),
    Rgb([236, 98, 66]),
    Rgb([196, 57, 89]),
    Rgb([145, 32, 110]),
    Rgb([90, 17, 117]),
    Rgb([40, 11, 84]),
];

/// Maps values to palette colours so that each colour covers about the
/// same number of values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantileScale {
    /// `palette.len() + 1` non-decreasing class bounds.
    breaks: Vec<f64>,
    palette: Vec<Rgb>,
}

impl QuantileScale {
    /// Returns `None` if `values` has no finite value or `palette` is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use encounter_render::colormap::{QuantileScale, Rgb};
    ///
    /// let palette = [Rgb([0, 0, 0]), Rgb([255, 255, 255])];
    /// let scale = QuantileScale::new(&[0.1, 0.2, 0.3, 0.4], &palette).unwrap();
    /// assert_eq!(scale.color(0.1), palette[0]);
    /// assert_eq!(scale.color(0.4), palette[1]);
    /// ```
    #[must_use]
    pub fn new(values: &[f64], palette: &[Rgb]) -> Option<Self> {
        let breaks = quantile_breaks(values, palette.len());
        if breaks.is_empty() {
            return None;
        }
        Some(Self {
            breaks,
            palette: palette.to_vec(),
        })
    }

    #[must_use]
    pub fn breaks(&self) -> &[f64] {
        &self.breaks
    }

    /// Index of the class containing `value`. Classes are closed below;
    /// values at or above the last inner break fall in the top class.
    #[must_use]
    pub fn class(&self, value: f64) -> usize {
        let inner = &self.breaks[1..self.breaks.len() - 1];
        inner.partition_point(|&b| b <= value)
    }

    #[must_use]
    pub fn color(&self, value: f64) -> Rgb {
        self.palette[self.class(value)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes_have_equal_counts() {
        let values = (0..80).map(f64::from).collect::<Vec<_>>();
        let scale = QuantileScale::new(&values, &ENCOUNTER_PALETTE).unwrap();
        let mut counts = [0; 8];
        for &v in &values {
            counts[scale.class(v)] += 1;
        }
        assert!(counts.iter().all(|&c| c == 10), "{counts:?}");
        assert_eq!(scale.color(-5.0), ENCOUNTER_PALETTE[0]);
        assert_eq!(scale.color(1e9), ENCOUNTER_PALETTE[7]);
    }

    #[test]
    fn test_plotting_colour_and_nan_input() {
        assert_eq!(RGBColor::from(Rgb([255, 0, 16])), RGBColor(255, 0, 16));
        assert!(QuantileScale::new(&[f64::NAN], &ENCOUNTER_PALETTE).is_none());
    }
}
