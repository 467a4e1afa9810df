use std::fmt;
use std::str::FromStr;

use plotters::style::RGBColor;
use serde::{Deserialize, Serialize};

use crate::CompmapError;

/// Color scheme for attainment values in [0, 100].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Near-white through seagreen.
    #[default]
    Light,
    /// Purple fading into near-black.
    Dark,
}

const LIGHT_LOW: (u8, u8, u8) = (236, 243, 238);
const LIGHT_HIGH: (u8, u8, u8) = (46, 139, 87);
const DARK_LOW: (u8, u8, u8) = (128, 0, 128);
const DARK_HIGH: (u8, u8, u8) = (22, 0, 26);

impl Palette {
    pub const ALL: [Palette; 2] = [Palette::Light, Palette::Dark];

    pub fn name(&self) -> &'static str {
        match self {
            Palette::Light => "light",
            Palette::Dark => "dark",
        }
    }

    fn stops(&self) -> ((u8, u8, u8), (u8, u8, u8)) {
        match self {
            Palette::Light => (LIGHT_LOW, LIGHT_HIGH),
            Palette::Dark => (DARK_LOW, DARK_HIGH),
        }
    }

    /// Linear two-stop scale; values are clamped to [0, 100].
    pub fn color(&self, value: f64) -> RGBColor {
        let t = if value.is_finite() {
            (value / 100.0).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let (low, high) = self.stops();
        let mix = |a: u8, b: u8| -> u8 { (a as f64 + (b as f64 - a as f64) * t).round() as u8 };
        RGBColor(mix(low.0, high.0), mix(low.1, high.1), mix(low.2, high.2))
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Palette {
    type Err = CompmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Palette::Light),
            "dark" => Ok(Palette::Dark),
            other => Err(CompmapError::Configuration(format!(
                "unknown palette '{}' (expected light|dark)",
                other
            ))),
        }
    }
}

/// Relative luminance on a 0..255 scale (Rec. 709 weights).
pub fn luminance(color: RGBColor) -> f64 {
    0.2126 * color.0 as f64 + 0.7152 * color.1 as f64 + 0.0722 * color.2 as f64
}

/// Black or white, whichever reads better on `fill`.
pub fn contrast_text(fill: RGBColor) -> RGBColor {
    if luminance(fill) < 128.0 {
        RGBColor(255, 255, 255)
    } else {
        RGBColor(0, 0, 0)
    }
}
