//! Radar product descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical quantity carried by a radar product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    Reflectivity,
    Velocity,
    SpectrumWidth,
    CrossCorrelationRatio,
}

impl Quantity {
    /// Value range mapped onto the color scheme.
    ///
    /// Values outside the range take the nearest end color, except where
    /// [`Quantity::transparent_below_range`] holds.
    pub fn display_limits(&self) -> (f32, f32) {
        match self {
            Quantity::Reflectivity => (5.0, 75.0),
            Quantity::Velocity => (-30.0, 30.0),
            Quantity::SpectrumWidth => (0.0, 30.0),
            Quantity::CrossCorrelationRatio => (0.2, 1.05),
        }
    }

    /// Whether values under the lower display limit are left unpainted.
    ///
    /// Only reflectivity has a noise floor; inbound velocities and low
    /// widths or correlations are real signal.
    pub fn transparent_below_range(&self) -> bool {
        matches!(self, Quantity::Reflectivity)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quantity::Reflectivity => "reflectivity",
            Quantity::Velocity => "velocity",
            Quantity::SpectrumWidth => "spectrum_width",
            Quantity::CrossCorrelationRatio => "cross_correlation_ratio",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named color scheme used to paint a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorScheme {
    #[serde(rename = "NWSRef")]
    NwsRef,
    #[serde(rename = "NWSVel")]
    NwsVel,
    #[serde(rename = "NWS_SPW")]
    NwsSpw,
    #[serde(rename = "RefDiff")]
    RefDiff,
}

impl ColorScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorScheme::NwsRef => "NWSRef",
            ColorScheme::NwsVel => "NWSVel",
            ColorScheme::NwsSpw => "NWS_SPW",
            ColorScheme::RefDiff => "RefDiff",
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to label and paint one radar product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDescriptor {
    /// Level III product code from the message header (e.g. 94)
    pub scan_code: i16,
    /// Elevation angle in degrees, one decimal place
    pub elevation_angle: f64,
    /// Short product identifier (e.g. "N0Q")
    pub display_code: String,
    /// Human-readable product title
    pub title: String,
    pub color_scheme: ColorScheme,
    pub quantity: Quantity,
}

/// Round an elevation angle to the catalog's one-decimal granularity.
///
/// Ties round away from zero (`f64::round`), not to even. Header angles are
/// whole tenths, so a tie only comes from a configured or derived angle.
pub fn round_angle(angle: f64) -> f64 {
    (angle * 10.0).round() / 10.0
}

/// Elevation angle in tenths of a degree, used as an exact lookup key.
pub fn angle_key(angle: f64) -> i32 {
    (angle * 10.0).round() as i32
}
