//! Radar color schemes.
//!
//! The NWS tables are stepped: the display range is split into equal bins
//! and every bin gets one color, like the legacy 16-level products. The
//! differential scheme used for correlation coefficient is a smooth ramp.

use radar_common::{ColorScheme, Quantity};

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse `#rrggbb` (leading `#` optional) as an opaque color.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::new(r, g, b, 255))
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Linear interpolation between two colors, `t` clamped to 0..=1.
pub fn interpolate_color(from: Color, to: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Color::new(
        mix(from.r, to.r),
        mix(from.g, to.g),
        mix(from.b, to.b),
        mix(from.a, to.a),
    )
}

/// 5 to 75 dBZ in 5 dBZ bins.
const NWS_REFLECTIVITY: &[&str] = &[
    "#04e9e7", "#019ff4", "#0300f4", "#02fd02", "#01c501", "#008e00", "#fdf802", "#e5bc00",
    "#fd9500", "#fd0000", "#d40000", "#bc0000", "#f800fd", "#9854c6", "#fdfdfd",
];

/// Inbound greens through outbound reds.
const NWS_VELOCITY: &[&str] = &[
    "#02fc02", "#01e402", "#01c501", "#07ac04", "#068f03", "#047202", "#7c977b", "#987777",
    "#890000", "#a20000", "#b90000", "#d80000", "#ef0000", "#fe0000",
];

const NWS_SPECTRUM_WIDTH: &[&str] = &[
    "#9c9c9c", "#767676", "#ffaaaa", "#ee8c8c", "#c97070", "#00fb90", "#00bb00", "#ffff70",
    "#d0d060", "#ff6060", "#da0000", "#ae0000", "#0000ff", "#ffffff", "#e700ff",
];

const REF_DIFF: &[&str] = &[
    "#00008b", "#0000ff", "#00bfff", "#00ff7f", "#7fff00", "#ffff00", "#ff8c00", "#ff0000",
    "#8b0000", "#ff00ff",
];

/// Maps physical values to colors over a fixed display range.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    colors: Vec<Color>,
    min: f32,
    max: f32,
    stepped: bool,
    /// Values under `min` are transparent instead of the first color
    transparent_below: bool,
}

impl ColorRamp {
    /// Build a ramp from hex stops. Returns `None` for bad hex or an empty range.
    pub fn from_hex_stops(stops: &[&str], min: f32, max: f32, stepped: bool) -> Option<Self> {
        if stops.is_empty() || !(max > min) {
            return None;
        }
        let colors = stops
            .iter()
            .map(|s| Color::from_hex(s))
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            colors,
            min,
            max,
            stepped,
            transparent_below: false,
        })
    }

    /// The ramp for a scheme, spread over the quantity's display limits.
    pub fn for_product(scheme: ColorScheme, quantity: Quantity) -> Self {
        let (stops, stepped) = match scheme {
            ColorScheme::NwsRef => (NWS_REFLECTIVITY, true),
            ColorScheme::NwsVel => (NWS_VELOCITY, true),
            ColorScheme::NwsSpw => (NWS_SPECTRUM_WIDTH, true),
            ColorScheme::RefDiff => (REF_DIFF, false),
        };
        let (min, max) = quantity.display_limits();
        let colors = stops.iter().filter_map(|s| Color::from_hex(s)).collect();
        Self {
            colors,
            min,
            max,
            stepped,
            transparent_below: quantity.transparent_below_range(),
        }
    }

    pub fn limits(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Color for a value. NaN is transparent. Out-of-range values clamp to
    /// the end colors, unless the ramp is transparent below its range.
    pub fn color_for(&self, value: f32) -> Color {
        if value.is_nan() || self.colors.is_empty() {
            return Color::transparent();
        }
        if value < self.min && self.transparent_below {
            return Color::transparent();
        }

        let t = ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
        let n = self.colors.len();

        if self.stepped || n == 1 {
            let bin = ((t * n as f32) as usize).min(n - 1);
            return self.colors[bin];
        }

        let pos = t * (n - 1) as f32;
        let lower = (pos.floor() as usize).min(n - 2);
        interpolate_color(self.colors[lower], self.colors[lower + 1], pos - lower as f32)
    }
}
