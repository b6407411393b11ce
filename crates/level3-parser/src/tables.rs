//! Product tables: compression, gate spacing and data level mapping.
//!
//! Level III stores each gate as a data level (4-bit for the legacy
//! 16-level products, 8-bit for the digital ones). The thresholds in the
//! product description block describe how a level maps to a physical value;
//! the encoding of the thresholds depends on the product.

/// Products whose p8 halfword flags bzip2 compression.
const COMPRESSIBLE_PRODUCTS: &[i16] = &[
    32, 94, 99, 134, 135, 138, 149, 152, 153, 154, 155, 159, 161, 163, 165, 167, 168, 169,
    170, 171, 172, 173, 174, 175, 176, 177, 193, 195, 202,
];

/// Products using a linear digital mapping: min + (level - 2) * increment.
const LINEAR_DIGITAL_PRODUCTS: &[i16] = &[32, 93, 94, 99, 153, 154, 182, 186];

/// Products using a float scale/offset mapping.
const SCALED_DIGITAL_PRODUCTS: &[i16] = &[159, 161, 163];

/// Gate spacing in km by product code.
const GATE_SPACING_KM: &[(i16, f32)] = &[
    (19, 1.0),
    (20, 2.0),
    (25, 0.25),
    (27, 1.0),
    (28, 0.25),
    (30, 1.0),
    (32, 1.0),
    (56, 1.0),
    (94, 1.0),
    (99, 0.25),
    (153, 0.25),
    (154, 0.25),
    (159, 0.25),
    (161, 0.25),
    (163, 0.25),
];

/// Whether the product's p8 halfword is a compression flag.
pub fn is_compressible(code: i16) -> bool {
    COMPRESSIBLE_PRODUCTS.contains(&code)
}

/// Gate spacing for a product, if the product is known.
pub fn gate_spacing_km(code: i16) -> Option<f32> {
    GATE_SPACING_KM
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, km)| *km)
}

/// Maps raw data levels to physical values. NaN marks no data.
#[derive(Debug, Clone, PartialEq)]
pub enum DataMapper {
    /// Levels 0 and 1 are flags; others are `min + (level - 2) * increment`.
    Linear {
        min: f32,
        increment: f32,
        levels: u16,
    },
    /// The first `leading_flags` levels are flags; others are `(level - offset) / scale`.
    Scaled {
        scale: f32,
        offset: f32,
        leading_flags: u16,
    },
    /// Sixteen explicit thresholds, one per level.
    Legacy([f32; 16]),
}

impl DataMapper {
    /// Build the mapper for a product from its threshold halfwords.
    pub fn for_product(code: i16, thresholds: &[u16; 16]) -> Self {
        if LINEAR_DIGITAL_PRODUCTS.contains(&code) {
            DataMapper::Linear {
                min: thresholds[0] as i16 as f32 / 10.0,
                increment: thresholds[1] as i16 as f32 / 10.0,
                levels: thresholds[2],
            }
        } else if SCALED_DIGITAL_PRODUCTS.contains(&code) {
            let scale = f32::from_bits(((thresholds[0] as u32) << 16) | thresholds[1] as u32);
            let offset = f32::from_bits(((thresholds[2] as u32) << 16) | thresholds[3] as u32);
            let leading_flags = if thresholds[6] == 0 { 2 } else { thresholds[6] };
            DataMapper::Scaled {
                scale,
                offset,
                leading_flags,
            }
        } else {
            let mut values = [f32::NAN; 16];
            for (value, &threshold) in values.iter_mut().zip(thresholds.iter()) {
                *value = legacy_threshold(threshold);
            }
            DataMapper::Legacy(values)
        }
    }

    /// Physical value for a data level.
    pub fn map(&self, level: u8) -> f32 {
        match self {
            DataMapper::Linear {
                min,
                increment,
                levels,
            } => {
                if level < 2 || (*levels > 0 && level as u16 >= *levels) {
                    f32::NAN
                } else {
                    min + (level as f32 - 2.0) * increment
                }
            }
            DataMapper::Scaled {
                scale,
                offset,
                leading_flags,
            } => {
                if (level as u16) < *leading_flags || *scale == 0.0 {
                    f32::NAN
                } else {
                    (level as f32 - offset) / scale
                }
            }
            DataMapper::Legacy(values) => values.get(level as usize).copied().unwrap_or(f32::NAN),
        }
    }
}

/// Decode one legacy threshold halfword.
///
/// High byte holds flags, low byte the magnitude:
/// 0x80 special code (no value), 0x40 scale 0.01, 0x20 scale 0.05,
/// 0x10 scale 0.1, 0x01 negative.
fn legacy_threshold(threshold: u16) -> f32 {
    let flags = (threshold >> 8) as u8;
    let magnitude = (threshold & 0xFF) as f32;

    if flags & 0x80 != 0 {
        return f32::NAN;
    }

    let mut value = magnitude;
    if flags & 0x40 != 0 {
        value *= 0.01;
    } else if flags & 0x20 != 0 {
        value *= 0.05;
    } else if flags & 0x10 != 0 {
        value *= 0.1;
    }
    if flags & 0x01 != 0 {
        value = -value;
    }
    value
}
