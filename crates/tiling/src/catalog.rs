//! Product catalog: (scan code, elevation angle) → product descriptor.
//!
//! The builtin table covers the NEXRAD Level III products that are tiled.
//! A deployment can replace it with entries from the `products:` section
//! of the config file.

use std::collections::{HashMap, HashSet};

use radar_common::product::{angle_key, round_angle};
use radar_common::{ColorScheme, ProductDescriptor, Quantity, TileError, TileResult};

/// (code, angle, display code, title, scheme, quantity)
type BuiltinEntry = (i16, f64, &'static str, &'static str, ColorScheme, Quantity);

const BUILTIN: &[BuiltinEntry] = {
    use ColorScheme::*;
    use Quantity::*;
    &[
        (19, 0.5, "N0R", "Base Reflectivity - Tilt 1", NwsRef, Reflectivity),
        (27, 0.5, "N0V", "Base Velocity - Tilt 1", NwsVel, Velocity),
        (30, 0.5, "NSW", "Base Spectrum Width - Tilt 1", NwsSpw, SpectrumWidth),
        (56, 0.5, "N0S", "Storm Relative Mean Radial Velocity - Tilt 1", NwsVel, Velocity),
        (56, 1.3, "N1S", "Storm Relative Mean Radial Velocity - Tilt 2", NwsVel, Velocity),
        (56, 2.4, "N2S", "Storm Relative Mean Radial Velocity - Tilt 3", NwsVel, Velocity),
        (56, 3.1, "N3S", "Storm Relative Mean Radial Velocity - Tilt 4", NwsVel, Velocity),
        (94, 0.5, "N0Q", "Base Reflectivity Data Array - Tilt 1", NwsRef, Reflectivity),
        (94, 0.9, "NAQ", "Base Reflectivity Data Array - Tilt 2", NwsRef, Reflectivity),
        (94, 1.5, "N1Q", "Base Reflectivity Data Array - Tilt 3", NwsRef, Reflectivity),
        (94, 1.8, "NBQ", "Base Reflectivity Data Array - Tilt 4", NwsRef, Reflectivity),
        (94, 2.4, "N2Q", "Base Reflectivity Data Array - Tilt 5", NwsRef, Reflectivity),
        (94, 3.1, "N3Q", "Base Reflectivity Data Array - Tilt 6", NwsRef, Reflectivity),
        (99, 0.5, "N0U", "Base Velocity Data Array - Tilt 1", NwsVel, Velocity),
        (99, 0.9, "NAU", "Base Velocity Data Array - Tilt 2", NwsVel, Velocity),
        (99, 1.3, "N1U", "Base Velocity Data Array - Tilt 3", NwsVel, Velocity),
        (99, 1.8, "NBU", "Base Velocity Data Array - Tilt 4", NwsVel, Velocity),
        (99, 2.4, "N2U", "Base Velocity Data Array - Tilt 5", NwsVel, Velocity),
        (99, 3.1, "N3U", "Base Velocity Data Array - Tilt 6", NwsVel, Velocity),
        (161, 0.5, "N0C", "Digital Correlation Coefficient - Tilt 1", RefDiff, CrossCorrelationRatio),
        (161, 0.9, "NAC", "Digital Correlation Coefficient - Tilt 2", RefDiff, CrossCorrelationRatio),
        (161, 1.3, "N1C", "Digital Correlation Coefficient - Tilt 3", RefDiff, CrossCorrelationRatio),
        (161, 1.8, "NBC", "Digital Correlation Coefficient - Tilt 4", RefDiff, CrossCorrelationRatio),
        (161, 2.4, "N2C", "Digital Correlation Coefficient - Tilt 5", RefDiff, CrossCorrelationRatio),
        (161, 3.1, "N3C", "Digital Correlation Coefficient - Tilt 6", RefDiff, CrossCorrelationRatio),
    ]
};

/// Immutable lookup table of tileable products.
#[derive(Debug, Clone)]
pub struct ProductCatalog {
    entries: HashMap<(i16, i32), ProductDescriptor>,
}

impl ProductCatalog {
    /// The standard NEXRAD product table.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|&(code, angle, display, title, color_scheme, quantity)| {
                (
                    (code, angle_key(angle)),
                    ProductDescriptor {
                        scan_code: code,
                        elevation_angle: angle,
                        display_code: display.to_string(),
                        title: title.to_string(),
                        color_scheme,
                        quantity,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Build a catalog from configured entries.
    ///
    /// Angles are rounded to one decimal. Two entries with the same
    /// (code, angle) pair or the same display code are rejected.
    pub fn from_entries(entries: Vec<ProductDescriptor>) -> TileResult<Self> {
        if entries.is_empty() {
            return Err(TileError::Config("Product catalog is empty".to_string()));
        }

        let mut map = HashMap::with_capacity(entries.len());
        let mut display_codes = HashSet::with_capacity(entries.len());

        for mut entry in entries {
            entry.elevation_angle = round_angle(entry.elevation_angle);
            let key = (entry.scan_code, angle_key(entry.elevation_angle));

            if !display_codes.insert(entry.display_code.clone()) {
                return Err(TileError::Config(format!(
                    "Duplicate display code {} in product catalog",
                    entry.display_code
                )));
            }
            if map.contains_key(&key) {
                return Err(TileError::Config(format!(
                    "Duplicate product {} at {:.1} in product catalog",
                    entry.scan_code, entry.elevation_angle
                )));
            }
            map.insert(key, entry);
        }

        Ok(Self { entries: map })
    }

    /// Look up the product for a scan. The angle is rounded to one decimal.
    pub fn resolve(&self, scan_code: i16, elevation_angle: f64) -> TileResult<&ProductDescriptor> {
        self.entries
            .get(&(scan_code, angle_key(elevation_angle)))
            .ok_or(TileError::UnsupportedProduct {
                code: scan_code,
                angle: round_angle(elevation_angle),
            })
    }

    /// Descriptors ordered by (code, angle).
    pub fn iter(&self) -> impl Iterator<Item = &ProductDescriptor> {
        let mut keys: Vec<&(i16, i32)> = self.entries.keys().collect();
        keys.sort();
        keys.into_iter().filter_map(move |key| self.entries.get(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
