//! Decoded radar scans in polar form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Azimuth lookup resolution: tenths of a degree.
const AZIMUTH_BINS: usize = 3600;

const NO_RADIAL: u32 = u32::MAX;

/// One radial (ray) of gates.
#[derive(Debug, Clone, PartialEq)]
pub struct Radial {
    /// Azimuth where the radial starts, degrees clockwise from north
    pub start_azimuth: f32,
    /// Angular width in degrees
    pub width: f32,
    /// Physical values per gate; NaN marks no data
    pub values: Vec<f32>,
}

/// A single sweep of radials with uniform gate spacing.
///
/// Immutable once built; the azimuth index is computed up front so many
/// tile workers can sample the same scan concurrently.
#[derive(Debug, Clone)]
pub struct PolarScan {
    radials: Vec<Radial>,
    first_gate_km: f32,
    gate_km: f32,
    azimuth_index: Vec<u32>,
}

impl PolarScan {
    pub fn new(radials: Vec<Radial>, first_gate_km: f32, gate_km: f32) -> Self {
        let mut azimuth_index = vec![NO_RADIAL; AZIMUTH_BINS];

        for (i, radial) in radials.iter().enumerate() {
            if radial.width <= 0.0 {
                continue;
            }
            let start = radial.start_azimuth;
            let end = start + radial.width;
            let first = (start * 10.0).floor() as i64;
            let last = (end * 10.0).ceil() as i64;

            for tenth in first..last {
                let center = (tenth as f32 + 0.5) / 10.0;
                if center >= start && center < end {
                    let slot = tenth.rem_euclid(AZIMUTH_BINS as i64) as usize;
                    azimuth_index[slot] = i as u32;
                }
            }
        }

        Self {
            radials,
            first_gate_km,
            gate_km,
            azimuth_index,
        }
    }

    pub fn radials(&self) -> &[Radial] {
        &self.radials
    }

    pub fn first_gate_km(&self) -> f32 {
        self.first_gate_km
    }

    pub fn gate_km(&self) -> f32 {
        self.gate_km
    }

    /// Number of gates in the longest radial.
    pub fn gate_count(&self) -> usize {
        self.radials.iter().map(|r| r.values.len()).max().unwrap_or(0)
    }

    /// Distance from the radar to the far edge of the last gate.
    pub fn max_range_km(&self) -> f32 {
        self.first_gate_km + self.gate_km * self.gate_count() as f32
    }

    /// Value at a Cartesian point (km east, km north of the radar).
    ///
    /// Returns `None` outside the sampled disk, between radials, or where
    /// the gate holds no data.
    pub fn sample(&self, x_km: f64, y_km: f64) -> Option<f32> {
        if self.gate_km <= 0.0 {
            return None;
        }

        let range = (x_km * x_km + y_km * y_km).sqrt() as f32;
        let gate = ((range - self.first_gate_km) / self.gate_km).floor();
        if gate < 0.0 {
            return None;
        }

        let mut azimuth = x_km.atan2(y_km).to_degrees();
        if azimuth < 0.0 {
            azimuth += 360.0;
        }
        let slot = ((azimuth * 10.0) as usize).min(AZIMUTH_BINS - 1);
        let radial_idx = self.azimuth_index[slot];
        if radial_idx == NO_RADIAL {
            return None;
        }

        let value = *self.radials[radial_idx as usize].values.get(gate as usize)?;
        if value.is_nan() {
            None
        } else {
            Some(value)
        }
    }
}

/// Header fields the tiling pipeline needs from a decoded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHeader {
    /// Three-letter site identifier (e.g. "FWS")
    pub site_id: String,
    /// Product code
    pub scan_code: i16,
    /// Elevation angle in degrees, as decoded (not rounded)
    pub elevation_angle: f64,
    /// Volume scan start time
    pub volume_start: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

/// A fully decoded scan: header plus polar data.
#[derive(Debug, Clone)]
pub struct DecodedScan {
    pub header: ScanHeader,
    pub scan: PolarScan,
}
