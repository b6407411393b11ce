//! Synthetic radar scans with predictable values.
//!
//! The scans use 360 one-degree radials so that any Cartesian point can be
//! checked against the value the generator placed at that range.

use chrono::{DateTime, TimeZone, Utc};
use radar_common::{DecodedScan, PolarScan, Radial, ScanHeader};

use crate::fixtures::{sites, times};

/// Builds a 360-radial scan whose gate values come from `value_at(gate)`.
pub fn scan_from_fn<F>(gate_km: f32, num_gates: usize, value_at: F) -> PolarScan
where
    F: Fn(usize) -> f32,
{
    let values: Vec<f32> = (0..num_gates).map(value_at).collect();
    let radials = (0..360)
        .map(|az| Radial {
            start_azimuth: az as f32,
            width: 1.0,
            values: values.clone(),
        })
        .collect();
    PolarScan::new(radials, 0.0, gate_km)
}

/// Every gate holds `value`.
///
/// # Example
///
/// ```
/// use test_utils::uniform_scan;
///
/// let scan = uniform_scan(40.0, 1.0, 230);
/// assert_eq!(scan.sample(10.0, 10.0), Some(40.0));
/// assert_eq!(scan.sample(300.0, 0.0), None);
/// ```
pub fn uniform_scan(value: f32, gate_km: f32, num_gates: usize) -> PolarScan {
    scan_from_fn(gate_km, num_gates, |_| value)
}

/// Gates between `inner_km` and `outer_km` hold `value`; the rest are no data.
///
/// Approximates a squall line ring around the radar.
pub fn ring_scan(value: f32, inner_km: f32, outer_km: f32, gate_km: f32, num_gates: usize) -> PolarScan {
    scan_from_fn(gate_km, num_gates, |gate| {
        let range = gate as f32 * gate_km;
        if range >= inner_km && range < outer_km {
            value
        } else {
            f32::NAN
        }
    })
}

/// Gate `n` holds `n` as its value.
pub fn range_ramp_scan(gate_km: f32, num_gates: usize) -> PolarScan {
    scan_from_fn(gate_km, num_gates, |gate| gate as f32)
}

/// Volume start time shared by the generated scans (2024-01-15T12:30:00Z).
pub fn fixture_volume_start() -> DateTime<Utc> {
    Utc.timestamp_opt(times::JAN_15_2024_1230_UNIX, 0)
        .single()
        .expect("fixture timestamp is valid")
}

/// Wraps a scan in a header for the FWS site.
pub fn decoded_scan(scan_code: i16, elevation_angle: f64, scan: PolarScan) -> DecodedScan {
    DecodedScan {
        header: ScanHeader {
            site_id: sites::FWS.to_string(),
            scan_code,
            elevation_angle,
            volume_start: fixture_volume_start(),
            latitude: sites::FWS_LATITUDE,
            longitude: sites::FWS_LONGITUDE,
        },
        scan,
    }
}

/// Creates RGBA pixel data with a gradient pattern.
///
/// Red increases left to right, green top to bottom, blue is fixed at 128.
pub fn create_test_rgba_pixels(width: usize, height: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            pixels.extend_from_slice(&[r, g, 128, 255]);
        }
    }
    pixels
}
