//! Rasterize a polar scan into a Cartesian crop window.

use rayon::prelude::*;
use tracing::trace;

use radar_common::{CropWindow, PolarScan};

use crate::colormap::ColorRamp;
use crate::png::create_png_auto;
use crate::RenderError;

/// Render `window` of the scan to `width` × `height` RGBA pixels.
///
/// Window coordinates are km east (x) and km north (y) of the radar. Row 0
/// is the northern edge. Each pixel takes the gate under its center;
/// pixels outside the sampled disk or over no-data gates are transparent.
pub fn render_window(
    scan: &PolarScan,
    ramp: &ColorRamp,
    window: &CropWindow,
    width: usize,
    height: usize,
) -> Result<Vec<u8>, RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidSize { width, height });
    }
    if !window.is_valid() {
        return Err(RenderError::InvalidWindow(format!("{:?}", window)));
    }

    let x_scale = window.width() / width as f64;
    let y_scale = window.height() / height as f64;

    let mut pixels = vec![0u8; width * height * 4];
    pixels
        .par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(py, row)| {
            let y_km = window.y_max - (py as f64 + 0.5) * y_scale;
            for (px, pixel) in row.chunks_exact_mut(4).enumerate() {
                let x_km = window.x_min + (px as f64 + 0.5) * x_scale;
                if let Some(value) = scan.sample(x_km, y_km) {
                    pixel.copy_from_slice(&ramp.color_for(value).to_array());
                }
            }
        });

    trace!(width = width, height = height, "Rendered polar window");
    Ok(pixels)
}

/// Render a window and encode it as PNG.
pub fn render_window_png(
    scan: &PolarScan,
    ramp: &ColorRamp,
    window: &CropWindow,
    width: usize,
    height: usize,
) -> Result<Vec<u8>, RenderError> {
    let pixels = render_window(scan, ramp, window, width, height)?;
    create_png_auto(&pixels, width, height)
}
