//! Image rendering for radar tiles.
//!
//! - NWS-style color schemes keyed by [`radar_common::ColorScheme`]
//! - Rasterization of a polar scan into a Cartesian window
//! - PNG encoding (indexed when the tile has few colors, RGBA otherwise)

pub mod colormap;
pub mod png;
pub mod polar;

use thiserror::Error;

pub use colormap::{Color, ColorRamp};
pub use polar::{render_window, render_window_png};

/// Errors from rendering or encoding a tile image.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid image size {width}x{height}")]
    InvalidSize { width: usize, height: usize },

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),
}
