//! Tile grid cells and identities.
//!
//! A tile grid is the cross product of two boundary sequences. Each cell
//! spans from one boundary to the next on both axes; the last boundary of a
//! sequence has no successor, so cells built from it carry an open span and
//! never produce a crop window.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one tile job: zoom size plus 1-based grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId {
    /// Zoom size (canvas dimension)
    pub zoom: u32,
    /// Row, 1-based position along the X boundary sequence
    pub row: u32,
    /// Column, 1-based position along the Y boundary sequence
    pub col: u32,
}

impl TileId {
    pub fn new(zoom: u32, row: u32, col: u32) -> Self {
        Self { zoom, row, col }
    }

    /// Tile name as persisted: `<row>_<col>`.
    pub fn tile_name(&self) -> String {
        format!("{}_{}", self.row, self.col)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}_{}", self.zoom, self.row, self.col)
    }
}

/// Span of a cell along one axis. `high` is `None` at the end of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSpan {
    pub low: f64,
    pub high: Option<f64>,
}

impl AxisSpan {
    pub fn new(low: f64, high: Option<f64>) -> Self {
        Self { low, high }
    }

    pub fn closed(low: f64, high: f64) -> Self {
        Self {
            low,
            high: Some(high),
        }
    }

    /// `(low, high)` when the span has an upper edge.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.high.map(|high| (self.low, high))
    }

    pub fn is_open(&self) -> bool {
        self.high.is_none()
    }
}

/// Physical rectangle (km from the radar) rendered into one tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropWindow {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl CropWindow {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// A window is usable when both extents are finite and positive.
    pub fn is_valid(&self) -> bool {
        self.width().is_finite() && self.height().is_finite() && self.width() > 0.0 && self.height() > 0.0
    }
}

/// One grid position produced by enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileCell {
    pub row: u32,
    pub col: u32,
    pub x: AxisSpan,
    pub y: AxisSpan,
}

impl TileCell {
    pub fn new(row: u32, col: u32, x: AxisSpan, y: AxisSpan) -> Self {
        Self { row, col, x, y }
    }

    /// Whether this cell sits on the last boundary of either axis.
    pub fn is_sentinel(&self) -> bool {
        self.x.is_open() || self.y.is_open()
    }

    /// Crop window for this cell, `None` for sentinel cells.
    pub fn window(&self) -> Option<CropWindow> {
        let (x_min, x_max) = self.x.bounds()?;
        let (y_min, y_max) = self.y.bounds()?;
        Some(CropWindow::new(x_min, x_max, y_min, y_max))
    }

    pub fn id(&self, zoom: u32) -> TileId {
        TileId::new(zoom, self.row, self.col)
    }
}
