//! Error types for the radar tiling pipeline.

use thiserror::Error;

use crate::tile::TileId;

/// Result type alias using TileError.
pub type TileResult<T> = Result<T, TileError>;

/// Primary error type for tiling operations.
#[derive(Debug, Error)]
pub enum TileError {
    // === Run-level (fatal) errors ===
    #[error("Unsupported product: scan code {code} at elevation {angle:.1}")]
    UnsupportedProduct { code: i16, angle: f64 },

    #[error("Failed to decode scan: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // === Per-tile errors ===
    #[error("Rendering failed for tile {tile}: {message}")]
    Render { tile: TileId, message: String },

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Scratch cleanup failed: {0}")]
    ScratchCleanup(String),

    #[error("Tile {tile} timed out")]
    Timeout { tile: TileId },

    #[error("Run cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(String),
}

impl TileError {
    /// Whether this error aborts the whole run rather than a single tile.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TileError::UnsupportedProduct { .. } | TileError::Decode(_) | TileError::Config(_)
        )
    }

    /// Whether the failed operation may succeed if attempted again.
    ///
    /// Only store failures qualify; a render failure or timeout is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TileError::Persistence(_))
    }
}

impl From<std::io::Error> for TileError {
    fn from(err: std::io::Error) -> Self {
        TileError::Io(err.to_string())
    }
}
