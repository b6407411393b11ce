//! Radar tile pyramid generation.
//!
//! A decoded scan goes through:
//! 1. [`ProductCatalog`]: resolve (scan code, elevation) to a product
//! 2. [`grid`]: partition the extent around the radar into cells
//! 3. [`TileDispatcher`]: one render-then-persist job per cell, bounded pool
//! 4. [`TileExporter`]: render the cell's window to a scratch PNG
//! 5. [`TilePersister`]: store the tile document, remove the scratch file
//!
//! [`TilePipeline`] runs the steps for every configured zoom size.

pub mod catalog;
pub mod decode;
pub mod dispatch;
pub mod grid;
pub mod persist;
pub mod pipeline;
pub mod render;
pub mod settings;

pub use catalog::ProductCatalog;
pub use decode::{decode_file, Level3Decoder, ScanDecoder};
pub use dispatch::{RunContext, TileDispatcher, TileFailure, ZoomReport};
pub use grid::{build_axis_boundaries, enumerate_cells, GridSpec};
pub use persist::{RetryPolicy, TilePersister};
pub use pipeline::{RunReport, TilePipeline};
pub use render::{PolarTileRenderer, TileArtifact, TileExporter, TileRenderer};
pub use settings::TilingSettings;
