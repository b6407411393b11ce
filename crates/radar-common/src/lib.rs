//! Common types and utilities shared across the radar tiling crates.

pub mod error;
pub mod product;
pub mod record;
pub mod scan;
pub mod tile;

pub use error::{TileError, TileResult};
pub use product::{ColorScheme, ProductDescriptor, Quantity};
pub use record::{collection_name, TileRecord};
pub use scan::{DecodedScan, PolarScan, Radial, ScanHeader};
pub use tile::{AxisSpan, CropWindow, TileCell, TileId};
