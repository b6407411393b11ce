//! Storage for rendered radar tiles.
//!
//! Tiles are write-once documents grouped into one collection per radar
//! site (`"K" + site`, e.g. `KFWS`). Two backends implement [`TileStore`]:
//! - PostgreSQL, one table per collection
//! - In-memory, for tests and dry runs

pub mod memory;
pub mod postgres;
pub mod tile_store;

pub use memory::MemoryTileStore;
pub use postgres::PostgresTileStore;
pub use tile_store::{validate_collection, StoredTile, TileStore};
