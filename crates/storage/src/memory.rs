//! In-memory tile store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use radar_common::{TileRecord, TileResult};

use crate::tile_store::{validate_collection, StoredTile, TileStore};

/// Keeps every inserted document in a map of collections.
///
/// Used by `--dry-run` and by the pipeline tests.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    collections: RwLock<HashMap<String, Vec<StoredTile>>>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of collections that hold at least one tile, sorted.
    pub async fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |tiles| tiles.len())
    }

    /// Every tile in a collection, in insertion order.
    pub async fn tiles(&self, collection: &str) -> Vec<StoredTile> {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TileStore for MemoryTileStore {
    async fn insert_tile(&self, collection: &str, record: &TileRecord) -> TileResult<Uuid> {
        validate_collection(collection)?;

        let id = Uuid::new_v4();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(StoredTile {
                id,
                record: record.clone(),
            });

        debug!(collection = collection, tile = %record.tile_name, id = %id, "Stored tile in memory");
        Ok(id)
    }

    async fn list_tiles(&self, collection: &str, product: &str, zoom: u32) -> TileResult<Vec<StoredTile>> {
        validate_collection(collection)?;

        let mut tiles: Vec<StoredTile> = self
            .collections
            .read()
            .await
            .get(collection)
            .map(|tiles| {
                tiles
                    .iter()
                    .filter(|t| t.record.product == product && t.record.zoom == zoom)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        tiles.sort_by(|a, b| a.record.tile_name.cmp(&b.record.tile_name));
        Ok(tiles)
    }
}
