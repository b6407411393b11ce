//! The document store seam used by the tiling pipeline.

use async_trait::async_trait;
use uuid::Uuid;

use radar_common::{TileError, TileRecord, TileResult};

/// Longest collection name accepted (PostgreSQL identifier limit).
const MAX_COLLECTION_LEN: usize = 63;

/// A record as read back from a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTile {
    pub id: Uuid,
    pub record: TileRecord,
}

/// Write-once tile storage, partitioned by collection.
///
/// Implementations must be safe to share across concurrent tile jobs.
#[async_trait]
pub trait TileStore: Send + Sync {
    /// Insert one tile document and return its store id.
    ///
    /// Connection or write failures are [`TileError::Persistence`] and may be
    /// retried; an invalid collection name is [`TileError::Config`].
    async fn insert_tile(&self, collection: &str, record: &TileRecord) -> TileResult<Uuid>;

    /// All tiles of one product rendered at `zoom`, ordered by tile name.
    async fn list_tiles(&self, collection: &str, product: &str, zoom: u32) -> TileResult<Vec<StoredTile>>;
}

/// Collection names become table names, so only `[A-Za-z0-9_]` is allowed
/// and the first character must be a letter.
pub fn validate_collection(name: &str) -> TileResult<()> {
    let starts_with_letter = name.chars().next().map_or(false, |c| c.is_ascii_alphabetic());
    let valid_chars = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !starts_with_letter || !valid_chars || name.len() > MAX_COLLECTION_LEN {
        return Err(TileError::Config(format!("Invalid collection name: {:?}", name)));
    }
    Ok(())
}
