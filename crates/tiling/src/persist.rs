//! Tile persistence with retry.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use radar_common::{ProductDescriptor, TileError, TileRecord, TileResult};
use storage::TileStore;

use crate::render::TileArtifact;

/// Exponential backoff for store writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry (doubles each retry)
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 250,
            max_delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Writes rendered tiles to the store and removes their scratch files.
pub struct TilePersister {
    store: Arc<dyn TileStore>,
    retry: RetryPolicy,
}

impl TilePersister {
    pub fn new(store: Arc<dyn TileStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Insert the tile document for `artifact` into `collection`.
    ///
    /// The scratch file is removed whether or not the insert succeeds.
    /// A failed removal is logged and does not affect the result.
    pub async fn persist(
        &self,
        artifact: TileArtifact,
        product: &ProductDescriptor,
        collection: &str,
        timestamp: i64,
    ) -> TileResult<Uuid> {
        let id = artifact.id();

        let result = match artifact.read().await {
            Ok(tile) => {
                let record = TileRecord::new(product, id, timestamp, tile);
                self.insert_with_retry(collection, &record).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = artifact.cleanup() {
            warn!(tile = %id, error = %e, "Failed to remove scratch tile");
        }

        if let Ok(doc_id) = &result {
            debug!(tile = %id, collection = collection, id = %doc_id, "Persisted tile");
        }
        result
    }

    async fn insert_with_retry(&self, collection: &str, record: &TileRecord) -> TileResult<Uuid> {
        let mut retry_count = 0;
        let mut delay = self.retry.initial_delay();

        loop {
            match self.store.insert_tile(collection, record).await {
                Ok(id) => return Ok(id),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    retry_count += 1;

                    if retry_count > self.retry.max_retries {
                        return Err(TileError::Persistence(format!(
                            "Insert of {} gave up after {} retries: {}",
                            record.tile_name, self.retry.max_retries, e
                        )));
                    }

                    warn!(
                        tile = %record.tile_name,
                        zoom = record.zoom,
                        error = %e,
                        retry = retry_count,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Insert failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.retry.max_delay());
                }
            }
        }
    }
}
