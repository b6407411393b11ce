//! Fan-out of tile jobs for one zoom level.
//!
//! Every non-sentinel cell becomes an independent render-then-persist job.
//! Jobs share only read-only handles, run on a bounded pool and each one
//! observes the run's cancellation token and its own timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use radar_common::{DecodedScan, ProductDescriptor, TileCell, TileError, TileId, TileResult};

use crate::persist::TilePersister;
use crate::render::TileExporter;

/// Read-only inputs shared by every job of a run.
#[derive(Debug)]
pub struct RunContext {
    pub scan: Arc<DecodedScan>,
    pub product: Arc<ProductDescriptor>,
    pub collection: String,
    /// Volume start, epoch seconds
    pub timestamp: i64,
}

/// A tile that was not stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileFailure {
    pub tile: TileId,
    pub error: String,
}

/// Outcome counts for one zoom level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ZoomReport {
    pub zoom: u32,
    /// Cells enumerated, sentinels included
    pub cells: usize,
    pub skipped: usize,
    pub inserted: usize,
    pub failed: usize,
    /// Jobs not started or interrupted by cancellation
    pub cancelled: usize,
    pub failures: Vec<TileFailure>,
}

/// Runs tile jobs on a bounded pool.
pub struct TileDispatcher {
    exporter: Arc<TileExporter>,
    persister: Arc<TilePersister>,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    job_timeout: Duration,
}

impl TileDispatcher {
    pub fn new(
        exporter: Arc<TileExporter>,
        persister: Arc<TilePersister>,
        max_concurrency: usize,
        job_timeout: Duration,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            exporter,
            persister,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            job_timeout,
        }
    }

    /// Run one job per non-sentinel cell and wait for all of them.
    ///
    /// A job's pool slot is held until its render has finished, including
    /// renders that outlive a timed-out or cancelled job. Returns only once
    /// every slot is free again.
    #[instrument(skip(self, ctx, cells, cancel), fields(zoom = zoom, cells = cells.len()))]
    pub async fn dispatch_zoom(
        &self,
        ctx: Arc<RunContext>,
        zoom: u32,
        cells: Vec<TileCell>,
        cancel: &CancellationToken,
    ) -> ZoomReport {
        let mut report = ZoomReport {
            zoom,
            cells: cells.len(),
            ..Default::default()
        };
        let mut jobs = JoinSet::new();
        let mut tiles = HashMap::new();

        for cell in cells {
            if cell.is_sentinel() {
                report.skipped += 1;
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                report.cancelled += 1;
                continue;
            };

            let id = cell.id(zoom);
            let exporter = Arc::clone(&self.exporter);
            let persister = Arc::clone(&self.persister);
            let ctx = Arc::clone(&ctx);
            let cancel = cancel.clone();
            let job_timeout = self.job_timeout;

            let handle = jobs.spawn(async move {
                let job = run_job(&exporter, &persister, &ctx, cell, zoom, permit);
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(TileError::Cancelled),
                    result = tokio::time::timeout(job_timeout, job) => {
                        result.unwrap_or(Err(TileError::Timeout { tile: id }))
                    }
                };
                (id, outcome)
            });
            tiles.insert(handle.id(), id);
        }

        while let Some(joined) = jobs.join_next_with_id().await {
            match joined {
                Ok((_, (id, Ok(Some(doc_id))))) => {
                    debug!(tile = %id, id = %doc_id, "Tile stored");
                    report.inserted += 1;
                }
                Ok((_, (_, Ok(None)))) => report.skipped += 1,
                Ok((_, (_, Err(TileError::Cancelled)))) => report.cancelled += 1,
                Ok((_, (id, Err(e)))) => {
                    warn!(tile = %id, error = %e, "Tile job failed");
                    report.failed += 1;
                    report.failures.push(TileFailure {
                        tile: id,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    report.failed += 1;
                    match tiles.get(&e.id()) {
                        Some(&id) => {
                            error!(tile = %id, error = %e, "Tile job panicked");
                            report.failures.push(TileFailure {
                                tile: id,
                                error: format!("Tile job panicked: {}", e),
                            });
                        }
                        None => error!(error = %e, "Tile job panicked"),
                    }
                }
            }
        }

        // Renders abandoned by timed-out or cancelled jobs still hold slots
        let _ = self.permits.acquire_many(self.max_concurrency as u32).await;

        info!(
            zoom = zoom,
            cells = report.cells,
            skipped = report.skipped,
            inserted = report.inserted,
            failed = report.failed,
            cancelled = report.cancelled,
            "Zoom level complete"
        );

        report
    }
}

/// Render a cell, then persist it. `None` when the cell has no window.
async fn run_job(
    exporter: &TileExporter,
    persister: &TilePersister,
    ctx: &RunContext,
    cell: TileCell,
    zoom: u32,
    slot: OwnedSemaphorePermit,
) -> TileResult<Option<Uuid>> {
    let artifact = exporter
        .render_tile(Arc::clone(&ctx.scan), Arc::clone(&ctx.product), cell, zoom, Some(slot))
        .await?;

    match artifact {
        Some(artifact) => persister
            .persist(artifact, &ctx.product, &ctx.collection, ctx.timestamp)
            .await
            .map(Some),
        None => Ok(None),
    }
}
