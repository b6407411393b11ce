//! The tiling run: resolve the product, then render and store every zoom level.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use radar_common::{collection_name, DecodedScan, TileResult};
use storage::{validate_collection, TileStore};

use crate::catalog::ProductCatalog;
use crate::dispatch::{RunContext, TileDispatcher, ZoomReport};
use crate::grid::enumerate_cells;
use crate::persist::TilePersister;
use crate::render::{PolarTileRenderer, TileExporter, TileRenderer};
use crate::settings::TilingSettings;

/// Summary of one run over all zoom levels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub site: String,
    pub collection: String,
    pub product: String,
    pub timestamp: i64,
    pub zooms: Vec<ZoomReport>,
    /// The run stopped early because its token was cancelled
    pub cancelled: bool,
}

impl RunReport {
    pub fn inserted(&self) -> usize {
        self.zooms.iter().map(|z| z.inserted).sum()
    }

    pub fn failed(&self) -> usize {
        self.zooms.iter().map(|z| z.failed).sum()
    }
}

/// Turns a decoded scan into stored tiles.
pub struct TilePipeline {
    settings: TilingSettings,
    catalog: Arc<ProductCatalog>,
    dispatcher: TileDispatcher,
}

impl TilePipeline {
    pub fn new(
        settings: TilingSettings,
        catalog: Arc<ProductCatalog>,
        renderer: Arc<dyn TileRenderer>,
        store: Arc<dyn TileStore>,
    ) -> TileResult<Self> {
        settings.validate()?;

        let exporter = Arc::new(TileExporter::new(
            renderer,
            settings.scratch_dir.clone(),
            settings.dpi,
        )?);
        let persister = Arc::new(TilePersister::new(store, settings.retry));
        let dispatcher = TileDispatcher::new(
            exporter,
            persister,
            settings.max_concurrency,
            settings.job_timeout(),
        );

        Ok(Self {
            settings,
            catalog,
            dispatcher,
        })
    }

    /// Builtin catalog and the polar renderer.
    pub fn with_store(settings: TilingSettings, store: Arc<dyn TileStore>) -> TileResult<Self> {
        Self::new(
            settings,
            Arc::new(ProductCatalog::builtin()),
            Arc::new(PolarTileRenderer),
            store,
        )
    }

    pub fn settings(&self) -> &TilingSettings {
        &self.settings
    }

    /// Tile the scan at every configured zoom size, one zoom at a time.
    ///
    /// An unknown product or an unusable collection name fails before any
    /// cell is enumerated. Per-tile failures only show up in the report.
    #[instrument(skip(self, scan, cancel), fields(site = %scan.header.site_id, code = scan.header.scan_code))]
    pub async fn run(&self, scan: DecodedScan, cancel: &CancellationToken) -> TileResult<RunReport> {
        let header = &scan.header;
        let product = self
            .catalog
            .resolve(header.scan_code, header.elevation_angle)?
            .clone();

        let collection = collection_name(&self.settings.collection_prefix, &header.site_id);
        validate_collection(&collection)?;

        info!(
            product = %product.display_code,
            title = %product.title,
            collection = %collection,
            zooms = ?self.settings.zoom_sizes,
            "Starting tile run"
        );

        let mut report = RunReport {
            site: header.site_id.clone(),
            collection: collection.clone(),
            product: product.display_code.clone(),
            timestamp: header.volume_start.timestamp(),
            zooms: Vec::with_capacity(self.settings.zoom_sizes.len()),
            cancelled: false,
        };

        let ctx = Arc::new(RunContext {
            timestamp: report.timestamp,
            collection,
            product: Arc::new(product),
            scan: Arc::new(scan),
        });

        for &zoom in &self.settings.zoom_sizes {
            if cancel.is_cancelled() {
                break;
            }
            let xs = self.settings.grid.x_boundaries()?;
            let ys = self.settings.grid.y_boundaries()?;
            let cells = enumerate_cells(&xs, &ys);

            let zoom_report = self
                .dispatcher
                .dispatch_zoom(Arc::clone(&ctx), zoom, cells, cancel)
                .await;
            report.zooms.push(zoom_report);
        }

        report.cancelled = cancel.is_cancelled();
        info!(
            inserted = report.inserted(),
            failed = report.failed(),
            cancelled = report.cancelled,
            "Tile run finished"
        );

        Ok(report)
    }
}
