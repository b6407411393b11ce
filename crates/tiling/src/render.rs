//! Rendering one grid cell to a scratch PNG.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

use radar_common::{CropWindow, DecodedScan, PolarScan, ProductDescriptor, TileCell, TileError, TileId, TileResult};
use renderer::{ColorRamp, RenderError};

/// Paints a crop window of a polar scan as an encoded PNG.
///
/// Implementations are CPU-bound and called from blocking threads.
pub trait TileRenderer: Send + Sync {
    fn render(
        &self,
        scan: &PolarScan,
        product: &ProductDescriptor,
        window: &CropWindow,
        size_px: usize,
    ) -> Result<Vec<u8>, RenderError>;
}

/// Square tiles colored by the product's scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolarTileRenderer;

impl TileRenderer for PolarTileRenderer {
    fn render(
        &self,
        scan: &PolarScan,
        product: &ProductDescriptor,
        window: &CropWindow,
        size_px: usize,
    ) -> Result<Vec<u8>, RenderError> {
        let ramp = ColorRamp::for_product(product.color_scheme, product.quantity);
        renderer::render_window_png(scan, &ramp, window, size_px, size_px)
    }
}

/// A rendered tile waiting to be persisted.
///
/// The scratch file is deleted when the artifact is dropped, so every exit
/// path of a job cleans up; [`TileArtifact::cleanup`] does it explicitly and
/// reports failures. A job's pool slot travels with the artifact and is
/// released together with the file.
#[derive(Debug)]
pub struct TileArtifact {
    id: TileId,
    file: NamedTempFile,
    _slot: Option<OwnedSemaphorePermit>,
}

impl TileArtifact {
    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn read(&self) -> TileResult<Vec<u8>> {
        Ok(tokio::fs::read(self.path()).await?)
    }

    /// Delete the scratch file.
    pub fn cleanup(self) -> TileResult<()> {
        let path = self.path().to_path_buf();
        self.file.close().map_err(|e| {
            TileError::ScratchCleanup(format!("{}: {}", path.display(), e))
        })
    }
}

/// Renders cells into scratch files.
pub struct TileExporter {
    renderer: Arc<dyn TileRenderer>,
    scratch_dir: PathBuf,
    dpi: u32,
}

impl TileExporter {
    /// `scratch_dir` defaults to the system temp directory and is created if missing.
    pub fn new(renderer: Arc<dyn TileRenderer>, scratch_dir: Option<PathBuf>, dpi: u32) -> TileResult<Self> {
        let scratch_dir = scratch_dir.unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&scratch_dir).map_err(|e| {
            TileError::Config(format!("Cannot create scratch dir {}: {}", scratch_dir.display(), e))
        })?;
        Ok(Self {
            renderer,
            scratch_dir,
            dpi,
        })
    }

    /// Canvas edge in pixels for a zoom size.
    pub fn canvas_px(&self, zoom: u32) -> usize {
        zoom as usize * self.dpi as usize
    }

    /// Render a cell at a zoom size. Sentinel cells produce nothing.
    ///
    /// `slot` is held by the blocking render and then by the artifact, so it
    /// is only released once the CPU work has ended, even when the caller
    /// stops waiting.
    pub async fn render_tile(
        &self,
        scan: Arc<DecodedScan>,
        product: Arc<ProductDescriptor>,
        cell: TileCell,
        zoom: u32,
        slot: Option<OwnedSemaphorePermit>,
    ) -> TileResult<Option<TileArtifact>> {
        let Some(window) = cell.window() else {
            return Ok(None);
        };

        let id = cell.id(zoom);
        let size_px = self.canvas_px(zoom);
        let renderer = Arc::clone(&self.renderer);
        let scratch_dir = self.scratch_dir.clone();

        let artifact = tokio::task::spawn_blocking(move || -> TileResult<TileArtifact> {
            let png = renderer
                .render(&scan.scan, &product, &window, size_px)
                .map_err(|e| TileError::Render {
                    tile: id,
                    message: e.to_string(),
                })?;

            let mut file = tempfile::Builder::new()
                .prefix(&format!("tile_{}_{}_{}_", id.zoom, id.row, id.col))
                .suffix(".png")
                .tempfile_in(&scratch_dir)?;
            file.write_all(&png)?;
            file.flush()?;

            Ok(TileArtifact {
                id,
                file,
                _slot: slot,
            })
        })
        .await
        .map_err(|e| TileError::Render {
            tile: id,
            message: format!("Render task failed: {}", e),
        })??;

        debug!(tile = %id, size_px = size_px, path = %artifact.path().display(), "Rendered tile");
        Ok(Some(artifact))
    }
}
