//! Tiling settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use radar_common::{TileError, TileResult};

use crate::grid::GridSpec;
use crate::persist::RetryPolicy;

/// Largest canvas edge accepted, in pixels.
const MAX_CANVAS_PX: u64 = 16_384;

/// Everything that shapes a tiling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingSettings {
    /// Canvas sizes (inches), processed in order
    pub zoom_sizes: Vec<u32>,
    /// Pixels per inch of canvas
    pub dpi: u32,
    #[serde(flatten)]
    pub grid: GridSpec,
    /// Collection name is this prefix plus the site id
    pub collection_prefix: String,
    /// Jobs running at once
    pub max_concurrency: usize,
    pub job_timeout_secs: u64,
    pub retry: RetryPolicy,
    /// Where scratch PNGs are written; system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
}

impl Default for TilingSettings {
    fn default() -> Self {
        Self {
            zoom_sizes: vec![2, 5, 10, 20],
            dpi: 100,
            grid: GridSpec::default(),
            collection_prefix: "K".to_string(),
            max_concurrency: num_cpus::get(),
            job_timeout_secs: 120,
            retry: RetryPolicy::default(),
            scratch_dir: None,
        }
    }
}

impl TilingSettings {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Reject settings that could not produce a run.
    pub fn validate(&self) -> TileResult<()> {
        if self.zoom_sizes.is_empty() {
            return Err(TileError::Config("zoom_sizes must not be empty".to_string()));
        }
        if self.dpi == 0 {
            return Err(TileError::Config("dpi must be positive".to_string()));
        }
        for &zoom in &self.zoom_sizes {
            let px = zoom as u64 * self.dpi as u64;
            if zoom == 0 || px > MAX_CANVAS_PX {
                return Err(TileError::Config(format!(
                    "Zoom size {} at {} dpi gives a {} px canvas",
                    zoom, self.dpi, px
                )));
            }
        }
        if self.max_concurrency == 0 {
            return Err(TileError::Config("max_concurrency must be at least 1".to_string()));
        }
        if self.job_timeout_secs == 0 {
            return Err(TileError::Config("job_timeout_secs must be positive".to_string()));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(TileError::Config(
                "retry.initial_delay_ms exceeds retry.max_delay_ms".to_string(),
            ));
        }
        self.grid.x_boundaries()?;
        self.grid.y_boundaries()?;
        Ok(())
    }
}
