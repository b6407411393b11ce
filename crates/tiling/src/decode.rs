//! Scan decoding seam.

use std::path::Path;

use radar_common::{DecodedScan, TileError, TileResult};
use tracing::info;

/// Turns raw radar file bytes into a decoded scan.
pub trait ScanDecoder: Send + Sync {
    /// `site_override` replaces the site identifier found in the file.
    fn decode(&self, data: &[u8], site_override: Option<&str>) -> TileResult<DecodedScan>;
}

/// NEXRAD Level III decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Level3Decoder;

impl ScanDecoder for Level3Decoder {
    fn decode(&self, data: &[u8], site_override: Option<&str>) -> TileResult<DecodedScan> {
        Ok(level3_parser::decode(data, site_override)?)
    }
}

/// Read and decode a file. Every failure here is fatal for the run.
pub async fn decode_file(
    decoder: &dyn ScanDecoder,
    path: &Path,
    site_override: Option<&str>,
) -> TileResult<DecodedScan> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| TileError::Decode(format!("Cannot read {}: {}", path.display(), e)))?;

    let scan = decoder.decode(&data, site_override)?;

    info!(
        path = %path.display(),
        site = %scan.header.site_id,
        code = scan.header.scan_code,
        elevation = scan.header.elevation_angle,
        volume_start = %scan.header.volume_start,
        radials = scan.scan.radials().len(),
        "Decoded radar file"
    );

    Ok(scan)
}
