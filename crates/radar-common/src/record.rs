//! Persisted tile documents.

use serde::{Deserialize, Serialize};

use crate::product::ProductDescriptor;
use crate::tile::TileId;

/// Document written once per rendered tile.
///
/// Field names match the stored documents so a mosaic client can query
/// by `product`, `zoom`, `timestamp` and reassemble by `tileName`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    /// Product display code (e.g. "N0Q")
    pub product: String,
    /// Zoom size the tile was rendered at
    pub zoom: u32,
    /// Volume scan start time, seconds since the Unix epoch
    pub timestamp: i64,
    /// Encoded PNG bytes
    pub tile: Vec<u8>,
    /// `<row>_<col>`
    #[serde(rename = "tileName")]
    pub tile_name: String,
    /// Scan (product) code
    pub code: i16,
    /// Elevation angle, one decimal place
    pub angle: f64,
}

impl TileRecord {
    /// Build the document for a rendered tile.
    pub fn new(descriptor: &ProductDescriptor, id: TileId, timestamp: i64, tile: Vec<u8>) -> Self {
        Self {
            product: descriptor.display_code.clone(),
            zoom: id.zoom,
            timestamp,
            tile,
            tile_name: id.tile_name(),
            code: descriptor.scan_code,
            angle: descriptor.elevation_angle,
        }
    }

    /// Same record with the image payload stripped, for comparisons and logs.
    pub fn key_fields(&self) -> (String, u32, i64, String, i16, i64) {
        (
            self.product.clone(),
            self.zoom,
            self.timestamp,
            self.tile_name.clone(),
            self.code,
            (self.angle * 10.0).round() as i64,
        )
    }
}

/// Collection holding a site's tiles: `prefix + site_id` (e.g. "K" + "ABC").
pub fn collection_name(prefix: &str, site_id: &str) -> String {
    format!("{}{}", prefix, site_id.trim())
}
