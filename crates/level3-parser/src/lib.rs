//! NEXRAD Level III product decoder.
//!
//! Decodes the products used for tiling (base reflectivity, velocity,
//! spectrum width and their digital successors) into a [`PolarScan`]:
//!
//! - optional WMO/AWIPS text header (carries the site identifier)
//! - message header block and product description block
//! - bzip2-compressed symbology for the digital products
//! - radial packets: digital (16) and run-length encoded (0xAF1F)

mod cursor;
pub mod packets;
pub mod sections;
pub mod tables;

use chrono::{DateTime, Utc};
use radar_common::{DecodedScan, PolarScan, Radial, ScanHeader, TileError};
use std::io::Read;
use thiserror::Error;
use tracing::debug;

use packets::RadialPacket;
use sections::{MessageHeader, ProductDescription, TextHeader};
use tables::DataMapper;

/// Errors from decoding a Level III file.
#[derive(Debug, Error)]
pub enum Level3Error {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Truncated data: needed {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Unsupported packet code: 0x{0:04X}")]
    UnsupportedPacket(u16),

    #[error("No radial data in product")]
    NoRadialData,

    #[error("Site identifier not present in file")]
    MissingSite,
}

impl From<Level3Error> for TileError {
    fn from(err: Level3Error) -> Self {
        TileError::Decode(err.to_string())
    }
}

/// A parsed Level III product.
#[derive(Debug, Clone)]
pub struct Level3File {
    pub text_header: Option<TextHeader>,
    pub message_header: MessageHeader,
    pub description: ProductDescription,
    pub radials: RadialPacket,
}

impl Level3File {
    /// Parse a complete Level III file.
    pub fn parse(data: &[u8]) -> Result<Self, Level3Error> {
        let (text_header, start) = sections::parse_text_header(data);
        let message = &data[start..];

        let message_header = sections::parse_message_header(message)?;
        let description = sections::parse_product_description(message)?;

        debug!(
            code = message_header.code,
            elevation = description.elevation_angle(),
            compressed = description.is_compressed(),
            "Parsed Level III headers"
        );

        // Offsets in the description block are relative to the start of the
        // message. For compressed products everything after the description
        // block is replaced by its decompressed form before seeking.
        let buffer: Vec<u8>;
        let body: &[u8] = if description.is_compressed() {
            buffer = decompress_body(message, description.uncompressed_size())?;
            &buffer
        } else {
            message
        };

        let symbology_offset = description.symbology_offset as usize * 2;
        if symbology_offset == 0 {
            return Err(Level3Error::NoRadialData);
        }
        let radials = packets::parse_symbology(body, symbology_offset)?;

        Ok(Self {
            text_header,
            message_header,
            description,
            radials,
        })
    }

    /// Site identifier from the AWIPS header line.
    pub fn site_id(&self) -> Option<&str> {
        self.text_header.as_ref().and_then(|h| h.site_id())
    }

    /// Volume scan start time from the description block.
    pub fn volume_start(&self) -> Result<DateTime<Utc>, Level3Error> {
        sections::julian_to_datetime(
            self.description.volume_scan_date,
            self.description.volume_scan_time,
        )
    }

    /// Convert the radial packet into physical values.
    pub fn polar_scan(&self) -> PolarScan {
        let code = self.description.product_code;
        let mapper = DataMapper::for_product(code, &self.description.thresholds);
        let gate_km = tables::gate_spacing_km(code).unwrap_or_else(|| {
            let scale = self.radials.range_scale as f32 * 0.001;
            if scale > 0.0 {
                scale
            } else {
                1.0
            }
        });
        let first_gate_km = self.radials.first_bin as f32 * gate_km;

        let radials = self
            .radials
            .radials
            .iter()
            .map(|raw| Radial {
                start_azimuth: raw.start_angle,
                width: raw.angle_delta,
                values: raw.levels.iter().map(|&level| mapper.map(level)).collect(),
            })
            .collect();

        PolarScan::new(radials, first_gate_km, gate_km)
    }

    /// Build the decoded scan the tiling pipeline consumes.
    ///
    /// `site_override` takes precedence over the site found in the text
    /// header; one of the two must be present.
    pub fn into_decoded_scan(self, site_override: Option<&str>) -> Result<DecodedScan, Level3Error> {
        let site_id = site_override
            .or_else(|| self.site_id())
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or(Level3Error::MissingSite)?;

        let header = ScanHeader {
            site_id,
            scan_code: self.message_header.code,
            elevation_angle: self.description.elevation_angle(),
            volume_start: self.volume_start()?,
            latitude: self.description.latitude(),
            longitude: self.description.longitude(),
        };

        Ok(DecodedScan {
            header,
            scan: self.polar_scan(),
        })
    }
}

/// Decode a Level III file straight into a [`DecodedScan`].
pub fn decode(data: &[u8], site_override: Option<&str>) -> Result<DecodedScan, Level3Error> {
    Level3File::parse(data)?.into_decoded_scan(site_override)
}

/// Rebuild the message with its bzip2 payload expanded in place.
fn decompress_body(message: &[u8], expected: u32) -> Result<Vec<u8>, Level3Error> {
    let head_len = sections::MESSAGE_HEADER_LEN + sections::PRODUCT_DESCRIPTION_LEN;
    let compressed = &message[head_len..];

    let mut decoder = bzip2::read::BzDecoder::new(compressed);
    let mut decompressed = Vec::with_capacity(expected as usize);
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Level3Error::Decompression(e.to_string()))?;

    if expected != 0 && decompressed.len() != expected as usize {
        debug!(
            expected = expected,
            actual = decompressed.len(),
            "Decompressed size differs from header"
        );
    }

    let mut body = Vec::with_capacity(head_len + decompressed.len());
    body.extend_from_slice(&message[..head_len]);
    body.extend_from_slice(&decompressed);
    Ok(body)
}
