//! Level III header parsing.
//!
//! A product starts with an optional text header, followed by the 18-byte
//! message header block and the 102-byte product description block. All
//! binary fields are big-endian halfwords; offsets in the description block
//! count halfwords from the start of the message header.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::cursor::Cursor;
use crate::tables;
use crate::Level3Error;

/// Length of the message header block in bytes
pub const MESSAGE_HEADER_LEN: usize = 18;

/// Length of the product description block in bytes
pub const PRODUCT_DESCRIPTION_LEN: usize = 102;

/// Lowest and highest product codes defined for Level III.
const PRODUCT_CODE_RANGE: std::ops::RangeInclusive<i16> = 16..=299;

/// WMO abbreviated heading plus AWIPS identifier line.
///
/// e.g. `SDUS54 KFWD 011152` / `N0QFWS`
#[derive(Debug, Clone, PartialEq)]
pub struct TextHeader {
    pub wmo_heading: String,
    pub awips_id: String,
}

impl TextHeader {
    /// Three-letter site from the AWIPS id (`N0QFWS` → `FWS`).
    pub fn site_id(&self) -> Option<&str> {
        self.awips_id.get(3..6).filter(|s| s.len() == 3)
    }
}

/// Message header block (halfwords 1-9).
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    /// Product code
    pub code: i16,
    /// Message date, days since 1969-12-31
    pub date: u16,
    /// Message time, seconds after midnight UTC
    pub time: u32,
    /// Total message length in bytes
    pub length: u32,
    pub source_id: i16,
    pub destination_id: i16,
    pub num_blocks: i16,
}

/// Product description block (halfwords 10-60).
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDescription {
    /// Radar latitude, thousandths of a degree
    pub latitude_milli: i32,
    /// Radar longitude, thousandths of a degree
    pub longitude_milli: i32,
    /// Radar height above sea level, feet
    pub height_ft: i16,
    pub product_code: i16,
    pub operational_mode: i16,
    pub vcp: i16,
    pub sequence_number: i16,
    pub volume_scan_number: i16,
    pub volume_scan_date: u16,
    pub volume_scan_time: u32,
    pub generation_date: u16,
    pub generation_time: u32,
    /// Product dependent halfwords 27, 28, 30, 47-53 (p1..p10)
    pub dependent: [u16; 10],
    pub elevation_number: i16,
    /// Data level thresholds, halfwords 31-46
    pub thresholds: [u16; 16],
    pub version: u8,
    pub spot_blank: u8,
    /// Halfword offsets from the start of the message
    pub symbology_offset: u32,
    pub graphic_offset: u32,
    pub tabular_offset: u32,
}

impl ProductDescription {
    /// Elevation angle in degrees (p3, tenths of a degree).
    pub fn elevation_angle(&self) -> f64 {
        self.dependent[2] as i16 as f64 / 10.0
    }

    pub fn latitude(&self) -> f64 {
        self.latitude_milli as f64 / 1000.0
    }

    pub fn longitude(&self) -> f64 {
        self.longitude_milli as f64 / 1000.0
    }

    /// Whether the symbology is bzip2-compressed (p8 == 1).
    pub fn is_compressed(&self) -> bool {
        tables::is_compressible(self.product_code) && self.dependent[7] == 1
    }

    /// Size of the decompressed payload (p9, p10).
    pub fn uncompressed_size(&self) -> u32 {
        ((self.dependent[8] as u32) << 16) | self.dependent[9] as u32
    }
}

/// Strip an optional text header, returning it and the message start offset.
///
/// Handles the NOAAPort framing (`\x01\r\r\n` plus a sequence line) and the
/// two-line WMO/AWIPS header. Files without text start at offset 0.
pub fn parse_text_header(data: &[u8]) -> (Option<TextHeader>, usize) {
    let mut pos = 0;

    if data.starts_with(b"\x01\r\r\n") {
        pos += 4;
        // sequence number line, e.g. "123 \r\r\n"
        if let Some(end) = find_line_end(data, pos) {
            if data[pos..end].iter().all(|b| b.is_ascii_digit() || *b == b' ') {
                pos = end + 3;
            }
        }
    }

    if !data.get(pos).map_or(false, |b| b.is_ascii_uppercase()) {
        return (None, pos);
    }

    let Some(wmo_end) = find_line_end(data, pos) else {
        return (None, pos);
    };
    let awips_start = wmo_end + 3;
    let Some(awips_end) = find_line_end(data, awips_start) else {
        return (None, pos);
    };

    let header = TextHeader {
        wmo_heading: String::from_utf8_lossy(&data[pos..wmo_end]).trim().to_string(),
        awips_id: String::from_utf8_lossy(&data[awips_start..awips_end])
            .trim()
            .to_string(),
    };

    (Some(header), awips_end + 3)
}

/// Index of the next `\r\r\n` at or after `from`, within the first line-ish span.
fn find_line_end(data: &[u8], from: usize) -> Option<usize> {
    const MAX_LINE: usize = 64;
    let end = (from + MAX_LINE).min(data.len());
    data.get(from..end)?
        .windows(3)
        .position(|w| w == b"\r\r\n")
        .map(|i| from + i)
}

/// Parse the message header block at the start of `message`.
pub fn parse_message_header(message: &[u8]) -> Result<MessageHeader, Level3Error> {
    let mut cursor = Cursor::new(message, 0);

    let header = MessageHeader {
        code: cursor.i16()?,
        date: cursor.u16()?,
        time: cursor.u32()?,
        length: cursor.u32()?,
        source_id: cursor.i16()?,
        destination_id: cursor.i16()?,
        num_blocks: cursor.i16()?,
    };

    if !PRODUCT_CODE_RANGE.contains(&header.code) {
        return Err(Level3Error::InvalidFormat(format!(
            "Product code {} outside valid range",
            header.code
        )));
    }

    Ok(header)
}

/// Parse the product description block following the message header.
pub fn parse_product_description(message: &[u8]) -> Result<ProductDescription, Level3Error> {
    let mut cursor = Cursor::new(message, MESSAGE_HEADER_LEN);

    let divider = cursor.i16()?;
    if divider != -1 {
        return Err(Level3Error::InvalidFormat(format!(
            "Expected block divider -1, found {}",
            divider
        )));
    }

    let latitude_milli = cursor.i32()?;
    let longitude_milli = cursor.i32()?;
    let height_ft = cursor.i16()?;
    let product_code = cursor.i16()?;
    let operational_mode = cursor.i16()?;
    let vcp = cursor.i16()?;
    let sequence_number = cursor.i16()?;
    let volume_scan_number = cursor.i16()?;
    let volume_scan_date = cursor.u16()?;
    let volume_scan_time = cursor.u32()?;
    let generation_date = cursor.u16()?;
    let generation_time = cursor.u32()?;

    let mut dependent = [0u16; 10];
    dependent[0] = cursor.u16()?;
    dependent[1] = cursor.u16()?;
    let elevation_number = cursor.i16()?;
    dependent[2] = cursor.u16()?;

    let mut thresholds = [0u16; 16];
    for threshold in thresholds.iter_mut() {
        *threshold = cursor.u16()?;
    }

    for slot in dependent.iter_mut().skip(3) {
        *slot = cursor.u16()?;
    }

    let version = cursor.u8()?;
    let spot_blank = cursor.u8()?;
    let symbology_offset = cursor.u32()?;
    let graphic_offset = cursor.u32()?;
    let tabular_offset = cursor.u32()?;

    debug_assert_eq!(
        cursor.position(),
        MESSAGE_HEADER_LEN + PRODUCT_DESCRIPTION_LEN
    );

    Ok(ProductDescription {
        latitude_milli,
        longitude_milli,
        height_ft,
        product_code,
        operational_mode,
        vcp,
        sequence_number,
        volume_scan_number,
        volume_scan_date,
        volume_scan_time,
        generation_date,
        generation_time,
        dependent,
        elevation_number,
        thresholds,
        version,
        spot_blank,
        symbology_offset,
        graphic_offset,
        tabular_offset,
    })
}

/// Convert a Level III (modified Julian date, seconds) pair to UTC.
///
/// Day 1 is 1970-01-01.
pub fn julian_to_datetime(date: u16, seconds: u32) -> Result<DateTime<Utc>, Level3Error> {
    if date == 0 || seconds >= 86_400 {
        return Err(Level3Error::InvalidFormat(format!(
            "Invalid volume time: day {} second {}",
            date, seconds
        )));
    }

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Level3Error::InvalidFormat("Invalid epoch".to_string()))?;

    let naive = epoch
        + Duration::days(date as i64 - 1)
        + Duration::seconds(seconds as i64);

    Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}
