//! Symbology block and radial packet parsing.

use tracing::debug;

use crate::cursor::Cursor;
use crate::Level3Error;

/// Digital radial data array packet
pub const DIGITAL_RADIAL: u16 = 16;

/// Run-length encoded radial packet
pub const RLE_RADIAL: u16 = 0xAF1F;

/// One radial of raw data levels.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRadial {
    /// Start azimuth in degrees
    pub start_angle: f32,
    /// Angular width in degrees
    pub angle_delta: f32,
    pub levels: Vec<u8>,
}

/// A radial image packet (either encoding).
#[derive(Debug, Clone, PartialEq)]
pub struct RadialPacket {
    pub packet_code: u16,
    /// Index of the first range bin
    pub first_bin: i16,
    pub num_bins: i16,
    pub i_center: i16,
    pub j_center: i16,
    /// Range scale factor, thousandths
    pub range_scale: i16,
    pub radials: Vec<RawRadial>,
}

/// Parse the symbology block at `offset` and return its first radial packet.
pub fn parse_symbology(body: &[u8], offset: usize) -> Result<RadialPacket, Level3Error> {
    let mut cursor = Cursor::new(body, offset);

    let divider = cursor.i16()?;
    let block_id = cursor.i16()?;
    if divider != -1 || block_id != 1 {
        return Err(Level3Error::InvalidFormat(format!(
            "Bad symbology block header (divider {}, id {})",
            divider, block_id
        )));
    }
    let _block_length = cursor.u32()?;
    let num_layers = cursor.i16()?;

    for layer in 0..num_layers.max(0) {
        let layer_divider = cursor.i16()?;
        if layer_divider != -1 {
            return Err(Level3Error::InvalidFormat(format!(
                "Bad layer divider {} in layer {}",
                layer_divider, layer
            )));
        }
        let layer_length = cursor.u32()? as usize;
        let layer_end = cursor.position() + layer_length;

        while cursor.position() + 2 <= layer_end {
            let code = cursor.u16()?;
            match code {
                DIGITAL_RADIAL => return parse_radial_packet(&mut cursor, code, read_digital_radial),
                RLE_RADIAL => return parse_radial_packet(&mut cursor, code, read_rle_radial),
                other => {
                    // Only radial images are tiled; anything else ends this layer.
                    debug!(packet = other, layer = layer, "Skipping non-radial packet");
                    break;
                }
            }
        }

        cursor.seek(layer_end);
    }

    Err(Level3Error::NoRadialData)
}

type RadialReader = fn(&mut Cursor<'_>, usize) -> Result<RawRadial, Level3Error>;

fn parse_radial_packet(
    cursor: &mut Cursor<'_>,
    packet_code: u16,
    read_radial: RadialReader,
) -> Result<RadialPacket, Level3Error> {
    let first_bin = cursor.i16()?;
    let num_bins = cursor.i16()?;
    let i_center = cursor.i16()?;
    let j_center = cursor.i16()?;
    let range_scale = cursor.i16()?;
    let num_radials = cursor.i16()?;

    if num_bins <= 0 || num_radials <= 0 {
        return Err(Level3Error::NoRadialData);
    }

    let radials = (0..num_radials)
        .map(|_| read_radial(cursor, num_bins as usize))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RadialPacket {
        packet_code,
        first_bin,
        num_bins,
        i_center,
        j_center,
        range_scale,
        radials,
    })
}

/// Digital radial: byte count, angles, then one byte per bin (padded to a halfword).
fn read_digital_radial(cursor: &mut Cursor<'_>, num_bins: usize) -> Result<RawRadial, Level3Error> {
    let num_bytes = cursor.i16()?.max(0) as usize;
    let start_angle = cursor.i16()? as f32 / 10.0;
    let angle_delta = cursor.i16()? as f32 / 10.0;
    let data = cursor.take(num_bytes)?;
    if num_bytes % 2 == 1 {
        cursor.skip(1)?;
    }

    let mut levels = data.to_vec();
    levels.resize(num_bins, 0);

    Ok(RawRadial {
        start_angle,
        angle_delta,
        levels,
    })
}

/// RLE radial: halfword count, angles, then (run << 4 | level) bytes.
fn read_rle_radial(cursor: &mut Cursor<'_>, num_bins: usize) -> Result<RawRadial, Level3Error> {
    let num_halfwords = cursor.i16()?.max(0) as usize;
    let start_angle = cursor.i16()? as f32 / 10.0;
    let angle_delta = cursor.i16()? as f32 / 10.0;
    let data = cursor.take(num_halfwords * 2)?;

    let mut levels = Vec::with_capacity(num_bins);
    for &byte in data {
        let run = (byte >> 4) as usize;
        let level = byte & 0x0F;
        levels.extend(std::iter::repeat(level).take(run));
    }
    levels.resize(num_bins, 0);

    Ok(RawRadial {
        start_angle,
        angle_delta,
        levels,
    })
}
