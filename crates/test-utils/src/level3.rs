//! Builder for synthetic NEXRAD Level III files.
//!
//! Produces byte-exact products (text header, message header, product
//! description block, one radial packet) so the decoder and the tiling
//! pipeline can be tested without real radar samples.

use std::io::Write;

use bzip2::write::BzEncoder;
use bzip2::Compression;

use crate::fixtures::{sites, times};

const MESSAGE_HEADER_LEN: usize = 18;
const PRODUCT_DESCRIPTION_LEN: usize = 102;

/// Radial packet encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadialEncoding {
    /// Packet 16, one byte per bin
    Digital,
    /// Packet 0xAF1F, 4-bit run-length encoded
    RunLength,
}

#[derive(Debug, Clone)]
struct SyntheticRadial {
    start_angle: f32,
    width: f32,
    levels: Vec<u8>,
}

/// Fluent builder for a single-layer radial Level III product.
///
/// ```
/// use test_utils::Level3Builder;
///
/// let bytes = Level3Builder::n0q().uniform_levels(100, 230).build();
/// assert!(bytes.starts_with(b"SDUS54 KFWD"));
/// ```
#[derive(Debug, Clone)]
pub struct Level3Builder {
    product_code: i16,
    elevation_tenths: i16,
    site: Option<String>,
    awips_product: String,
    volume_day: u16,
    volume_seconds: u32,
    latitude: f64,
    longitude: f64,
    thresholds: [u16; 16],
    encoding: RadialEncoding,
    compressed: bool,
    first_bin: i16,
    range_scale: i16,
    radials: Vec<SyntheticRadial>,
}

impl Level3Builder {
    pub fn new(product_code: i16) -> Self {
        Self {
            product_code,
            elevation_tenths: 5,
            site: Some(sites::FWS.to_string()),
            awips_product: awips_product_for(product_code).to_string(),
            volume_day: times::JAN_15_2024_DAY,
            volume_seconds: times::HALF_PAST_NOON,
            latitude: sites::FWS_LATITUDE,
            longitude: sites::FWS_LONGITUDE,
            thresholds: [0; 16],
            encoding: RadialEncoding::Digital,
            compressed: false,
            first_bin: 0,
            range_scale: 1000,
            radials: Vec::new(),
        }
    }

    /// Digital base reflectivity: -32 dBZ minimum, 0.5 dBZ steps, 256 levels.
    ///
    /// Level `n` maps to `-32 + (n - 2) * 0.5` dBZ.
    pub fn n0q() -> Self {
        Self::new(94).thresholds(&[(-320i16) as u16, 5, 256])
    }

    /// Digital base velocity: -63.5 m/s minimum, 0.5 m/s steps.
    pub fn n0u() -> Self {
        Self::new(99).thresholds(&[(-635i16) as u16, 5, 254])
    }

    /// Legacy 16-level reflectivity: level `n` maps to `5 * n` dBZ, level 0 no data.
    pub fn n0r() -> Self {
        let mut thresholds = [0u16; 16];
        thresholds[0] = 0x8000;
        for (level, slot) in thresholds.iter_mut().enumerate().skip(1) {
            *slot = (level * 5) as u16;
        }
        Self::new(19)
            .thresholds(&thresholds)
            .encoding(RadialEncoding::RunLength)
    }

    pub fn elevation(mut self, angle: f64) -> Self {
        self.elevation_tenths = (angle * 10.0).round() as i16;
        self
    }

    /// Site written into the AWIPS line; `None` omits the text header.
    pub fn site(mut self, site: Option<&str>) -> Self {
        self.site = site.map(str::to_string);
        self
    }

    pub fn volume_time(mut self, day: u16, seconds: u32) -> Self {
        self.volume_day = day;
        self.volume_seconds = seconds;
        self
    }

    /// Leading threshold halfwords; the rest stay zero.
    pub fn thresholds(mut self, head: &[u16]) -> Self {
        self.thresholds = [0; 16];
        self.thresholds[..head.len()].copy_from_slice(head);
        self
    }

    pub fn encoding(mut self, encoding: RadialEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// bzip2-compress the symbology block and set the p8 flag.
    pub fn compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    pub fn first_bin(mut self, first_bin: i16) -> Self {
        self.first_bin = first_bin;
        self
    }

    /// Append one radial.
    pub fn radial(mut self, start_angle: f32, width: f32, levels: Vec<u8>) -> Self {
        self.radials.push(SyntheticRadial {
            start_angle,
            width,
            levels,
        });
        self
    }

    /// Replace the radials with 360 one-degree radials of `level` everywhere.
    pub fn uniform_levels(mut self, level: u8, num_bins: usize) -> Self {
        self.radials = (0..360)
            .map(|az| SyntheticRadial {
                start_angle: az as f32,
                width: 1.0,
                levels: vec![level; num_bins],
            })
            .collect();
        self
    }

    /// Serialize the product.
    pub fn build(&self) -> Vec<u8> {
        let symbology = self.symbology_block();

        let (p8, payload) = if self.compressed {
            let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(&symbology)
                .expect("writing to an in-memory encoder");
            let compressed = encoder.finish().expect("finishing an in-memory encoder");
            (1u16, compressed)
        } else {
            (0u16, symbology.clone())
        };

        let total_len = MESSAGE_HEADER_LEN + PRODUCT_DESCRIPTION_LEN + payload.len();
        let uncompressed_len = symbology.len() as u32;

        let mut out = Vec::with_capacity(total_len + 64);
        if let Some(site) = &self.site {
            out.extend_from_slice(format!("SDUS54 K{} 151230\r\r\n", site).as_bytes());
            out.extend_from_slice(format!("{}{}\r\r\n", self.awips_product, site).as_bytes());
        }

        // Message header block
        put_i16(&mut out, self.product_code);
        put_u16(&mut out, self.volume_day);
        put_u32(&mut out, self.volume_seconds);
        put_u32(&mut out, total_len as u32);
        put_i16(&mut out, 1);
        put_i16(&mut out, 0);
        put_i16(&mut out, 3);

        // Product description block
        put_i16(&mut out, -1);
        put_i32(&mut out, (self.latitude * 1000.0).round() as i32);
        put_i32(&mut out, (self.longitude * 1000.0).round() as i32);
        put_i16(&mut out, 650);
        put_i16(&mut out, self.product_code);
        put_i16(&mut out, 2); // precipitation mode
        put_i16(&mut out, 212);
        put_i16(&mut out, 1);
        put_i16(&mut out, 1);
        put_u16(&mut out, self.volume_day);
        put_u32(&mut out, self.volume_seconds);
        put_u16(&mut out, self.volume_day);
        put_u32(&mut out, self.volume_seconds + 60);
        put_u16(&mut out, 0); // p1
        put_u16(&mut out, 0); // p2
        put_i16(&mut out, 1); // elevation number
        put_i16(&mut out, self.elevation_tenths); // p3
        for threshold in self.thresholds {
            put_u16(&mut out, threshold);
        }
        put_u16(&mut out, 0); // p4
        put_u16(&mut out, 0); // p5
        put_u16(&mut out, 0); // p6
        put_u16(&mut out, 0); // p7
        put_u16(&mut out, p8);
        put_u16(&mut out, (uncompressed_len >> 16) as u16); // p9
        put_u16(&mut out, uncompressed_len as u16); // p10
        out.push(1); // version
        out.push(0); // spot blank
        put_u32(&mut out, ((MESSAGE_HEADER_LEN + PRODUCT_DESCRIPTION_LEN) / 2) as u32);
        put_u32(&mut out, 0);
        put_u32(&mut out, 0);

        out.extend_from_slice(&payload);
        out
    }

    fn symbology_block(&self) -> Vec<u8> {
        let packet = self.radial_packet();

        let mut block = Vec::with_capacity(packet.len() + 16);
        put_i16(&mut block, -1);
        put_i16(&mut block, 1);
        put_u32(&mut block, (16 + packet.len()) as u32);
        put_i16(&mut block, 1);
        put_i16(&mut block, -1);
        put_u32(&mut block, packet.len() as u32);
        block.extend_from_slice(&packet);
        block
    }

    fn radial_packet(&self) -> Vec<u8> {
        let num_bins = self.radials.iter().map(|r| r.levels.len()).max().unwrap_or(0);

        let mut packet = Vec::new();
        let code = match self.encoding {
            RadialEncoding::Digital => 16u16,
            RadialEncoding::RunLength => 0xAF1F,
        };
        put_u16(&mut packet, code);
        put_i16(&mut packet, self.first_bin);
        put_i16(&mut packet, num_bins as i16);
        put_i16(&mut packet, 256);
        put_i16(&mut packet, 280);
        put_i16(&mut packet, self.range_scale);
        put_i16(&mut packet, self.radials.len() as i16);

        for radial in &self.radials {
            match self.encoding {
                RadialEncoding::Digital => {
                    put_i16(&mut packet, radial.levels.len() as i16);
                    put_i16(&mut packet, (radial.start_angle * 10.0).round() as i16);
                    put_i16(&mut packet, (radial.width * 10.0).round() as i16);
                    packet.extend_from_slice(&radial.levels);
                    if radial.levels.len() % 2 == 1 {
                        packet.push(0);
                    }
                }
                RadialEncoding::RunLength => {
                    let mut runs = run_length_encode(&radial.levels);
                    if runs.len() % 2 == 1 {
                        runs.push(0);
                    }
                    put_i16(&mut packet, (runs.len() / 2) as i16);
                    put_i16(&mut packet, (radial.start_angle * 10.0).round() as i16);
                    put_i16(&mut packet, (radial.width * 10.0).round() as i16);
                    packet.extend_from_slice(&runs);
                }
            }
        }
        packet
    }
}

/// Encode 4-bit levels as (run << 4 | level) bytes, runs of at most 15.
fn run_length_encode(levels: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut iter = levels.iter().peekable();
    while let Some(&level) = iter.next() {
        let mut run = 1u8;
        while run < 15 && iter.peek() == Some(&&level) {
            iter.next();
            run += 1;
        }
        out.push((run << 4) | (level & 0x0F));
    }
    out
}

fn awips_product_for(code: i16) -> &'static str {
    match code {
        19 => "N0R",
        27 => "N0V",
        30 => "N0W",
        94 => "N0Q",
        99 => "N0U",
        161 => "N0C",
        _ => "NXX",
    }
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_be_bytes());
}
