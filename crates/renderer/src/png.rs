//! PNG encoding for RGBA tile data.
//!
//! Radar tiles are painted from discrete color tables, so nearly every tile
//! fits in a 256-entry palette:
//! - **Indexed PNG (color type 3)** with a tRNS chunk when ≤256 colors
//! - **RGBA PNG (color type 6)** otherwise
//!
//! Use [`create_png_auto`] to pick automatically.

use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io::Write;

use crate::RenderError;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

/// Below this many pixels palette extraction runs on one thread
const PARALLEL_THRESHOLD: usize = 4096;

/// RGBA palette entries plus one index byte per pixel.
type Palette = (Vec<[u8; 4]>, Vec<u8>);

/// Encode RGBA pixels, choosing indexed or truecolor output.
pub fn create_png_auto(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, RenderError> {
    check_dimensions(pixels, width, height)?;

    let palette = if width * height >= PARALLEL_THRESHOLD {
        extract_palette_parallel(pixels, width)
    } else {
        extract_palette(pixels)
    };

    match palette {
        Some((colors, indices)) => create_png_indexed(width, height, &colors, &indices),
        None => create_png(pixels, width, height),
    }
}

#[inline(always)]
fn pack(pixel: &[u8]) -> u32 {
    u32::from_le_bytes([pixel[0], pixel[1], pixel[2], pixel[3]])
}

/// Single-threaded palette extraction. `None` when there are too many colors.
fn extract_palette(pixels: &[u8]) -> Option<Palette> {
    let mut lookup: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut colors: Vec<[u8; 4]> = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices = Vec::with_capacity(pixels.len() / 4);

    for pixel in pixels.chunks_exact(4) {
        let key = pack(pixel);
        let index = match lookup.get(&key) {
            Some(&index) => index,
            None => {
                if colors.len() == MAX_PALETTE_SIZE {
                    return None;
                }
                let index = colors.len() as u8;
                colors.push([pixel[0], pixel[1], pixel[2], pixel[3]]);
                lookup.insert(key, index);
                index
            }
        };
        indices.push(index);
    }

    Some((colors, indices))
}

/// Row-parallel palette extraction for large tiles.
///
/// Each row band collects its distinct colors, the bands are merged into a
/// single palette, then pixels are mapped to indices in parallel.
fn extract_palette_parallel(pixels: &[u8], width: usize) -> Option<Palette> {
    let band_rows = (pixels.len() / (width * 4) / rayon::current_num_threads()).max(1);
    let band_bytes = band_rows * width * 4;

    // First-seen order per band: the merged palette matches extract_palette
    let band_colors: Vec<Vec<u32>> = pixels
        .par_chunks(band_bytes)
        .map(|band| {
            let mut seen: HashSet<u32> = HashSet::with_capacity(64);
            let mut ordered = Vec::new();
            for pixel in band.chunks_exact(4) {
                let key = pack(pixel);
                if seen.insert(key) {
                    ordered.push(key);
                    if ordered.len() > MAX_PALETTE_SIZE {
                        break;
                    }
                }
            }
            ordered
        })
        .collect();

    let mut lookup: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut colors: Vec<[u8; 4]> = Vec::with_capacity(MAX_PALETTE_SIZE);
    for key in band_colors.into_iter().flatten() {
        if lookup.contains_key(&key) {
            continue;
        }
        if colors.len() == MAX_PALETTE_SIZE {
            return None;
        }
        lookup.insert(key, colors.len() as u8);
        colors.push(key.to_le_bytes());
    }

    let indices: Vec<u8> = pixels
        .par_chunks_exact(4)
        .map(|pixel| lookup.get(&pack(pixel)).copied().unwrap_or(0))
        .collect();

    Some((colors, indices))
}

/// Encode an indexed PNG (color type 3) from a palette and per-pixel indices.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[[u8; 4]],
    indices: &[u8],
) -> Result<Vec<u8>, RenderError> {
    if palette.is_empty() || palette.len() > MAX_PALETTE_SIZE || indices.len() != width * height {
        return Err(RenderError::Encode(format!(
            "palette of {} colors with {} indices for {}x{}",
            palette.len(),
            indices.len(),
            width,
            height
        )));
    }

    let mut png = Vec::with_capacity(indices.len() / 4 + palette.len() * 4 + 64);
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 3));

    let plte: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    // Alpha per palette entry; transparent outside the radar disk
    if palette.iter().any(|c| c[3] < 255) {
        let trns: Vec<u8> = palette.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = deflate_scanlines(indices, width, height)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Encode a truecolor PNG with alpha (color type 6).
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, RenderError> {
    check_dimensions(pixels, width, height)?;

    let mut png = Vec::with_capacity(pixels.len() / 2 + 64);
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 6));

    let idat = deflate_scanlines(pixels, width * 4, height)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

fn check_dimensions(pixels: &[u8], width: usize, height: usize) -> Result<(), RenderError> {
    if width == 0 || height == 0 || pixels.len() != width * height * 4 {
        return Err(RenderError::InvalidSize { width, height });
    }
    Ok(())
}

fn ihdr(width: usize, height: usize, color_type: u8) -> [u8; 13] {
    let mut data = [0u8; 13];
    data[0..4].copy_from_slice(&(width as u32).to_be_bytes());
    data[4..8].copy_from_slice(&(height as u32).to_be_bytes());
    data[8] = 8; // bit depth
    data[9] = color_type;
    // compression, filter and interlace methods all 0
    data
}

/// Length, type, data, CRC over type and data.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Zlib-compress rows of `row_bytes`, each prefixed with filter type 0.
fn deflate_scanlines(data: &[u8], row_bytes: usize, height: usize) -> Result<Vec<u8>, RenderError> {
    let mut raw = Vec::with_capacity(height * (row_bytes + 1));
    for row in data.chunks_exact(row_bytes).take(height) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder
        .write_all(&raw)
        .and_then(|_| encoder.finish())
        .map_err(|e| RenderError::Encode(format!("IDAT compression failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_palette_reuses_indices() {
        let pixels = [
            255, 0, 0, 255, // red
            0, 255, 0, 255, // green
            0, 0, 0, 0, // transparent
            255, 0, 0, 255, // red again
        ];
        let (colors, indices) = extract_palette(&pixels).unwrap();
        assert_eq!(colors.len(), 3);
        assert_eq!(indices, vec![0, 1, 2, 0]);
        assert_eq!(colors[2], [0, 0, 0, 0]);
    }

    #[test]
    fn test_extract_palette_too_many_colors() {
        let pixels: Vec<u8> = (0..300u32).flat_map(|i| [i as u8, (i >> 8) as u8, 7, 255]).collect();
        assert!(extract_palette(&pixels).is_none());
        assert!(extract_palette_parallel(&pixels, 30).is_none());
    }

    #[test]
    fn test_parallel_matches_sequential_palette() {
        let width = 128;
        let pixels: Vec<u8> = (0..width * width)
            .flat_map(|i| {
                let band = ((i % width) / 8) as u8;
                [band * 10, 100, 200 - band, 255]
            })
            .collect();

        let sequential = extract_palette(&pixels).unwrap();
        let parallel = extract_palette_parallel(&pixels, width).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_chunk_crc() {
        let mut png = Vec::new();
        write_chunk(&mut png, b"IEND", &[]);
        assert_eq!(png, vec![0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82]);
    }

    #[test]
    fn test_rejects_mismatched_buffer() {
        assert!(matches!(
            create_png(&[0u8; 12], 2, 2),
            Err(RenderError::InvalidSize { width: 2, height: 2 })
        ));
        assert!(create_png_auto(&[], 0, 0).is_err());
    }
}
