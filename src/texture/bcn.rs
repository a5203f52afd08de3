//! BC1-BC5 block decompression.
//!
//! Every format packs a 4×4 pixel tile into 8 or 16 bytes, built from two
//! shared pieces:
//!
//! * a **color block** (8 bytes): two RGB565 endpoints and sixteen 2-bit
//!   indices into a four-entry palette derived from them;
//! * a **ramp block** (8 bytes): two 8-bit endpoints and sixteen 3-bit
//!   indices into an eight-entry ramp.
//!
//! ```text
//! BC1  [color]                 RGB (+ 1-bit transparency)
//! BC2  [4-bit alpha × 16][color]
//! BC3  [alpha ramp][color]
//! BC4  [ramp]                  grey
//! BC5  [red ramp][green ramp]  two channels, or a unit normal when SNORM
//! ```
//!
//! Palette and ramp weights differ from the published codec in two places
//! to match previously extracted assets. See [`decode_color_block`] and
//! [`decode_ramp`].

use log::warn;

use super::swizzle::BlockAddressing;
use super::{BcFormat, NumericType, PixelFormat, PixelSurface, blocks_for};
use crate::Result;

/// A decoded 4×4 tile, row-major.
pub type Tile = [[u8; 4]; 16];

/// Palette rule for a color block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// BC1: `c0 <= c1` selects the three-color palette with transparent
    /// black as entry 3.
    Bc1,
    /// BC2 and BC3: always four opaque colors.
    FourColor,
}

/// Expand an RGB565 color to RGBA8.
#[inline]
pub fn rgb565(c: u16) -> [u8; 4] {
    [
        ((c >> 11) << 3) as u8,
        (((c >> 5) & 0x3F) << 2) as u8,
        ((c & 0x1F) << 3) as u8,
        0xFF,
    ]
}

fn two_thirds(a: [u8; 4], b: [u8; 4]) -> [u8; 4] {
    let mix = |x: u8, y: u8| ((2 * x as u32 + y as u32) / 3) as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2]), 0xFF]
}

fn average(a: [u8; 4], b: [u8; 4]) -> [u8; 4] {
    let mix = |x: u8, y: u8| ((x as u32 + y as u32) >> 1) as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2]), 0xFF]
}

/// Decode an 8-byte color block.
///
/// Palette entries 2 and 3 are both `(2·lut0 + lut1) / 3` whenever four
/// colors are used. The published BC1 codec mirrors the weights for entry
/// 3; existing extracted assets were produced with equal weights, so those
/// are kept.
pub fn decode_color_block(block: &[u8], mode: ColorMode) -> Tile {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);

    let lut0 = rgb565(c0);
    let lut1 = rgb565(c1);
    let (lut2, lut3) = match mode {
        ColorMode::Bc1 if c0 <= c1 => (average(lut0, lut1), [0, 0, 0, 0]),
        _ => (two_thirds(lut0, lut1), two_thirds(lut0, lut1)),
    };
    let lut = [lut0, lut1, lut2, lut3];

    let mut tile = [[0u8; 4]; 16];
    for (i, px) in tile.iter_mut().enumerate() {
        *px = lut[((indices >> (2 * i)) & 3) as usize];
    }
    tile
}

/// Build the eight-entry ramp for endpoints `a0`, `a1`.
///
/// Entries 2-5 are `round(((8 - i)·a0 + (i - 1)·a1) / 7)` for both
/// endpoint orders; entries 6 and 7 are 0 and 255. The published codec
/// uses a six-step ramp divided by 5 when `a0 <= a1`.
pub fn decode_ramp(a0: u8, a1: u8) -> [u8; 8] {
    let mut ramp = [a0, a1, 0, 0, 0, 0, 0, 0xFF];
    for (i, v) in ramp.iter_mut().enumerate().take(6).skip(2) {
        let i = i as u32;
        let sum = (8 - i) * a0 as u32 + (i - 1) * a1 as u32;
        *v = ((sum + 3) / 7) as u8;
    }
    ramp
}

/// Decode an 8-byte ramp block into sixteen values.
fn decode_ramp_block(block: &[u8]) -> [u8; 16] {
    let ramp = decode_ramp(block[0], block[1]);
    let mut bits = [0u8; 8];
    bits[..6].copy_from_slice(&block[2..8]);
    let bits = u64::from_le_bytes(bits);

    let mut out = [0u8; 16];
    for (i, v) in out.iter_mut().enumerate() {
        *v = ramp[((bits >> (3 * i)) & 7) as usize];
    }
    out
}

/// Z component of a unit normal with X and Y stored as unsigned bytes,
/// remapped to 0-255.
fn normal_z(r: u8, g: u8) -> u8 {
    let x = r as f32 / 127.5 - 1.0;
    let y = g as f32 / 127.5 - 1.0;
    let z = (1.0 - x * x - y * y).max(0.0).sqrt();
    ((z * 0.5 + 0.5) * 255.0).round() as u8
}

/// Decode one block of `format`. `block` must hold at least
/// [`BcFormat::block_bytes`] bytes.
pub fn decode_block(format: PixelFormat, block: &[u8]) -> Tile {
    match format.bc {
        BcFormat::Bc1 => decode_color_block(block, ColorMode::Bc1),
        BcFormat::Bc2 => {
            let mut tile = decode_color_block(&block[8..16], ColorMode::FourColor);
            let mut alpha = [0u8; 8];
            alpha.copy_from_slice(&block[..8]);
            let alpha = u64::from_le_bytes(alpha);
            for (i, px) in tile.iter_mut().enumerate() {
                let a = ((alpha >> (4 * i)) & 0xF) as u8;
                px[3] = a | (a << 4);
            }
            tile
        }
        BcFormat::Bc3 => {
            let mut tile = decode_color_block(&block[8..16], ColorMode::FourColor);
            let alpha = decode_ramp_block(&block[..8]);
            for (px, a) in tile.iter_mut().zip(alpha) {
                px[3] = a;
            }
            tile
        }
        BcFormat::Bc4 => {
            let grey = decode_ramp_block(&block[..8]);
            grey.map(|v| [v, v, v, 0xFF])
        }
        BcFormat::Bc5 => {
            let red = decode_ramp_block(&block[..8]);
            let green = decode_ramp_block(&block[8..16]);
            let mut tile = [[0u8; 4]; 16];
            for (i, px) in tile.iter_mut().enumerate() {
                let (r, g) = (red[i], green[i]);
                let b = match format.numeric {
                    NumericType::Snorm => normal_z(r, g),
                    _ => 0,
                };
                *px = [r, g, b, 0xFF];
            }
            tile
        }
    }
}

/// Decode a `width` × `height` image from `data`.
///
/// Blocks are visited in raster order and located through `addressing`.
/// If `data` runs out, decoding stops at the first block that is not fully
/// present; the returned surface reports the shortfall through
/// [`PixelSurface::is_complete`] and [`PixelSurface::check_complete`].
///
/// Fails with [`crate::Error::UnsupportedVariant`] when the image is larger
/// than [`super::MAX_SURFACE_BYTES`] allows.
pub fn decode_surface<A: BlockAddressing + ?Sized>(
    data: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    addressing: &A,
) -> Result<PixelSurface> {
    let blocks_x = blocks_for(width);
    let blocks_y = blocks_for(height);
    let block_bytes = format.bc.block_bytes();
    let total = blocks_x as usize * blocks_y as usize;
    let expected = (total * block_bytes) as u64;

    let mut surface = PixelSurface::new(width, height, total, expected, data.len() as u64)?;
    'rows: for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let offset = addressing.block_offset(bx, by);
            let Some(block) = data.get(offset..offset + block_bytes) else {
                warn!(
                    "{format} data truncated at block ({bx}, {by}), offset {offset:#x} of {:#x}",
                    data.len()
                );
                break 'rows;
            };
            surface.put_block(bx, by, &decode_block(format, block));
        }
    }
    Ok(surface)
}
