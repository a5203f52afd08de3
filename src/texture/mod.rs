//! GPU texture decoding.
//!
//! Block-compressed (BCn) pixel data is decoded into a [`PixelSurface`] of
//! RGBA8 pixels. Where each compressed block lives in the input buffer is
//! a separate concern, supplied through [`swizzle::BlockAddressing`].
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`bcn`] | BC1-BC5 block math and surface decoding |
//! | [`swizzle`] | Row-major and Tegra X1 block-linear block addressing |
//! | [`tga`] | Uncompressed 32-bit TGA output |
//!
//! ## Format identifiers
//!
//! Texture formats are 32-bit ids as stored in BNTX: the high byte selects
//! the channel layout, the low byte the numeric interpretation.
//!
//! ```text
//! 0x1A01  BC1 UNORM      0x1A06  BC1 SRGB
//! 0x1B01  BC2 UNORM      0x1B06  BC2 SRGB
//! 0x1C01  BC3 UNORM      0x1C06  BC3 SRGB
//! 0x1D01  BC4 UNORM      0x1D02  BC4 SNORM
//! 0x1E01  BC5 UNORM      0x1E02  BC5 SNORM
//! ```

use std::fmt;

use crate::{Error, Result};

pub mod bcn;
pub mod swizzle;
pub mod tga;

/// A BCn block format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BcFormat {
    Bc1,
    Bc2,
    Bc3,
    Bc4,
    Bc5,
}

impl BcFormat {
    /// Bytes per 4×4 block.
    pub fn block_bytes(self) -> usize {
        match self {
            BcFormat::Bc1 | BcFormat::Bc4 => 8,
            BcFormat::Bc2 | BcFormat::Bc3 | BcFormat::Bc5 => 16,
        }
    }
}

/// How channel values are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericType {
    Unorm,
    Snorm,
    Srgb,
    Other(u8),
}

impl From<u8> for NumericType {
    fn from(v: u8) -> Self {
        match v {
            1 => NumericType::Unorm,
            2 => NumericType::Snorm,
            6 => NumericType::Srgb,
            other => NumericType::Other(other),
        }
    }
}

/// A decodable pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormat {
    pub bc: BcFormat,
    pub numeric: NumericType,
}

impl PixelFormat {
    /// Parse a BNTX format id.
    ///
    /// Returns [`Error::UnsupportedPixelFormat`] for anything outside the
    /// BCn family.
    pub fn from_id(id: u32) -> Result<Self> {
        let bc = match id >> 8 {
            0x1A => BcFormat::Bc1,
            0x1B => BcFormat::Bc2,
            0x1C => BcFormat::Bc3,
            0x1D => BcFormat::Bc4,
            0x1E => BcFormat::Bc5,
            _ => return Err(Error::UnsupportedPixelFormat(id)),
        };
        Ok(Self {
            bc,
            numeric: NumericType::from((id & 0xFF) as u8),
        })
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numeric = match self.numeric {
            NumericType::Unorm => "UNORM".to_string(),
            NumericType::Snorm => "SNORM".to_string(),
            NumericType::Srgb => "SRGB".to_string(),
            NumericType::Other(v) => format!("type {v:#04x}"),
        };
        write!(f, "{:?} {numeric}", self.bc)
    }
}

/// Number of 4×4 blocks covering `pixels` pixels.
#[inline]
pub fn blocks_for(pixels: u32) -> u32 {
    pixels.div_ceil(4)
}

/// Largest RGBA8 buffer a [`PixelSurface`] allocates: one 16384×16384
/// image, the biggest texture the hardware samples.
pub const MAX_SURFACE_BYTES: u64 = 1 << 30;

/// RGBA8 byte count of a `width` × `height` image, if it fits
/// [`MAX_SURFACE_BYTES`].
pub fn surface_bytes(width: u32, height: u32) -> Option<u64> {
    (width as u64)
        .checked_mul(height as u64)?
        .checked_mul(4)
        .filter(|&n| n <= MAX_SURFACE_BYTES)
}

/// A decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    blocks_decoded: usize,
    blocks_total: usize,
    bytes_expected: u64,
    bytes_available: u64,
}

impl PixelSurface {
    pub(crate) fn new(
        width: u32,
        height: u32,
        blocks_total: usize,
        bytes_expected: u64,
        bytes_available: u64,
    ) -> Result<Self> {
        let len = surface_bytes(width, height)
            .ok_or(Error::UnsupportedVariant("texture larger than 16384x16384"))?;
        Ok(Self {
            width,
            height,
            pixels: vec![0; len as usize],
            blocks_decoded: 0,
            blocks_total,
            bytes_expected,
            bytes_available,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel data, row-major, four bytes (R, G, B, A) per pixel.
    pub fn rgba(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_rgba(self) -> Vec<u8> {
        self.pixels
    }

    /// The pixel at `(x, y)`, or [`None`] outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.pixels[i..i + 4]);
        Some(px)
    }

    /// Blocks decoded so far, in raster order.
    pub fn blocks_decoded(&self) -> usize {
        self.blocks_decoded
    }

    /// Blocks covering the surface.
    pub fn blocks_total(&self) -> usize {
        self.blocks_total
    }

    /// Whether every block was decoded.
    pub fn is_complete(&self) -> bool {
        self.blocks_decoded == self.blocks_total
    }

    /// [`Error::TruncatedData`] if the input ran out before the last block.
    pub fn check_complete(&self) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        Err(Error::TruncatedData {
            expected: self.bytes_expected,
            available: self.bytes_available,
        })
    }

    /// Write a decoded 4×4 block at block coordinates `(bx, by)`, clipping
    /// pixels that fall outside the surface.
    pub(crate) fn put_block(&mut self, bx: u32, by: u32, block: &[[u8; 4]; 16]) {
        for (i, px) in block.iter().enumerate() {
            let x = bx * 4 + (i % 4) as u32;
            let y = by * 4 + (i / 4) as u32;
            if x < self.width && y < self.height {
                let o = (y as usize * self.width as usize + x as usize) * 4;
                self.pixels[o..o + 4].copy_from_slice(px);
            }
        }
        self.blocks_decoded += 1;
    }
}
