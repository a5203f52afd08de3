//! Uncompressed 32-bit Truevision TGA output.
//!
//! ```text
//! [0x00] IdLength (0)            (u8)
//! [0x01] ColorMapType (0)        (u8)
//! [0x02] ImageType (2 = truecolor)(u8)
//! [0x03] ColorMapSpec            (5 bytes, zero)
//! [0x08] XOrigin, YOrigin        (u16 LE each)
//! [0x0C] Width, Height           (u16 LE each)
//! [0x10] BitsPerPixel (32)       (u8)
//! [0x11] Descriptor (0x28)       (u8) - 8 alpha bits, top-left origin
//! [0x12] Pixels, BGRA
//! ```

use super::PixelSurface;
use crate::{Error, Result};

pub const HEADER_SIZE: usize = 18;

/// Size of the encoded image for a `width` × `height` surface, or [`None`]
/// if it does not fit in a `u64`.
pub fn encoded_len(width: u32, height: u32) -> Option<u64> {
    (width as u64)
        .checked_mul(height as u64)?
        .checked_mul(4)?
        .checked_add(HEADER_SIZE as u64)
}

/// Encode `surface` as a TGA file.
pub fn encode(surface: &PixelSurface) -> Result<Vec<u8>> {
    let (w, h) = (surface.width(), surface.height());
    let (Ok(w16), Ok(h16)) = (u16::try_from(w), u16::try_from(h)) else {
        return Err(Error::UnsupportedVariant(
            "TGA image wider or taller than 65535 pixels",
        ));
    };

    let mut out = Vec::with_capacity(HEADER_SIZE + surface.rgba().len());
    out.extend_from_slice(&[0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    out.extend_from_slice(&w16.to_le_bytes());
    out.extend_from_slice(&h16.to_le_bytes());
    out.push(32);
    out.push(0x28);
    for px in surface.rgba().chunks_exact(4) {
        out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
    }
    Ok(out)
}
