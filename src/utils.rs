//! Low-level I/O primitives shared by all parsers.
//!
//! Each function reads exactly the bytes it promises or returns an error -
//! there is no partial-read ambiguity. The one exception is
//! [`peek`], which is used for sniffing and reports short reads.

use std::io::{Read, Seek, SeekFrom};

use crate::{Error, Result};

/// Up-front allocation for [`bytesv`]; longer reads grow as data arrives.
const PREALLOC_LIMIT: usize = 1 << 20;

/// Read exactly `len` bytes into a `Vec`.
///
/// `len` usually comes from the file itself, so the buffer only grows with
/// the bytes actually read. A short source fails with
/// [`Error::TruncatedData`].
pub(crate) fn bytesv<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut b = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    r.by_ref().take(len as u64).read_to_end(&mut b)?;
    if b.len() < len {
        return Err(Error::TruncatedData {
            expected: len as u64,
            available: b.len() as u64,
        });
    }
    Ok(b)
}

/// Read up to `len` bytes at the current position, then seek back.
///
/// Returns fewer than `len` bytes when the source is shorter. The stream
/// position is restored on success and on failure.
pub(crate) fn peek<R: Read + Seek>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let pos = r.stream_position()?;
    let mut buf = Vec::with_capacity(len);
    let read = r.by_ref().take(len as u64).read_to_end(&mut buf);
    r.seek(SeekFrom::Start(pos))?;
    read?;
    Ok(buf)
}

/// Total length of a seekable source. The position is left unchanged.
pub(crate) fn stream_len<R: Seek>(r: &mut R) -> Result<u64> {
    let pos = r.stream_position()?;
    let len = r.seek(SeekFrom::End(0))?;
    r.seek(SeekFrom::Start(pos))?;
    Ok(len)
}

/// Check `found` against the `expected` magic.
///
/// Returns [`Error::InvalidMagic`] on mismatch.
#[inline]
pub(crate) fn check_magic(found: &[u8], expected: &'static [u8]) -> Result<()> {
    if found != expected {
        return Err(Error::InvalidMagic {
            expected,
            found: found.to_vec(),
        });
    }
    Ok(())
}

/// Extract a null-terminated string from a byte slice at `offset`.
///
/// Returns [`Error::InvalidRange`] if `offset` is out of bounds, or
/// [`Error::UnterminatedName`] if no null byte is found.
#[inline]
pub(crate) fn null_string(buf: &[u8], offset: usize) -> Result<String> {
    let slice = buf.get(offset..).ok_or(Error::InvalidRange)?;
    let end = slice
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::UnterminatedName)?;
    Ok(String::from_utf8_lossy(&slice[..end]).into_owned())
}

/// Human-readable byte count used by listings.
pub(crate) fn format_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{size} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
