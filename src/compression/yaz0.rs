//! Yaz0 / Yaz1 - Nintendo's LZ77 variant.
//!
//! Used for `.szs` files (Yaz0-compressed SARC archives) and many other
//! standalone assets.
//!
//! ## Header (0x10 bytes, big endian)
//! ```text
//! [0x00] Magic "Yaz0" or "Yaz1"    (4 bytes)
//! [0x04] DecompressedSize          (u32 BE)
//! [0x08] Reserved                  (8 bytes, ignored)
//! ```
//!
//! ## Body
//! A control byte supplies eight flags, most significant bit first. A set
//! flag copies one input byte to the output. A clear flag is a
//! back-reference of two or three bytes:
//! ```text
//! b1 b2 [b3]
//! distance = ((b1 & 0x0F) << 8) | b2      copy from output_pos - distance - 1
//! length   = (b1 >> 4) + 2                 if b1 >> 4 != 0
//!          = b3 + 0x12                     otherwise
//! ```
//! The copy runs byte by byte, so a run may overlap the bytes it produces
//! (`distance < length` repeats a pattern). Decompression stops as soon as
//! the output reaches the declared size.
//!
//! A back-reference reaches at most 0x1000 bytes back, so [`Yaz0Reader`]
//! only keeps a 4 KiB window of output instead of the whole stream.

use std::io::{self, Read};

use log::debug;

use crate::record::{Endian, Field, RecordSpec};
use crate::utils::bytesv;
use crate::{Error, Result};

/// Size of the Yaz0 header in bytes.
pub const HEADER_SIZE: usize = 0x10;

/// Bytes of output a back-reference can reach.
const WINDOW: usize = 0x1000;
const WINDOW_MASK: usize = WINDOW - 1;

const HEADER: &[Field] = &[
    Field::bytes("magic", 4),
    Field::u32("size"),
    // Newer tools store an alignment hint here; nothing reads it.
    Field::bytes("reserved", 8),
];

/// Parsed Yaz0 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Yaz0Header {
    /// `Yaz0` or `Yaz1`.
    pub magic: [u8; 4],
    /// Size of the decompressed data in bytes.
    pub size: u32,
}

impl Yaz0Header {
    /// Parse a header from its 16 raw bytes.
    ///
    /// Returns [`Error::UnsupportedFormat`] if the magic is neither `Yaz0`
    /// nor `Yaz1`.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let spec = RecordSpec::new(Endian::Big, HEADER, Some(HEADER_SIZE))?;
        let rec = spec.read(buf, 0)?;
        let raw = rec.bytes("magic")?;
        let magic: [u8; 4] = [raw[0], raw[1], raw[2], raw[3]];
        if &magic != b"Yaz0" && &magic != b"Yaz1" {
            return Err(Error::UnsupportedFormat {
                magic: magic.to_vec(),
            });
        }
        let size = rec.u32("size")?;
        debug!("Yaz0 output size: {size}");
        Ok(Self { magic, size })
    }

    /// Read a header from the current position of `r`.
    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let buf = bytesv(r, HEADER_SIZE)?;
        Self::parse(&buf)
    }
}

/// A back-reference in progress.
#[derive(Debug, Clone, Copy)]
struct Run {
    distance: usize,
    remaining: usize,
}

/// Streaming Yaz0 decompressor.
///
/// Wraps the compressed body (the bytes after the header) and yields the
/// decompressed bytes through [`Read`]. The reader never produces more than
/// the declared size.
pub struct Yaz0Reader<R> {
    inner: R,
    size: u64,
    pos: u64,
    window: Box<[u8; WINDOW]>,
    code: u8,
    code_bits: u8,
    run: Option<Run>,
}

impl<R: Read> Yaz0Reader<R> {
    /// Read the header from `inner` and wrap the body that follows it.
    pub fn new(mut inner: R) -> Result<Self> {
        let header = Yaz0Header::read(&mut inner)?;
        Ok(Self::with_size(inner, header.size as u64))
    }

    /// Wrap a body whose header has already been consumed.
    pub fn with_size(inner: R, size: u64) -> Self {
        Self {
            inner,
            size,
            pos: 0,
            window: Box::new([0; WINDOW]),
            code: 0,
            code_bits: 0,
            run: None,
        }
    }

    /// Declared decompressed size.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes produced so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Decompress into `out`, returning the number of bytes written.
    ///
    /// Returns 0 once the declared size has been produced.
    pub fn fill(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        while n < out.len() && self.pos < self.size {
            if let Some(run) = self.run.as_mut() {
                let src = (self.pos as usize).wrapping_sub(run.distance + 1) & WINDOW_MASK;
                let b = self.window[src];
                run.remaining -= 1;
                if run.remaining == 0 {
                    self.run = None;
                }
                out[n] = self.emit(b);
                n += 1;
                continue;
            }

            if self.code_bits == 0 {
                self.code = self.next_byte()?;
                self.code_bits = 8;
            }
            let literal = self.code & 0x80 != 0;
            self.code <<= 1;
            self.code_bits -= 1;

            if literal {
                let b = self.next_byte()?;
                out[n] = self.emit(b);
                n += 1;
                continue;
            }

            let b1 = self.next_byte()?;
            let b2 = self.next_byte()?;
            let distance = (((b1 & 0x0F) as usize) << 8) | b2 as usize;
            let length = match b1 >> 4 {
                0 => self.next_byte()? as usize + 0x12,
                len => len as usize + 2,
            };
            debug_assert!((3..=0x111).contains(&length));
            if distance as u64 + 1 > self.pos {
                return Err(Error::malformed(format!(
                    "Yaz0 back-reference at {:#x} reaches {} bytes before the start of output",
                    self.pos,
                    distance as u64 + 1 - self.pos
                )));
            }
            self.run = Some(Run {
                distance,
                remaining: length,
            });
        }
        Ok(n)
    }

    /// Consume the reader, returning the compressed source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn emit(&mut self, b: u8) -> u8 {
        self.window[self.pos as usize & WINDOW_MASK] = b;
        self.pos += 1;
        b
    }

    fn next_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        match self.inner.read_exact(&mut b) {
            Ok(()) => Ok(b[0]),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::TruncatedData {
                expected: self.size,
                available: self.pos,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl<R: Read> Read for Yaz0Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fill(buf).map_err(|e| match e {
            Error::Io(e) => e,
            e @ Error::TruncatedData { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, e),
            e => io::Error::new(io::ErrorKind::InvalidData, e),
        })
    }
}

/// Decompress a complete Yaz0 stream (header included) from `r`.
///
/// The result is always exactly the declared size.
pub fn decompress<R: Read>(r: R) -> Result<Vec<u8>> {
    let mut reader = Yaz0Reader::new(r)?;
    read_all(&mut reader)
}

/// Decompress the body of a Yaz0 stream starting at the current position
/// of `r`, given the already parsed header.
pub(crate) fn decompress_body<R: Read>(r: &mut R, header: &Yaz0Header) -> Result<Vec<u8>> {
    let mut reader = Yaz0Reader::with_size(r, header.size as u64);
    read_all(&mut reader)
}

fn read_all<R: Read>(reader: &mut Yaz0Reader<R>) -> Result<Vec<u8>> {
    // Cap the up-front allocation; the declared size is untrusted.
    let mut out = Vec::with_capacity(reader.size().min(64 << 20) as usize);
    let mut chunk = [0u8; 0x4000];
    loop {
        let n = reader.fill(&mut chunk)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out)
}
