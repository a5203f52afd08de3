//! Magic-byte codec registry.
//!
//! [`SIGNATURES`] maps leading byte signatures to a [`Codec`], in priority
//! order. [`sniff`] picks the first matching entry without consuming the
//! source, and [`Codec::open`] builds the matching [`Decoder`].
//!
//! Adding a format means adding a [`Codec`] variant, a [`Decoder`] variant
//! and a row in [`SIGNATURES`].

use std::fmt;
use std::io::{Read, Seek};
use std::path::PathBuf;

use log::trace;

use crate::decoder::Decoder;
use crate::formats::{aamp, bntx, byml, fres, sarc, yaz0};
use crate::utils::peek;
use crate::{Error, Result};

/// A decodable format family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Aamp,
    Bntx,
    Byml,
    Fres,
    Sarc,
    Yaz0,
}

/// One registry row.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    pub magic: &'static [u8],
    pub codec: Codec,
}

/// Registered signatures, checked in order.
pub const SIGNATURES: &[Signature] = &[
    Signature {
        magic: b"AAMP",
        codec: Codec::Aamp,
    },
    Signature {
        magic: b"BNTX",
        codec: Codec::Bntx,
    },
    Signature {
        magic: b"FRES",
        codec: Codec::Fres,
    },
    Signature {
        magic: b"SARC",
        codec: Codec::Sarc,
    },
    Signature {
        magic: b"Yaz0",
        codec: Codec::Yaz0,
    },
    Signature {
        magic: b"Yaz1",
        codec: Codec::Yaz0,
    },
    Signature {
        magic: b"BY",
        codec: Codec::Byml,
    },
    Signature {
        magic: b"YB",
        codec: Codec::Byml,
    },
];

/// Longest registered signature; also the number of bytes reported in
/// [`Error::UnsupportedFormat`].
const MAX_MAGIC: usize = 4;

/// Identify the codec for the bytes at the current position of `r`.
///
/// The stream position is the same after the call as before it, whether or
/// not a codec matched. Returns [`Error::UnsupportedFormat`] holding the
/// leading bytes when nothing matches.
pub fn sniff<R: Read + Seek>(r: &mut R) -> Result<Codec> {
    for sig in SIGNATURES {
        let head = peek(r, sig.magic.len())?;
        if head == sig.magic {
            trace!("sniffed {}", sig.codec);
            return Ok(sig.codec);
        }
    }
    let magic = peek(r, MAX_MAGIC)?;
    Err(Error::UnsupportedFormat { magic })
}

/// Identify the codec for an in-memory buffer.
pub fn sniff_bytes(data: &[u8]) -> Option<Codec> {
    SIGNATURES
        .iter()
        .find(|sig| data.starts_with(sig.magic))
        .map(|sig| sig.codec)
}

impl Codec {
    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            Codec::Aamp => "AAMP",
            Codec::Bntx => "BNTX",
            Codec::Byml => "BYML",
            Codec::Fres => "FRES",
            Codec::Sarc => "SARC",
            Codec::Yaz0 => "Yaz0",
        }
    }

    /// Extension appended to output names of data in this format.
    pub fn default_extension(self) -> Option<&'static str> {
        match self {
            Codec::Aamp => Some("aamp"),
            Codec::Bntx => Some("bntx"),
            Codec::Byml => Some("byml"),
            Codec::Fres => Some("bfres"),
            Codec::Sarc => Some("sarc"),
            Codec::Yaz0 => None,
        }
    }

    /// Whether the format always holds exactly one payload, which unpacks
    /// to the destination path itself rather than into a directory.
    pub fn is_single_object(self) -> bool {
        matches!(self, Codec::Yaz0)
    }

    /// Open `source` with this codec, reading and validating its header.
    ///
    /// `dest` is where [`crate::decoder::Decode::unpack`] writes; pass
    /// `None` when only listing or walking.
    pub fn open<R: Read + Seek>(self, source: R, dest: Option<PathBuf>) -> Result<Decoder<R>> {
        Ok(match self {
            Codec::Aamp => Decoder::Aamp(aamp::AampDecoder::new(source, dest)?),
            Codec::Bntx => Decoder::Bntx(bntx::BntxDecoder::new(source, dest)?),
            Codec::Byml => Decoder::Byml(byml::BymlDecoder::new(source, dest)?),
            Codec::Fres => Decoder::Fres(fres::FresDecoder::new(source, dest)?),
            Codec::Sarc => Decoder::Sarc(sarc::SarcDecoder::new(source, dest)?),
            Codec::Yaz0 => Decoder::Yaz0(yaz0::Yaz0Decoder::new(source, dest)?),
        })
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sniff `source` and open it with the matching codec.
pub fn open<R: Read + Seek>(mut source: R, dest: Option<PathBuf>) -> Result<Decoder<R>> {
    let codec = sniff(&mut source)?;
    codec.open(source, dest)
}
