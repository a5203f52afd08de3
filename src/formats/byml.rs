//! BYML (binary YAML) header.
//!
//! `BY` marks a big-endian (Wii U) document and `YB` a little-endian
//! (Switch) one. The node tree is not decoded; the decoder validates the
//! header and exposes no objects.
//!
//! ## Header (0x10 bytes)
//! ```text
//! [0x00] Magic "BY" / "YB"    (2 bytes)
//! [0x02] Version (1-7)        (u16)
//! [0x04] KeyTableOffset       (u32)
//! [0x08] StringTableOffset    (u32)
//! [0x0C] RootNodeOffset       (u32)
//! ```
//! Version 1 documents insert a path table offset before the root offset;
//! it is not read.

use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use crate::decoder::{Decode, DecodedObject, Leaf};
use crate::record::{Endian, Field, RecordSpec};
use crate::registry::Codec;
use crate::utils::peek;
use crate::{Error, Result};

const HEADER: &[Field] = &[
    Field::bytes("magic", 2),
    Field::u16("version"),
    Field::u32("key_table"),
    Field::u32("string_table"),
    Field::u32("root_node"),
];

/// Parsed BYML header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BymlHeader {
    pub endian: Endian,
    pub version: u16,
    pub key_table: u32,
    pub string_table: u32,
    pub root_node: u32,
}

/// Decoder for BYML documents.
pub struct BymlDecoder<R> {
    inner: R,
    dest: Option<PathBuf>,
    pub header: BymlHeader,
}

impl<R: Read + Seek> BymlDecoder<R> {
    pub fn new(mut reader: R, dest: Option<PathBuf>) -> Result<Self> {
        let start = reader.stream_position()?;
        let endian = match peek(&mut reader, 2)?.as_slice() {
            b"BY" => Endian::Big,
            b"YB" => Endian::Little,
            other => {
                return Err(Error::InvalidMagic {
                    expected: b"BY",
                    found: other.to_vec(),
                });
            }
        };

        let rec = RecordSpec::new(endian, HEADER, Some(0x10))?.read_at(&mut reader, start)?;
        let version = rec.u16("version")?;
        if !(1..=7).contains(&version) {
            return Err(Error::InvalidVersion {
                format: "BYML",
                version: version as u32,
            });
        }

        Ok(Self {
            inner: reader,
            dest,
            header: BymlHeader {
                endian,
                version,
                key_table: rec.u32("key_table")?,
                string_table: rec.u32("string_table")?,
                root_node: rec.u32("root_node")?,
            },
        })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> Decode for BymlDecoder<R> {
    fn codec(&self) -> Codec {
        Codec::Byml
    }

    fn objects(&self) -> &[DecodedObject] {
        &[]
    }

    fn read_leaf(&mut self, _leaf: &Leaf) -> Result<Vec<u8>> {
        Err(Error::InvalidRange)
    }

    fn destination(&self) -> Option<&Path> {
        self.dest.as_deref()
    }

    fn print_list(&mut self, out: &mut dyn Write) -> Result<()> {
        let endian = match self.header.endian {
            Endian::Big => "big",
            Endian::Little => "little",
        };
        writeln!(
            out,
            "BYML v{} ({endian} endian), root node at {:#x}",
            self.header.version, self.header.root_node
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn big_endian_header() {
        let mut b = b"BY".to_vec();
        b.extend_from_slice(&2u16.to_be_bytes());
        for v in [0x10u32, 0x20, 0x30] {
            b.extend_from_slice(&v.to_be_bytes());
        }
        let dec = BymlDecoder::new(Cursor::new(b), None).unwrap();
        assert_eq!(dec.header.endian, Endian::Big);
        assert_eq!(dec.header.version, 2);
        assert_eq!(dec.header.root_node, 0x30);
    }

    #[test]
    fn little_endian_header() {
        let mut b = b"YB".to_vec();
        b.extend_from_slice(&3u16.to_le_bytes());
        for v in [0x10u32, 0x20, 0x30] {
            b.extend_from_slice(&v.to_le_bytes());
        }
        let dec = BymlDecoder::new(Cursor::new(b), None).unwrap();
        assert_eq!(dec.header.endian, Endian::Little);
        assert_eq!(dec.header.version, 3);
        assert!(dec.objects().is_empty());
    }

    #[test]
    fn rejects_version_zero() {
        let mut b = b"BY".to_vec();
        b.extend_from_slice(&[0; 14]);
        assert!(matches!(
            BymlDecoder::new(Cursor::new(b), None),
            Err(Error::InvalidVersion { version: 0, .. })
        ));
    }
}
