//! FRES (BFRES) model resource header.
//!
//! Two incompatible headers share the `FRES` signature: the Switch header
//! pads the magic to eight bytes with spaces, the Wii U header follows the
//! four-byte magic directly with the version. Only the header is validated.
//!
//! ## Switch header (first 0x20 bytes, usually little endian)
//! ```text
//! [0x00] Magic "FRES    "   (8 bytes)
//! [0x08] Version            (u32)
//! [0x0C] BOM                (FF FE = little endian)
//! [0x0E] HeaderLength (0x0C)(u16)
//! [0x10] NameOffset         (u32)
//! [0x14] Unknown            (u32)
//! [0x18] RelocTableOffset   (u32)
//! [0x1C] FileSize           (u32)
//! ```
//!
//! ## Wii U header (first 0x20 bytes, big endian)
//! ```text
//! [0x00] Magic "FRES"       (4 bytes)
//! [0x04] Version            (u32)
//! [0x08] BOM                (FE FF = big endian)
//! [0x0A] HeaderLength (0x10)(u16)
//! [0x0C] FileSize           (u32)
//! [0x10] Alignment          (u32)
//! [0x14] NameOffset         (u32)
//! [0x18] StringTableLength  (u32)
//! [0x1C] StringTableOffset  (u32)
//! ```

use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::decoder::{Decode, DecodedObject, Leaf};
use crate::record::{ByteOrderMark, Endian, Field, Record, RecordSpec};
use crate::registry::Codec;
use crate::utils::peek;
use crate::{Error, Result};

const SWITCH_HEADER: &[Field] = &[
    Field::bytes("magic", 8),
    Field::u32("version"),
    Field::custom("byte_order", &ByteOrderMark),
    Field::u16("header_len"),
    Field::str_offset("name"),
    Field::u32("unk14"),
    Field::u32("reloc_table"),
    Field::u32("file_size"),
];

const WIIU_HEADER: &[Field] = &[
    Field::bytes("magic", 4),
    Field::u32("version"),
    Field::custom("byte_order", &ByteOrderMark),
    Field::u16("header_len"),
    Field::u32("file_size"),
    Field::u32("alignment"),
    Field::str_offset("name"),
    Field::u32("str_tab_len"),
    Field::u32("str_tab_offset"),
];

/// Which header layout a file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FresVariant {
    Switch,
    WiiU,
}

/// Parsed FRES header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FresHeader {
    pub variant: FresVariant,
    pub version: u32,
    pub file_size: u32,
}

/// Decoder for FRES resources.
pub struct FresDecoder<R> {
    inner: R,
    dest: Option<PathBuf>,
    pub header: FresHeader,
}

impl<R: Read + Seek> FresDecoder<R> {
    pub fn new(mut reader: R, dest: Option<PathBuf>) -> Result<Self> {
        let start = reader.stream_position()?;
        let head = peek(&mut reader, 8)?;
        let (variant, fields, expected_len) = if head.as_slice() == b"FRES    " {
            (FresVariant::Switch, SWITCH_HEADER, 0x0C)
        } else if head.starts_with(b"FRES") {
            (FresVariant::WiiU, WIIU_HEADER, 0x10)
        } else {
            return Err(Error::InvalidMagic {
                expected: b"FRES",
                found: head,
            });
        };

        let rec = read_with_bom(&mut reader, start, fields, variant)?;
        let header_len = rec.u16("header_len")?;
        if header_len != expected_len {
            warn!("FRES header length is {header_len:#x}, should be {expected_len:#x}");
        }
        rec.dump("FRES header");

        Ok(Self {
            inner: reader,
            dest,
            header: FresHeader {
                variant,
                version: rec.u32("version")?,
                file_size: rec.u32("file_size")?,
            },
        })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Read the header in its conventional byte order, then again if the BOM
/// says otherwise.
fn read_with_bom<R: Read + Seek>(
    r: &mut R,
    start: u64,
    fields: &[Field],
    variant: FresVariant,
) -> Result<Record> {
    let conventional = match variant {
        FresVariant::Switch => Endian::Little,
        FresVariant::WiiU => Endian::Big,
    };
    let rec = RecordSpec::new(conventional, fields, Some(0x20))?.read_at(r, start)?;
    let actual = match rec.symbol("byte_order")? {
        "big" => Endian::Big,
        _ => Endian::Little,
    };
    if actual == conventional {
        return Ok(rec);
    }
    RecordSpec::new(actual, fields, Some(0x20))?.read_at(r, start)
}

impl<R: Read + Seek> Decode for FresDecoder<R> {
    fn codec(&self) -> Codec {
        Codec::Fres
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
        let h = &self.header;
        let platform = match h.variant {
            FresVariant::Switch => "Switch",
            FresVariant::WiiU => "Wii U",
        };
        writeln!(
            out,
            "FRES ({platform}) v{}.{}, {} bytes",
            h.version >> 16,
            h.version & 0xFFFF,
            h.file_size
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn switch_header() {
        let mut b = b"FRES    ".to_vec();
        b.extend_from_slice(&0x0005_0003u32.to_le_bytes());
        b.extend_from_slice(&[0xFF, 0xFE]);
        b.extend_from_slice(&0x0Cu16.to_le_bytes());
        for v in [0u32, 0, 0, 0x1234] {
            b.extend_from_slice(&v.to_le_bytes());
        }
        let dec = FresDecoder::new(Cursor::new(b), None).unwrap();
        assert_eq!(dec.header.variant, FresVariant::Switch);
        assert_eq!(dec.header.version, 0x0005_0003);
        assert_eq!(dec.header.file_size, 0x1234);
    }

    #[test]
    fn wiiu_header() {
        let mut b = b"FRES".to_vec();
        b.extend_from_slice(&0x0300_0400u32.to_be_bytes());
        b.extend_from_slice(&[0xFE, 0xFF]);
        b.extend_from_slice(&0x10u16.to_be_bytes());
        for v in [0x4000u32, 0x2000, 0, 0, 0] {
            b.extend_from_slice(&v.to_be_bytes());
        }
        let mut dec = FresDecoder::new(Cursor::new(b), None).unwrap();
        assert_eq!(dec.header.variant, FresVariant::WiiU);
        assert_eq!(dec.header.file_size, 0x4000);
        let mut out = Vec::new();
        dec.print_list(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "FRES (Wii U) v768.1024, 16384 bytes\n"
        );
    }

    #[test]
    fn bad_bom_is_malformed() {
        let mut b = b"FRES".to_vec();
        b.extend_from_slice(&[0; 4]);
        b.extend_from_slice(&[0x12, 0x34]);
        b.extend_from_slice(&[0; 22]);
        assert!(matches!(
            FresDecoder::new(Cursor::new(b), None),
            Err(Error::MalformedRecord(_))
        ));
    }
}
