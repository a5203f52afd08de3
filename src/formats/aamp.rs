//! AAMP parameter archive header.
//!
//! AAMP files carry a tree of CRC32-keyed parameter lists. Only the header
//! is validated here; the parameter tree is not decoded, so the decoder
//! exposes no objects and the extraction walker keeps the file as a leaf.
//!
//! ## Header (0x34 bytes, little endian)
//! ```text
//! [0x00] Magic "AAMP"         (4 bytes)
//! [0x04] Version (2)          (u32)
//! [0x08] Flags                (u32)
//! [0x0C] FileSize             (u32)
//! [0x10] PioVersion           (u32)
//! [0x14] XmlStringLength      (u32)
//! [0x18] RootNodeCount (1)    (u32)
//! [0x1C] ChildNodeCount       (u32)
//! [0x20] TotalNodeCount       (u32)
//! [0x24] DataBufferSize       (u32)
//! [0x28] StringBufferSize     (u32)
//! [0x2C] Unknown              (u32)
//! [0x30] "xml\0"              (4 bytes)
//! ```

use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::decoder::{Decode, DecodedObject, Leaf};
use crate::record::{Endian, Field, RecordSpec};
use crate::registry::Codec;
use crate::utils::{check_magic, stream_len};
use crate::{Error, Result};

const HEADER: &[Field] = &[
    Field::bytes("magic", 4),
    Field::u32("version"),
    Field::u32("flags"),
    Field::u32("file_size"),
    Field::u32("pio_version"),
    Field::u32("xml_str_len"),
    Field::u32("root_nodes"),
    Field::u32("child_nodes"),
    Field::u32("total_nodes"),
    Field::u32("data_buf_size"),
    Field::u32("str_buf_size"),
    Field::u32("unk2c"),
    Field::bytes("xml_marker", 4),
];

/// Parsed AAMP header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AampHeader {
    pub version: u32,
    pub flags: u32,
    pub file_size: u32,
    pub root_nodes: u32,
    pub child_nodes: u32,
    pub total_nodes: u32,
}

/// Decoder for AAMP files.
pub struct AampDecoder<R> {
    inner: R,
    dest: Option<PathBuf>,
    pub header: AampHeader,
}

impl<R: Read + Seek> AampDecoder<R> {
    pub fn new(mut reader: R, dest: Option<PathBuf>) -> Result<Self> {
        let start = reader.stream_position()?;
        let available = stream_len(&mut reader)?.saturating_sub(start);

        let rec = RecordSpec::new(Endian::Little, HEADER, Some(0x34))?.read_at(&mut reader, start)?;
        check_magic(rec.bytes("magic")?, b"AAMP")?;
        let version = rec.u32("version")?;
        if version != 2 {
            return Err(Error::InvalidVersion {
                format: "AAMP",
                version,
            });
        }
        rec.dump("AAMP header");

        let header = AampHeader {
            version,
            flags: rec.u32("flags")?,
            file_size: rec.u32("file_size")?,
            root_nodes: rec.u32("root_nodes")?,
            child_nodes: rec.u32("child_nodes")?,
            total_nodes: rec.u32("total_nodes")?,
        };
        if header.file_size as u64 != available {
            warn!(
                "AAMP file size is {:#x}, but {available:#x} bytes are present",
                header.file_size
            );
        }
        if header.root_nodes != 1 {
            warn!("AAMP has {} root nodes, expected 1", header.root_nodes);
        }
        let marker = rec.bytes("xml_marker")?;
        if marker != b"xml\0" {
            warn!("AAMP xml marker is {marker:02X?}");
        }

        Ok(Self {
            inner: reader,
            dest,
            header,
        })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> Decode for AampDecoder<R> {
    fn codec(&self) -> Codec {
        Codec::Aamp
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
        writeln!(
            out,
            "AAMP v{}: {} root, {} child, {} total nodes",
            h.version, h.root_nodes, h.child_nodes, h.total_nodes
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn header(version: u32, file_size: u32) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(b"AAMP");
        for v in [version, 0, file_size, 0, 0, 1, 2, 3, 0, 0, 0] {
            b.extend_from_slice(&v.to_le_bytes());
        }
        b.extend_from_slice(b"xml\0");
        b
    }

    #[test]
    fn reads_header() {
        let dec = AampDecoder::new(Cursor::new(header(2, 0x34)), None).unwrap();
        assert_eq!(dec.header.total_nodes, 3);
        assert!(dec.objects().is_empty());
        assert_eq!(dec.num_objects(), None);
    }

    #[test]
    fn size_mismatch_is_soft() {
        assert!(AampDecoder::new(Cursor::new(header(2, 0x1000)), None).is_ok());
    }

    #[test]
    fn rejects_other_versions() {
        assert!(matches!(
            AampDecoder::new(Cursor::new(header(1, 0x34)), None),
            Err(Error::InvalidVersion { version: 1, .. })
        ));
    }

    #[test]
    fn short_header_is_truncated() {
        let bytes = header(2, 0x34)[..0x20].to_vec();
        assert!(matches!(
            AampDecoder::new(Cursor::new(bytes), None),
            Err(Error::TruncatedData { .. })
        ));
    }
}
