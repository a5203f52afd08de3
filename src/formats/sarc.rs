//! SARC (SEAD ARChive) - general-purpose Nintendo archive.
//!
//! Used pervasively in Wii U and Switch game content, usually delivered
//! Yaz0-compressed with a `.szs` suffix. Only the big-endian (Wii U)
//! variant is supported; little-endian archives are rejected with
//! [`Error::UnsupportedVariant`].
//!
//! ## Layout
//! ```text
//! [0x00] SARC header  (0x14 bytes)
//! [0x14] SFAT header  (0x0C bytes) + FAT nodes (NodeCount × 0x10)
//! [...]  SFNT header  (0x08 bytes) + null-terminated filenames (4-byte aligned)
//! [...]  Data section (begins at offset given in SARC header)
//! ```
//!
//! ## SARC Header (0x14 bytes)
//! ```text
//! [0x00] Magic "SARC"       (4 bytes)
//! [0x04] HeaderLength (0x14)(u16)
//! [0x06] BOM                (FE FF = big endian)
//! [0x08] FileSize           (u32)
//! [0x0C] DataOffset         (u32, absolute)
//! [0x10] Version (0x0100)   (u16)
//! [0x12] Reserved           (2 bytes)
//! ```
//!
//! ## SFAT Header (0x0C bytes)
//! ```text
//! [0x00] Magic "SFAT"           (4 bytes)
//! [0x04] HeaderLength (0x0C)    (u16)
//! [0x06] NodeCount              (u16)
//! [0x08] HashKey (0x65)         (u32)
//! ```
//!
//! ## SFAT Node (0x10 bytes)
//! ```text
//! [0x00] NameHash               (u32)
//! [0x04] FileAttrs              (u32)
//!         bit 24 set = named; low 16 bits × 4 = offset into the name table
//! [0x08] DataStart              (u32) - relative to DataOffset
//! [0x0C] DataEnd                (u32, exclusive)
//! ```
//!
//! ## SFNT Header (0x08 bytes)
//! ```text
//! [0x00] Magic "SFNT"     (4 bytes)
//! [0x04] HeaderLength (8) (u16)
//! [0x06] Reserved
//! [0x08] Null-terminated filenames, 4-byte aligned
//! ```
//!
//! ## Filename Hash
//! Each byte is sign-extended as i8 before accumulating:
//! `h = h * key + (b as i8)`, wrapping.

use std::io::{Read, Seek, SeekFrom, Take, Write};
use std::ops::Index;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::decoder::{Decode, DecodedObject, Leaf};
use crate::record::{ByteOrderMark, Endian, Field, RecordSpec};
use crate::registry::Codec;
use crate::utils::{bytesv, check_magic, null_string};
use crate::{Error, Result};

const HEADER: &[Field] = &[
    Field::bytes("magic", 4),
    Field::u16("header_len"),
    Field::custom("byte_order", &ByteOrderMark),
    Field::u32("file_size"),
    Field::u32("data_offset"),
    Field::u16("version"),
    Field::padding(2),
];

const SFAT_HEADER: &[Field] = &[
    Field::bytes("magic", 4),
    Field::u16("header_len"),
    Field::u16("node_count"),
    Field::u32("hash_key"),
];

const SFAT_NODE: &[Field] = &[
    Field::u32("name_hash"),
    Field::u32("file_attrs"),
    Field::u32("data_start"),
    Field::u32("data_end"),
];

const SFNT_HEADER: &[Field] = &[
    Field::bytes("magic", 4),
    Field::u16("header_len"),
    Field::padding(2),
];

/// Expected SFAT hash key.
pub const DEFAULT_HASH_KEY: u32 = 0x65;

const NAMED: u32 = 0x0100_0000;

/// Parsed SARC archive (metadata only).
///
/// File data is accessed via [`SarcReader`].
#[derive(Debug)]
pub struct Sarc {
    /// All file entries, in node order.
    pub files: Vec<SarcFile>,
    /// Format version from the SARC header (0x0100).
    pub version: u16,
    /// Total size declared by the header.
    pub file_size: u32,
    /// Hash key from the SFAT header (normally 0x65).
    pub hash_key: u32,
    /// Absolute stream offset where file data begins.
    pub data_offset: u64,
}

/// A single file entry inside a SARC archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SarcFile {
    /// Filename, or `file<index>` when the node has no name.
    pub name: String,
    /// Byte offset of the name within the name table, if the node is named.
    pub name_offset: Option<u32>,
    /// Filename hash stored in the node.
    pub hash: u32,
    /// Start byte offset within the SARC data section.
    pub data_start: u32,
    /// End byte offset within the SARC data section (exclusive).
    pub data_end: u32,
}

impl SarcFile {
    /// Size of this file's data in bytes.
    pub fn size(&self) -> u64 {
        (self.data_end - self.data_start) as u64
    }
}

impl Sarc {
    /// Parse a SARC archive from `r`.
    ///
    /// `r` must be positioned at the very beginning of the SARC magic.
    pub fn parse<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let sarc_start = r.stream_position()?;

        let header = RecordSpec::new(Endian::Big, HEADER, Some(0x14))?.read_at(r, sarc_start)?;
        check_magic(header.bytes("magic")?, b"SARC")?;
        if header.symbol("byte_order")? == "little" {
            return Err(Error::UnsupportedVariant("little-endian SARC"));
        }
        let header_len = header.u16("header_len")?;
        if header_len != 0x14 {
            warn!("SARC header length is {header_len:#x}, should be 0x14");
        }
        let version = header.u16("version")?;
        if version != 0x0100 {
            return Err(Error::InvalidVersion {
                format: "SARC",
                version: version as u32,
            });
        }
        let file_size = header.u32("file_size")?;
        let data_offset = header.u32("data_offset")?;

        let sfat_spec = RecordSpec::new(Endian::Big, SFAT_HEADER, Some(0x0C))?;
        let sfat = sfat_spec.read_at(r, sarc_start + 0x14)?;
        check_magic(sfat.bytes("magic")?, b"SFAT")?;
        let sfat_len = sfat.u16("header_len")?;
        if sfat_len != 0x0C {
            warn!("SFAT header length is {sfat_len:#x}, should be 0x0C");
        }
        let node_count = sfat.u16("node_count")? as usize;
        let hash_key = sfat.u32("hash_key")?;
        if hash_key != DEFAULT_HASH_KEY {
            warn!("SFAT hash key is {hash_key:#x}, should be {DEFAULT_HASH_KEY:#x}");
        }
        debug!("SARC node count={node_count}, data offset={data_offset:#x}");

        // FAT nodes follow the SFAT header with no padding; all of them must
        // be present.
        let node_spec = RecordSpec::new(Endian::Big, SFAT_NODE, Some(0x10))?;
        let node_buf = bytesv(r, node_count * node_spec.size())?;
        let nodes = node_spec.read_array(&node_buf, 0, node_count)?;

        let sfnt_offset = r.stream_position()?;
        let sfnt = RecordSpec::new(Endian::Big, SFNT_HEADER, Some(0x08))?.read_at(r, sfnt_offset)?;
        check_magic(sfnt.bytes("magic")?, b"SFNT")?;
        let sfnt_len = sfnt.u16("header_len")?;
        if sfnt_len != 8 {
            warn!("SFNT header length is {sfnt_len}, should be 8");
        }

        // Names sit between the SFNT header and the data section.
        let name_table_start = r.stream_position()?;
        let data_abs = sarc_start + data_offset as u64;
        let name_table_len = data_abs
            .checked_sub(name_table_start)
            .ok_or_else(|| Error::malformed("SARC data offset lies inside the file table"))?;
        let name_table = bytesv(r, name_table_len as usize)?;

        let data_len = (file_size as u64).saturating_sub(data_offset as u64);
        let mut files = Vec::with_capacity(node_count);
        for (index, node) in nodes.iter().enumerate() {
            let hash = node.u32("name_hash")?;
            let attrs = node.u32("file_attrs")?;
            let data_start = node.u32("data_start")?;
            let data_end = node.u32("data_end")?;
            if data_start > data_end {
                return Err(Error::malformed(format!(
                    "SARC node {index} ends before it starts ({data_start:#x} > {data_end:#x})"
                )));
            }
            if data_end as u64 > data_len {
                warn!("SARC node {index} ends at {data_end:#x}, past the data size {data_len:#x}");
            }

            let (name, name_offset) = if attrs & NAMED != 0 {
                let offset = (attrs & 0xFFFF) * 4;
                let name = null_string(&name_table, offset as usize)?;
                let expected = sarc_hash(name.as_bytes(), hash_key);
                if expected != hash {
                    warn!("SARC name hash mismatch for {name}: {hash:08X} != {expected:08X}");
                }
                (name, Some(offset))
            } else {
                (format!("file{index}"), None)
            };

            files.push(SarcFile {
                name,
                name_offset,
                hash,
                data_start,
                data_end,
            });
        }

        Ok(Self {
            files,
            version,
            file_size,
            hash_key,
            data_offset: data_abs,
        })
    }

    /// Compute the canonical hash for a filename using this archive's key.
    pub fn hash_filename(&self, name: &str) -> u32 {
        sarc_hash(name.as_bytes(), self.hash_key)
    }

    /// Find a file by its exact name.
    ///
    /// Uses hash-then-name comparison.
    pub fn get_file_by_name(&self, name: &str) -> Option<&SarcFile> {
        let target = self.hash_filename(name);
        self.files
            .iter()
            .find(|f| f.hash == target && f.name == name)
    }
}

/// Streaming reader wrapper over a parsed [`Sarc`] archive.
pub struct SarcReader<R> {
    inner: R,
    /// Parsed metadata.
    pub sarc: Sarc,
}

impl<R: Read + Seek> SarcReader<R> {
    /// Parse a SARC archive and wrap the provided reader.
    pub fn new(mut reader: R) -> Result<Self> {
        let sarc = Sarc::parse(&mut reader)?;
        Ok(Self {
            inner: reader,
            sarc,
        })
    }

    /// Open a file for streaming access.
    ///
    /// Seeks to the file's start and returns a [`Take`] limited to its byte
    /// range. The borrow ends when the [`Take`] is dropped.
    pub fn read_file(&mut self, file: &SarcFile) -> Result<Take<&mut R>> {
        let start = self.sarc.data_offset + file.data_start as u64;
        self.inner.seek(SeekFrom::Start(start))?;
        Ok(self.inner.by_ref().take(file.size()))
    }

    /// Read a file's complete contents.
    pub fn read(&mut self, file: &SarcFile) -> Result<Vec<u8>> {
        self.read_range(file, 0, file.size())
    }

    /// Read up to `len` bytes of `file` starting `offset` bytes into it.
    ///
    /// The range is clipped to the file; an offset at or past the end
    /// yields an empty buffer. No sibling entry is read.
    pub fn read_range(&mut self, file: &SarcFile, offset: u64, len: u64) -> Result<Vec<u8>> {
        let size = file.size();
        if offset >= size {
            return Ok(Vec::new());
        }
        let len = len.min(size - offset);
        self.inner.seek(SeekFrom::Start(
            self.sarc.data_offset + file.data_start as u64 + offset,
        ))?;
        bytesv(&mut self.inner, len as usize)
    }

    /// Iterate over all file entries.
    pub fn files(&self) -> impl Iterator<Item = &SarcFile> {
        self.sarc.files.iter()
    }

    /// Find a file by name. Returns [`None`] if not found.
    pub fn get_file_by_name(&self, name: &str) -> Option<&SarcFile> {
        self.sarc.get_file_by_name(name)
    }

    /// Consume the reader, returning the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> Index<&str> for SarcReader<R> {
    type Output = SarcFile;

    /// Index by file name.
    ///
    /// # Panics
    /// Panics if the file name does not exist in the archive.
    fn index(&self, index: &str) -> &Self::Output {
        self.get_file_by_name(index)
            .unwrap_or_else(|| panic!("no file '{index}' in SARC"))
    }
}

/// SARC filename hash algorithm.
///
/// Each byte is sign-extended (cast to `i8`) before accumulating. This is
/// required to correctly handle non-ASCII characters in game paths.
pub fn sarc_hash(name: &[u8], key: u32) -> u32 {
    let mut h: u32 = 0;
    for &b in name {
        h = h.wrapping_mul(key).wrapping_add(b as i8 as u32);
    }
    h
}

/// Decoder for SARC archives.
pub struct SarcDecoder<R> {
    reader: SarcReader<R>,
    dest: Option<PathBuf>,
    objects: Vec<DecodedObject>,
}

impl<R: Read + Seek> SarcDecoder<R> {
    /// Parse the archive tables at the current position of `reader`.
    pub fn new(reader: R, dest: Option<PathBuf>) -> Result<Self> {
        let reader = SarcReader::new(reader)?;
        let objects = reader
            .files()
            .enumerate()
            .map(|(id, f)| {
                DecodedObject::Leaf(Leaf {
                    name: Some(f.name.clone()),
                    size: Some(f.size()),
                    id,
                })
            })
            .collect();
        Ok(Self {
            reader,
            dest,
            objects,
        })
    }

    /// The underlying archive reader.
    pub fn archive(&mut self) -> &mut SarcReader<R> {
        &mut self.reader
    }

    /// Consume the decoder, returning the inner reader.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl<R: Read + Seek> Decode for SarcDecoder<R> {
    fn codec(&self) -> Codec {
        Codec::Sarc
    }

    fn objects(&self) -> &[DecodedObject] {
        &self.objects
    }

    fn num_objects(&self) -> Option<usize> {
        Some(self.reader.sarc.files.len())
    }

    fn read_leaf(&mut self, leaf: &Leaf) -> Result<Vec<u8>> {
        let file = self
            .reader
            .sarc
            .files
            .get(leaf.id)
            .cloned()
            .ok_or(Error::InvalidRange)?;
        self.reader.read(&file)
    }

    fn destination(&self) -> Option<&Path> {
        self.dest.as_deref()
    }

    fn print_list(&mut self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "Files: {}", self.reader.sarc.files.len())?;
        writeln!(out, "NameHash  FileSize Name")?;
        for f in self.reader.files() {
            writeln!(out, "{:08X} {:9} {}", f.hash, f.size(), f.name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Build a big-endian SARC holding `files`; `None` names are unnamed.
    fn build(files: &[(Option<&str>, &[u8])]) -> Vec<u8> {
        let mut names = Vec::new();
        let mut nodes = Vec::new();
        let mut data = Vec::new();
        for (name, contents) in files {
            let attrs = match name {
                Some(n) => {
                    let off = names.len() as u32 / 4;
                    names.extend_from_slice(n.as_bytes());
                    names.push(0);
                    while names.len() % 4 != 0 {
                        names.push(0);
                    }
                    NAMED | off
                }
                None => 0,
            };
            let hash = name.map_or(0, |n| sarc_hash(n.as_bytes(), DEFAULT_HASH_KEY));
            let start = data.len() as u32;
            data.extend_from_slice(contents);
            nodes.push((hash, attrs, start, data.len() as u32));
            while data.len() % 8 != 0 {
                data.push(0);
            }
        }

        let data_offset = 0x14 + 0x0C + nodes.len() * 0x10 + 8 + names.len();
        let mut out = Vec::new();
        out.extend_from_slice(b"SARC");
        out.extend_from_slice(&0x14u16.to_be_bytes());
        out.extend_from_slice(&[0xFE, 0xFF]);
        out.extend_from_slice(&((data_offset + data.len()) as u32).to_be_bytes());
        out.extend_from_slice(&(data_offset as u32).to_be_bytes());
        out.extend_from_slice(&0x0100u16.to_be_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(b"SFAT");
        out.extend_from_slice(&0x0Cu16.to_be_bytes());
        out.extend_from_slice(&(nodes.len() as u16).to_be_bytes());
        out.extend_from_slice(&DEFAULT_HASH_KEY.to_be_bytes());
        for (hash, attrs, start, end) in &nodes {
            for v in [hash, attrs, start, end] {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
        out.extend_from_slice(b"SFNT");
        out.extend_from_slice(&8u16.to_be_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&names);
        out.extend_from_slice(&data);
        out
    }

    #[test]
    fn parses_named_and_unnamed_nodes() {
        let bytes = build(&[(Some("a/one.txt"), b"hello"), (None, b"xyz")]);
        let mut reader = SarcReader::new(Cursor::new(bytes)).unwrap();
        let files: Vec<SarcFile> = reader.files().cloned().collect();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "a/one.txt");
        assert_eq!(files[0].name_offset, Some(0));
        assert_eq!(files[1].name, "file1");
        assert_eq!(files[1].name_offset, None);
        assert_eq!(reader.read(&files[0]).unwrap(), b"hello");
        assert_eq!(reader.read(&files[1]).unwrap(), b"xyz");
        assert_eq!(reader["a/one.txt"].size(), 5);
    }

    #[test]
    fn read_range_clips() {
        let bytes = build(&[(Some("f"), b"0123456789")]);
        let mut reader = SarcReader::new(Cursor::new(bytes)).unwrap();
        let f = reader.files().next().unwrap().clone();
        assert_eq!(reader.read_range(&f, 2, 3).unwrap(), b"234");
        assert_eq!(reader.read_range(&f, 8, 100).unwrap(), b"89");
        assert!(reader.read_range(&f, 10, 1).unwrap().is_empty());

        let mut streamed = Vec::new();
        reader.read_file(&f).unwrap().read_to_end(&mut streamed).unwrap();
        assert_eq!(streamed, b"0123456789");
    }

    #[test]
    fn parses_at_nonzero_offset() {
        let mut bytes = vec![0xEE; 5];
        bytes.extend(build(&[(Some("x.bin"), b"data")]));
        let mut cur = Cursor::new(bytes);
        cur.seek(SeekFrom::Start(5)).unwrap();
        let mut reader = SarcReader::new(cur).unwrap();
        let f = reader.files().next().unwrap().clone();
        assert_eq!(reader.read(&f).unwrap(), b"data");
    }

    #[test]
    fn little_endian_is_unsupported() {
        let mut bytes = build(&[(Some("x"), b"1")]);
        bytes[6] = 0xFF;
        bytes[7] = 0xFE;
        assert!(matches!(
            Sarc::parse(&mut Cursor::new(bytes)),
            Err(Error::UnsupportedVariant(_))
        ));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut bytes = build(&[(Some("x"), b"1")]);
        bytes[0x10] = 0x02;
        assert!(matches!(
            Sarc::parse(&mut Cursor::new(bytes)),
            Err(Error::InvalidVersion {
                version: 0x0200,
                ..
            })
        ));
    }

    #[test]
    fn inverted_range_is_malformed() {
        let mut bytes = build(&[(Some("x"), b"1234")]);
        // node 0 data_start at 0x20 + 0x08
        bytes[0x28..0x2C].copy_from_slice(&10u32.to_be_bytes());
        assert!(matches!(
            Sarc::parse(&mut Cursor::new(bytes)),
            Err(Error::MalformedRecord(_))
        ));
    }

    #[test]
    fn missing_nodes_are_truncated() {
        let mut bytes = build(&[(Some("x"), b"1")]);
        bytes[0x1A..0x1C].copy_from_slice(&500u16.to_be_bytes());
        assert!(Sarc::parse(&mut Cursor::new(bytes)).is_err());
    }

    #[test]
    fn bad_sfat_magic() {
        let mut bytes = build(&[(Some("x"), b"1")]);
        bytes[0x14] = b'X';
        assert!(matches!(
            Sarc::parse(&mut Cursor::new(bytes)),
            Err(Error::InvalidMagic { expected, .. }) if expected == b"SFAT"
        ));
    }

    #[test]
    fn hash_matches_known_value() {
        // "a" = 0x61; "ab" = 0x61 * 0x65 + 0x62
        assert_eq!(sarc_hash(b"a", 0x65), 0x61);
        assert_eq!(sarc_hash(b"ab", 0x65), 0x61 * 0x65 + 0x62);
        // bytes >= 0x80 are sign-extended
        assert_eq!(sarc_hash(&[0xFF], 0x65), u32::MAX);
    }

    #[test]
    fn lookup_by_name() {
        let bytes = build(&[(Some("one"), b"1"), (Some("two"), b"22")]);
        let reader = SarcReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.get_file_by_name("two").unwrap().size(), 2);
        assert!(reader.get_file_by_name("three").is_none());
    }

    #[test]
    fn decoder_lists_files() {
        let bytes = build(&[(Some("one"), b"1"), (None, b"22")]);
        let mut dec = SarcDecoder::new(Cursor::new(bytes), None).unwrap();
        assert_eq!(dec.num_objects(), Some(dec.objects().len()));
        let mut out = Vec::new();
        dec.print_list(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Files: 2\n"));
        assert!(text.contains("        1 one"));
        assert!(text.contains("00000000         2 file1"));
    }

    #[test]
    fn huge_data_offset_is_truncated() {
        let mut bytes = build(&[(Some("one"), b"1")]);
        bytes[0x0C..0x10].copy_from_slice(&0xFFFF_FFF0u32.to_be_bytes());
        assert!(matches!(
            SarcReader::new(Cursor::new(bytes)),
            Err(Error::TruncatedData {
                expected: _,
                available: 12
            })
        ));
    }

    #[test]
    fn huge_data_end_is_truncated_on_read() {
        let mut bytes = build(&[(Some("one"), b"1")]);
        bytes[0x2C..0x30].copy_from_slice(&u32::MAX.to_be_bytes());
        let mut reader = SarcReader::new(Cursor::new(bytes)).unwrap();
        let f = reader.files().next().unwrap().clone();
        assert_eq!(f.size(), u32::MAX as u64);
        assert!(matches!(
            reader.read(&f),
            Err(Error::TruncatedData {
                expected: 0xFFFF_FFFF,
                available: 8
            })
        ));
    }
}
