//! Decoder glue for Yaz0 / Yaz1 compressed files.
//!
//! A Yaz0 file holds exactly one payload: the decompressed stream. The
//! decoder exposes it as a single unnamed leaf, so it inherits the name of
//! whatever contained it. See [`crate::compression::yaz0`] for the format.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::compression::yaz0::{HEADER_SIZE, Yaz0Header, decompress_body};
use crate::decoder::{Decode, DecodedObject, Leaf};
use crate::registry::Codec;
use crate::Result;
use crate::utils::format_size;

/// Decoder for a Yaz0-compressed source.
pub struct Yaz0Decoder<R> {
    inner: R,
    dest: Option<PathBuf>,
    /// Parsed header.
    pub header: Yaz0Header,
    start: u64,
    objects: Vec<DecodedObject>,
}

impl<R: Read + Seek> Yaz0Decoder<R> {
    /// Read the header at the current position of `reader`.
    pub fn new(mut reader: R, dest: Option<PathBuf>) -> Result<Self> {
        let start = reader.stream_position()?;
        let header = Yaz0Header::read(&mut reader)?;
        let objects = vec![DecodedObject::Leaf(Leaf {
            name: None,
            size: Some(header.size as u64),
            id: 0,
        })];
        Ok(Self {
            inner: reader,
            dest,
            header,
            start,
            objects,
        })
    }

    /// Decompress the whole payload.
    pub fn decompress(&mut self) -> Result<Vec<u8>> {
        self.inner
            .seek(SeekFrom::Start(self.start + HEADER_SIZE as u64))?;
        decompress_body(&mut self.inner, &self.header)
    }

    /// Consume the decoder, returning the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> Decode for Yaz0Decoder<R> {
    fn codec(&self) -> Codec {
        Codec::Yaz0
    }

    fn objects(&self) -> &[DecodedObject] {
        &self.objects
    }

    fn num_objects(&self) -> Option<usize> {
        Some(1)
    }

    fn read_leaf(&mut self, _leaf: &Leaf) -> Result<Vec<u8>> {
        self.decompress()
    }

    fn destination(&self) -> Option<&Path> {
        self.dest.as_deref()
    }

    fn print_list(&mut self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "Objects: 1")?;
        writeln!(
            out,
            "{}-compressed stream, {} decompressed",
            String::from_utf8_lossy(&self.header.magic),
            format_size(self.header.size as u64)
        )?;
        Ok(())
    }
}
