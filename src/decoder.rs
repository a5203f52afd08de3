//! Decoder protocol shared by every format.
//!
//! A decoder is bound to one byte source. Opening it reads and validates the
//! header; afterwards it exposes the decoded object tree ([`Decode::objects`]),
//! random access to leaf bytes ([`Decode::read_leaf`]), a listing
//! ([`Decode::print_list`]) and extraction ([`Decode::unpack`]). Only
//! `unpack` touches the filesystem.

use std::fs;
use std::io::{Read, Seek, Write};
use std::path::{Component, Path, PathBuf};

use log::info;

use crate::formats::{aamp, bntx, byml, fres, sarc, yaz0};
use crate::registry::Codec;
use crate::utils::format_size;
use crate::{Error, Result};

/// A node of the decoded object tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedObject {
    /// Owns raw bytes, obtained through [`Decode::read_leaf`].
    Leaf(Leaf),
    /// Owns child objects.
    Container(Container),
}

/// An object whose contents are raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Name, if the format stores one. Unnamed leaves take their parent's.
    pub name: Option<String>,
    /// Size in bytes, when known without reading the data.
    pub size: Option<u64>,
    /// Decoder-specific handle.
    pub(crate) id: usize,
}

/// An object grouping other objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub name: Option<String>,
    pub children: Vec<DecodedObject>,
}

impl DecodedObject {
    pub fn name(&self) -> Option<&str> {
        match self {
            DecodedObject::Leaf(l) => l.name.as_deref(),
            DecodedObject::Container(c) => c.name.as_deref(),
        }
    }
}

/// Options for [`Decode::unpack`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnpackOptions {
    /// Decode and report everything but create no files or directories.
    pub dry_run: bool,
}

/// The capability every format decoder provides.
pub trait Decode {
    /// Format family of this decoder.
    fn codec(&self) -> Codec;

    /// Decoded objects, in file order.
    fn objects(&self) -> &[DecodedObject];

    /// Object count from the file's table of contents, if it has one.
    ///
    /// When `Some`, equals `objects().len()`.
    fn num_objects(&self) -> Option<usize> {
        None
    }

    /// Read the bytes of one of this decoder's leaves.
    fn read_leaf(&mut self, leaf: &Leaf) -> Result<Vec<u8>>;

    /// Where [`Decode::unpack`] writes.
    fn destination(&self) -> Option<&Path>;

    /// Print a listing of this file's objects. Never writes files.
    fn print_list(&mut self, out: &mut dyn Write) -> Result<()> {
        if let Some(n) = self.num_objects() {
            writeln!(out, "Objects: {n}")?;
        }
        for obj in self.objects() {
            list_object(out, obj, 0)?;
        }
        Ok(())
    }

    /// Write every leaf under [`Decode::destination`].
    ///
    /// Single-object formats write to the destination path itself; archives
    /// treat it as a directory. Returns the paths written (or that would be
    /// written, with `dry_run`).
    fn unpack(&mut self, options: &UnpackOptions) -> Result<Vec<PathBuf>> {
        let dest = self
            .destination()
            .ok_or(Error::MissingDestination)?
            .to_path_buf();
        let single = self.codec().is_single_object();

        let mut leaves = Vec::new();
        for (i, obj) in self.objects().iter().enumerate() {
            let fallback = format!("{i}.bin");
            let name = obj.name().unwrap_or(&fallback);
            collect_leaves(obj, &child_path(Path::new(""), Some(name)), &mut leaves);
        }

        let total = leaves.len();
        let mut written = Vec::with_capacity(total);
        for (i, (rel, leaf)) in leaves.into_iter().enumerate() {
            let path = if single { dest.clone() } else { dest.join(&rel) };
            info!("[{:3}/{:3}] Extracting {}", i + 1, total, path.display());
            let data = self.read_leaf(&leaf)?;
            if !options.dry_run {
                write_file(&path, &data)?;
            }
            written.push(path);
        }
        Ok(written)
    }
}

/// A decoder for any supported format.
pub enum Decoder<R> {
    Aamp(aamp::AampDecoder<R>),
    Bntx(bntx::BntxDecoder<R>),
    Byml(byml::BymlDecoder<R>),
    Fres(fres::FresDecoder<R>),
    Sarc(sarc::SarcDecoder<R>),
    Yaz0(yaz0::Yaz0Decoder<R>),
}

macro_rules! dispatch {
    ($self:expr, $d:ident => $e:expr) => {
        match $self {
            Decoder::Aamp($d) => $e,
            Decoder::Bntx($d) => $e,
            Decoder::Byml($d) => $e,
            Decoder::Fres($d) => $e,
            Decoder::Sarc($d) => $e,
            Decoder::Yaz0($d) => $e,
        }
    };
}

impl<R: Read + Seek> Decoder<R> {
    /// Consume the decoder, returning the byte source.
    pub fn into_inner(self) -> R {
        dispatch!(self, d => d.into_inner())
    }
}

impl<R: Read + Seek> Decode for Decoder<R> {
    fn codec(&self) -> Codec {
        dispatch!(self, d => d.codec())
    }

    fn objects(&self) -> &[DecodedObject] {
        dispatch!(self, d => d.objects())
    }

    fn num_objects(&self) -> Option<usize> {
        dispatch!(self, d => d.num_objects())
    }

    fn read_leaf(&mut self, leaf: &Leaf) -> Result<Vec<u8>> {
        dispatch!(self, d => d.read_leaf(leaf))
    }

    fn destination(&self) -> Option<&Path> {
        dispatch!(self, d => d.destination())
    }

    fn print_list(&mut self, out: &mut dyn Write) -> Result<()> {
        dispatch!(self, d => d.print_list(out))
    }

    fn unpack(&mut self, options: &UnpackOptions) -> Result<Vec<PathBuf>> {
        dispatch!(self, d => d.unpack(options))
    }
}

/// Path of a child named `name` under `parent`.
///
/// Unnamed children inherit the parent's path. Root, `.` and `..`
/// components are dropped so decoded names cannot leave the output tree.
pub(crate) fn child_path(parent: &Path, name: Option<&str>) -> PathBuf {
    let mut path = parent.to_path_buf();
    if let Some(name) = name {
        for component in Path::new(name).components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
    }
    path
}

/// Create parent directories as needed and write `data` to `path`.
pub(crate) fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        // create_dir_all ignores directories that already exist
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)?;
    Ok(())
}

fn collect_leaves(obj: &DecodedObject, path: &Path, out: &mut Vec<(PathBuf, Leaf)>) {
    match obj {
        DecodedObject::Leaf(leaf) => out.push((path.to_path_buf(), leaf.clone())),
        DecodedObject::Container(c) => {
            for child in &c.children {
                collect_leaves(child, &child_path(path, child.name()), out);
            }
        }
    }
}

fn list_object(out: &mut dyn Write, obj: &DecodedObject, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    let name = obj.name().unwrap_or("<unnamed>");
    match obj {
        DecodedObject::Leaf(leaf) => match leaf.size {
            Some(size) => writeln!(out, "{indent}{name:<40} {:>12}", format_size(size))?,
            None => writeln!(out, "{indent}{name}")?,
        },
        DecodedObject::Container(c) => {
            writeln!(out, "{indent}{name}/ ({} objects)", c.children.len())?;
            for child in &c.children {
                list_object(out, child, depth + 1)?;
            }
        }
    }
    Ok(())
}
