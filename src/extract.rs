//! Recursive extraction.
//!
//! The walker turns one root file into a flat list of `(path, bytes)`
//! entries. Every leaf read from a decoder is sniffed again: if it is
//! itself a registered format it is opened and walked in turn, otherwise
//! it is a final file. Only after the whole tree has been walked are the
//! entries written, in one pass.
//!
//! ## Naming
//! ```text
//! Bed            root name (normally the input's file stem)
//! └ Yaz0         unnamed leaf inherits "Bed"
//!   └ SARC       ".sarc" appended once -> "Bed.sarc"
//!     └ a.bntx   named child joined    -> "Bed.sarc/a.bntx"
//!       └ tex    BNTX container        -> "Bed.sarc/a.bntx/tex/mip0.tga"
//! ```
//! A nested decoder that yields no objects (the header-only formats, an
//! empty archive) leaves the original bytes in place under the
//! extension-augmented name.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::decoder::{Decode, DecodedObject, Decoder, child_path, write_file};
use crate::registry::{Codec, sniff};
use crate::utils::format_size;
use crate::{Error, Result};

/// Options for [`extract`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Walk everything but create no files or directories.
    pub dry_run: bool,
    /// Descend into leaves that are themselves decodable.
    pub recurse: bool,
    /// Checked before each leaf is read; once set, extraction stops with
    /// [`Error::Cancelled`].
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            recurse: true,
            cancel: None,
        }
    }
}

impl ExtractOptions {
    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

/// A final, non-decodable file produced by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Path relative to the destination directory.
    pub path: PathBuf,
    pub data: Vec<u8>,
}

/// What an extraction produced (or would produce, in a dry run).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Relative path and size of every entry, in walk order.
    pub entries: Vec<(PathBuf, u64)>,
}

impl ExtractReport {
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|(_, size)| size).sum()
    }

    /// Print one line per entry followed by a total.
    ///
    /// Identical for a dry run and a real run over the same input.
    pub fn print_listing(&self, out: &mut dyn Write) -> Result<()> {
        for (path, size) in &self.entries {
            writeln!(out, "{:>12}  {}", format_size(*size), path.display())?;
        }
        writeln!(
            out,
            "{} files, {}",
            self.entries.len(),
            format_size(self.total_size())
        )?;
        Ok(())
    }
}

/// `name` with `codec`'s default extension appended, unless it already
/// ends with it.
pub fn with_extension(name: &Path, codec: Codec) -> PathBuf {
    let Some(ext) = codec.default_extension() else {
        return name.to_path_buf();
    };
    if name.extension().is_some_and(|e| e == ext) {
        return name.to_path_buf();
    }
    let mut s = name.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Walk `source` recursively, returning every final entry.
///
/// `root_name` names the root; the source's own extension is not
/// inferred. Fails with [`Error::UnsupportedFormat`] if the root itself is
/// not a registered format.
pub fn walk<R: Read + Seek>(
    mut source: R,
    root_name: &Path,
    options: &ExtractOptions,
) -> Result<Vec<Entry>> {
    let start = source.stream_position()?;
    let codec = sniff(&mut source)?;
    let name = with_extension(root_name, codec);
    debug!("root {} is {codec}", name.display());

    let mut decoder = codec.open(source, None)?;
    let mut entries = Vec::new();
    walk_decoder(&mut decoder, &name, options, &mut entries)?;

    if entries.is_empty() {
        let mut source = decoder.into_inner();
        source.seek(SeekFrom::Start(start))?;
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        entries.push(Entry { path: name, data });
    }
    Ok(entries)
}

fn walk_decoder<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
    options: &ExtractOptions,
    out: &mut Vec<Entry>,
) -> Result<()> {
    let objects = decoder.objects().to_vec();
    for obj in &objects {
        walk_object(decoder, obj, &child_path(path, obj.name()), options, out)?;
    }
    Ok(())
}

fn walk_object<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    obj: &DecodedObject,
    path: &Path,
    options: &ExtractOptions,
    out: &mut Vec<Entry>,
) -> Result<()> {
    match obj {
        DecodedObject::Leaf(leaf) => {
            options.check_cancelled()?;
            let data = decoder.read_leaf(leaf)?;
            walk_bytes(data, path, options, out)
        }
        DecodedObject::Container(c) => {
            for child in &c.children {
                let sub = child_path(path, child.name());
                walk_object(decoder, child, &sub, options, out)?;
            }
            Ok(())
        }
    }
}

fn walk_bytes(
    data: Vec<u8>,
    path: &Path,
    options: &ExtractOptions,
    out: &mut Vec<Entry>,
) -> Result<()> {
    if !options.recurse {
        out.push(Entry {
            path: path.to_path_buf(),
            data,
        });
        return Ok(());
    }

    let mut staged = Cursor::new(data);
    let codec = match sniff(&mut staged) {
        Ok(codec) => codec,
        Err(e) if e.is_unsupported_format() => {
            out.push(Entry {
                path: path.to_path_buf(),
                data: staged.into_inner(),
            });
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let nested_path = with_extension(path, codec);
    debug!("{} is {codec}, descending", nested_path.display());
    let mut nested = codec.open(staged, None)?;
    let before = out.len();
    walk_decoder(&mut nested, &nested_path, options, out)?;
    if out.len() == before {
        out.push(Entry {
            path: nested_path,
            data: nested.into_inner().into_inner(),
        });
    }
    Ok(())
}

/// Write `entries` under `dest`, creating directories as needed.
pub fn write_entries(dest: &Path, entries: &[Entry]) -> Result<()> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        entries
            .par_iter()
            .try_for_each(|e| write_file(&dest.join(&e.path), &e.data))
    }

    #[cfg(not(feature = "parallel"))]
    {
        entries
            .iter()
            .try_for_each(|e| write_file(&dest.join(&e.path), &e.data))
    }
}

/// Walk `source` and write the result under `dest`.
///
/// With [`ExtractOptions::dry_run`] nothing is created, but the report is
/// the same as for a real run.
pub fn extract<R: Read + Seek>(
    source: R,
    root_name: &Path,
    dest: &Path,
    options: &ExtractOptions,
) -> Result<ExtractReport> {
    let entries = walk(source, root_name, options)?;
    let total = entries.len();
    for (i, e) in entries.iter().enumerate() {
        info!("[{:3}/{:3}] Extracting {}", i + 1, total, e.path.display());
    }
    if !options.dry_run {
        write_entries(dest, &entries)?;
    }
    Ok(ExtractReport {
        entries: entries
            .into_iter()
            .map(|e| (e.path, e.data.len() as u64))
            .collect(),
    })
}

/// Open the file at `path` and [`extract`] it, naming the root after the
/// file's stem.
pub fn extract_path(path: &Path, dest: &Path, options: &ExtractOptions) -> Result<ExtractReport> {
    let file = std::io::BufReader::new(std::fs::File::open(path)?);
    let stem = path.file_stem().map_or_else(|| PathBuf::from("out"), PathBuf::from);
    extract(file, &stem, dest, options)
}
