//! **nxextract** - recursive extraction of Nintendo game asset files.
//!
//! Point it at an opaque file and it identifies the format by its magic
//! bytes, decodes it, and keeps descending into whatever it finds until
//! only plain files remain. A Yaz0-compressed SARC holding BNTX textures
//! ends up as a directory of TGA images.
//!
//! # Supported formats
//! | Module | Format |
//! |--------|--------|
//! | [`formats::yaz0`] | Yaz0 / Yaz1 - LZ-compressed stream |
//! | [`formats::sarc`] | SARC - SEAD ARChive |
//! | [`formats::bntx`] | BNTX - Binary NX Texture (BC1-BC5) |
//! | [`formats::byml`] | BYML - binary YAML (header) |
//! | [`formats::aamp`] | AAMP - parameter archive (header) |
//! | [`formats::fres`] | FRES - model resource (header) |
//!
//! # Entry points
//! * [`registry::sniff`] / [`registry::open`] - identify and open one file.
//! * [`decoder::Decode`] - list, read and unpack a decoder's objects.
//! * [`extract::extract_path`] - walk a file recursively to disk.

pub mod compression;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod formats;
pub mod record;
pub mod registry;
pub mod texture;
pub(crate) mod utils;

pub use error::{Error, Result};
