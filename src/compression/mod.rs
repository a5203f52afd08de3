//! Decompression for the compressed stream formats.
//!
//! Compression is kept apart from the container parsers: [`crate::formats`]
//! decoders receive already-decompressed bytes, and the extraction walker
//! re-sniffs decompressed output to find the container inside.
//!
//! ## Submodules
//!
//! | Module | Algorithm | Typical use |
//! |--------|-----------|-------------|
//! | [`yaz0`] | Yaz0 / Yaz1 LZ77 | `.szs` archives, compressed standalone assets |

pub mod yaz0;
