//! Decoders for Nintendo asset formats.
//!
//! Each submodule targets one format family and provides a `*Decoder<R>`
//! implementing [`crate::decoder::Decode`]. All of them follow the same
//! conventions:
//!
//! * **Generic over** [`std::io::Read`] + [`std::io::Seek`] - pass a [`std::fs::File`], a
//!   [`std::io::Cursor`], or anything else that implements both traits.
//!   Parsing starts at the reader's current position.
//! * **Headers eagerly, data lazily** - constructing a decoder reads and
//!   validates the headers and tables. Leaf contents are only read through
//!   [`crate::decoder::Decode::read_leaf`].
//! * **Layouts are declarative** - headers and table entries are `const`
//!   [`crate::record::Field`] tables read with [`crate::record::RecordSpec`].
//! * **Compression is separate** - [`yaz0`] exposes the decompressed
//!   stream as a leaf; the extraction walker sniffs it again to find the
//!   container inside.
//!
//! ## Format overview
//!
//! | Module   | Format  | Description |
//! |----------|---------|-------------|
//! | [`yaz0`] | Yaz0    | LZ-compressed stream (`.szs`); one payload |
//! | [`sarc`] | SARC    | General-purpose game asset archive |
//! | [`bntx`] | BNTX    | GPU texture container; mips decoded to TGA |
//! | [`byml`] | BYML    | Binary YAML document (header only) |
//! | [`aamp`] | AAMP    | Parameter archive (header only) |
//! | [`fres`] | FRES    | Model resource (header only) |

pub mod aamp;
pub mod bntx;
pub mod byml;
pub mod fres;
pub mod sarc;
pub mod yaz0;
