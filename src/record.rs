//! Declarative fixed-layout binary records.
//!
//! Every header and table entry in the supported formats is described as a
//! `const` slice of [`Field`]s and read through a [`RecordSpec`]:
//!
//! ```
//! use nxextract::record::{Endian, Field, RecordSpec};
//!
//! const HEADER: &[Field] = &[
//!     Field::bytes("magic", 4),
//!     Field::u16("version"),
//!     Field::padding(2),
//!     Field::u32("count"),
//! ];
//!
//! let spec = RecordSpec::new(Endian::Big, HEADER, Some(12)).unwrap();
//! let rec = spec.read(b"TEST\x01\x00\x00\x00\x00\x00\x00\x07", 0).unwrap();
//! assert_eq!(rec.u16("version").unwrap(), 0x0100);
//! assert_eq!(rec.u32("count").unwrap(), 7);
//! ```
//!
//! Reads are random access: a spec is always applied at an explicit offset.
//! Padding fields produce no value and log a warning when any of their
//! bytes is non-zero, which usually means a field was misidentified.
//! String-offset fields keep the raw integer; the owning format resolves it
//! against its own string pool.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use log::{debug, warn};

use crate::utils::bytesv;
use crate::{Error, Result};

/// Byte order of the integer fields in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Padding, or a delegate that yields nothing.
    None,
    Unsigned(u64),
    Signed(i64),
    Bytes(Vec<u8>),
    /// Unresolved offset of a string.
    Offset(u64),
    /// Symbolic name produced by a post-processing function or delegate.
    Symbol(&'static str),
}

/// A field type with its own decoding rule.
pub trait FieldType: fmt::Debug + Send + Sync {
    /// Width in bytes.
    fn size(&self) -> usize;

    /// Decode the field from `buf[offset..offset + self.size()]`.
    ///
    /// The caller guarantees the range is in bounds.
    fn read(&self, buf: &[u8], offset: usize, endian: Endian) -> Result<Value>;
}

/// How a field's bytes are decoded.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Unsigned integer of the given width (1, 2, 4 or 8 bytes).
    Unsigned(usize),
    /// Two's complement integer of the given width (1, 2, 4 or 8 bytes).
    Signed(usize),
    /// Raw byte string.
    Bytes(usize),
    /// Reserved bytes that should be zero.
    Padding(usize),
    /// Offset of a string (4 or 8 bytes), resolved by the owning format.
    StrOffset(usize),
    /// Delegate type.
    Custom(&'static dyn FieldType),
}

impl FieldKind {
    /// Width of this field in bytes.
    pub fn width(&self) -> usize {
        match *self {
            FieldKind::Unsigned(n)
            | FieldKind::Signed(n)
            | FieldKind::Bytes(n)
            | FieldKind::Padding(n)
            | FieldKind::StrOffset(n) => n,
            FieldKind::Custom(t) => t.size(),
        }
    }
}

/// One named field of a record.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Applied to the decoded value before it is stored.
    pub post: Option<fn(Value) -> Value>,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            post: None,
        }
    }

    pub const fn u8(name: &'static str) -> Self {
        Self::new(name, FieldKind::Unsigned(1))
    }

    pub const fn u16(name: &'static str) -> Self {
        Self::new(name, FieldKind::Unsigned(2))
    }

    pub const fn u32(name: &'static str) -> Self {
        Self::new(name, FieldKind::Unsigned(4))
    }

    pub const fn u64(name: &'static str) -> Self {
        Self::new(name, FieldKind::Unsigned(8))
    }

    pub const fn i32(name: &'static str) -> Self {
        Self::new(name, FieldKind::Signed(4))
    }

    pub const fn bytes(name: &'static str, len: usize) -> Self {
        Self::new(name, FieldKind::Bytes(len))
    }

    /// Reserved bytes. Padding fields are not stored in the record.
    pub const fn padding(len: usize) -> Self {
        Self::new("", FieldKind::Padding(len))
    }

    /// 32-bit string offset.
    pub const fn str_offset(name: &'static str) -> Self {
        Self::new(name, FieldKind::StrOffset(4))
    }

    /// 64-bit string offset.
    pub const fn str_offset64(name: &'static str) -> Self {
        Self::new(name, FieldKind::StrOffset(8))
    }

    pub const fn custom(name: &'static str, ty: &'static dyn FieldType) -> Self {
        Self::new(name, FieldKind::Custom(ty))
    }

    /// Attach a post-processing function.
    pub const fn map(mut self, post: fn(Value) -> Value) -> Self {
        self.post = Some(post);
        self
    }
}

/// Layout of a fixed-size record.
#[derive(Debug, Clone, Copy)]
pub struct RecordSpec<'a> {
    endian: Endian,
    fields: &'a [Field],
    size: usize,
}

impl<'a> RecordSpec<'a> {
    /// Build a spec over `fields`.
    ///
    /// Fails with [`Error::MalformedRecord`] if `expected_size` is given and
    /// differs from the sum of the field widths, if an integer field has an
    /// unsupported width, or if two named fields collide.
    pub fn new(endian: Endian, fields: &'a [Field], expected_size: Option<usize>) -> Result<Self> {
        let mut size = 0usize;
        for (i, field) in fields.iter().enumerate() {
            match field.kind {
                FieldKind::Unsigned(n) | FieldKind::Signed(n) if !matches!(n, 1 | 2 | 4 | 8) => {
                    return Err(Error::malformed(format!(
                        "field `{}` has unsupported integer width {n}",
                        field.name
                    )));
                }
                FieldKind::StrOffset(n) if !matches!(n, 4 | 8) => {
                    return Err(Error::malformed(format!(
                        "string offset `{}` has unsupported width {n}",
                        field.name
                    )));
                }
                _ => {}
            }
            if !field.name.is_empty() && fields[..i].iter().any(|f| f.name == field.name) {
                return Err(Error::malformed(format!(
                    "duplicate field name `{}`",
                    field.name
                )));
            }
            size += field.kind.width();
        }

        if let Some(expected) = expected_size {
            if expected != size {
                return Err(Error::malformed(format!(
                    "record layout is {size:#x} bytes, expected {expected:#x}"
                )));
            }
        }

        Ok(Self {
            endian,
            fields,
            size,
        })
    }

    /// Total size of the record in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Read the record from `buf` at `offset`.
    pub fn read(&self, buf: &[u8], offset: usize) -> Result<Record> {
        let available = buf.len().saturating_sub(offset);
        if available < self.size {
            return Err(Error::TruncatedData {
                expected: self.size as u64,
                available: available as u64,
            });
        }

        let mut values = Vec::with_capacity(self.fields.len());
        let mut pos = offset;
        for field in self.fields {
            let width = field.kind.width();
            let raw = &buf[pos..pos + width];
            let value = match field.kind {
                FieldKind::Unsigned(_) => Value::Unsigned(read_uint(raw, self.endian)),
                FieldKind::Signed(n) => Value::Signed(sign_extend(read_uint(raw, self.endian), n)),
                FieldKind::Bytes(_) => Value::Bytes(raw.to_vec()),
                FieldKind::StrOffset(_) => Value::Offset(read_uint(raw, self.endian)),
                FieldKind::Padding(_) => {
                    for (i, &b) in raw.iter().enumerate() {
                        if b != 0 {
                            warn!("padding byte at offset {:#x} is {b:#04x}", pos + i);
                        }
                    }
                    pos += width;
                    continue;
                }
                FieldKind::Custom(ty) => ty.read(buf, pos, self.endian)?,
            };
            let value = match field.post {
                Some(post) => post(value),
                None => value,
            };
            values.push((field.name, value));
            pos += width;
        }

        Ok(Record {
            offset: offset as u64,
            values,
        })
    }

    /// Read `count` consecutive records starting at `offset`.
    pub fn read_array(&self, buf: &[u8], offset: usize, count: usize) -> Result<Vec<Record>> {
        (0..count)
            .map(|i| self.read(buf, offset + i * self.size))
            .collect()
    }

    /// Seek to `offset` in `r` and read the record there.
    pub fn read_at<R: Read + Seek>(&self, r: &mut R, offset: u64) -> Result<Record> {
        r.seek(SeekFrom::Start(offset))?;
        let buf = bytesv(r, self.size)?;
        let mut record = self.read(&buf, 0)?;
        record.offset = offset;
        Ok(record)
    }
}

/// A decoded record: named values in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Offset the record was read from.
    pub offset: u64,
    values: Vec<(&'static str, Value)>,
}

impl Record {
    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| Error::malformed(format!("record has no field `{name}`")))
    }

    pub fn u64(&self, name: &str) -> Result<u64> {
        match self.get(name)? {
            Value::Unsigned(v) => Ok(*v),
            other => Err(mismatch(name, "unsigned integer", other)),
        }
    }

    pub fn u32(&self, name: &str) -> Result<u32> {
        narrow(name, self.u64(name)?)
    }

    pub fn u16(&self, name: &str) -> Result<u16> {
        narrow(name, self.u64(name)?)
    }

    pub fn u8(&self, name: &str) -> Result<u8> {
        narrow(name, self.u64(name)?)
    }

    pub fn i64(&self, name: &str) -> Result<i64> {
        match self.get(name)? {
            Value::Signed(v) => Ok(*v),
            other => Err(mismatch(name, "signed integer", other)),
        }
    }

    pub fn i32(&self, name: &str) -> Result<i32> {
        narrow(name, self.i64(name)?)
    }

    pub fn bytes(&self, name: &str) -> Result<&[u8]> {
        match self.get(name)? {
            Value::Bytes(v) => Ok(v),
            other => Err(mismatch(name, "byte string", other)),
        }
    }

    /// Raw value of a string-offset field.
    pub fn offset(&self, name: &str) -> Result<u64> {
        match self.get(name)? {
            Value::Offset(v) => Ok(*v),
            other => Err(mismatch(name, "string offset", other)),
        }
    }

    pub fn symbol(&self, name: &str) -> Result<&'static str> {
        match self.get(name)? {
            Value::Symbol(s) => Ok(s),
            other => Err(mismatch(name, "symbol", other)),
        }
    }

    /// Log every field at debug level.
    pub fn dump(&self, label: &str) {
        debug!("{label} @ {:#x}:", self.offset);
        for (name, value) in &self.values {
            match value {
                Value::Unsigned(v) => debug!("  {name:>20}: {v:>10} ({v:#x})"),
                Value::Signed(v) => debug!("  {name:>20}: {v:>10}"),
                Value::Offset(v) => debug!("  {name:>20}: -> {v:#x}"),
                other => debug!("  {name:>20}: {other:?}"),
            }
        }
    }
}

/// Post-processing: turn a log2 value into `2^n`.
pub fn pow2(value: Value) -> Value {
    match value {
        Value::Unsigned(n) if n < 64 => Value::Unsigned(1 << n),
        other => other,
    }
}

/// Two-byte byte-order mark, decoded from its raw bytes.
///
/// `FE FF` is big endian and `FF FE` little endian regardless of the
/// record's own byte order; the result is `Symbol("big")` or
/// `Symbol("little")`.
#[derive(Debug)]
pub struct ByteOrderMark;

impl FieldType for ByteOrderMark {
    fn size(&self) -> usize {
        2
    }

    fn read(&self, buf: &[u8], offset: usize, _endian: Endian) -> Result<Value> {
        match [buf[offset], buf[offset + 1]] {
            [0xFE, 0xFF] => Ok(Value::Symbol("big")),
            [0xFF, 0xFE] => Ok(Value::Symbol("little")),
            [a, b] => Err(Error::malformed(format!(
                "invalid byte-order mark {a:02X} {b:02X}"
            ))),
        }
    }
}

fn read_uint(raw: &[u8], endian: Endian) -> u64 {
    match endian {
        Endian::Big => raw.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64),
        Endian::Little => raw.iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64),
    }
}

fn sign_extend(v: u64, width: usize) -> i64 {
    let shift = 64 - width as u32 * 8;
    ((v << shift) as i64) >> shift
}

fn narrow<T: TryFrom<V>, V: Copy + fmt::Display>(name: &str, v: V) -> Result<T> {
    T::try_from(v)
        .map_err(|_| Error::malformed(format!("field `{name}` value {v} out of range")))
}

fn mismatch(name: &str, wanted: &str, got: &Value) -> Error {
    Error::malformed(format!("field `{name}` is not a {wanted} (got {got:?})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &[Field] = &[
        Field::bytes("magic", 4),
        Field::u16("len"),
        Field::custom("bom", &ByteOrderMark),
        Field::u32("size"),
        Field::i32("delta"),
        Field::padding(2),
        Field::u8("shift").map(pow2),
        Field::u8("flags"),
    ];

    fn header_bytes() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(b"TEST");
        b.extend_from_slice(&0x14u16.to_be_bytes());
        b.extend_from_slice(&[0xFE, 0xFF]);
        b.extend_from_slice(&0x1234_5678u32.to_be_bytes());
        b.extend_from_slice(&(-2i32).to_be_bytes());
        b.extend_from_slice(&[0, 0]);
        b.push(4);
        b.push(0x80);
        b
    }

    #[test]
    fn reads_named_fields() {
        let spec = RecordSpec::new(Endian::Big, HEADER, Some(0x14)).unwrap();
        let rec = spec.read(&header_bytes(), 0).unwrap();
        assert_eq!(rec.bytes("magic").unwrap(), b"TEST");
        assert_eq!(rec.u16("len").unwrap(), 0x14);
        assert_eq!(rec.symbol("bom").unwrap(), "big");
        assert_eq!(rec.u32("size").unwrap(), 0x1234_5678);
        assert_eq!(rec.i32("delta").unwrap(), -2);
        assert_eq!(rec.u64("shift").unwrap(), 16);
        assert_eq!(rec.u8("flags").unwrap(), 0x80);
    }

    #[test]
    fn little_endian_fields() {
        const F: &[Field] = &[Field::u16("a"), Field::u32("b"), Field::u64("c")];
        let spec = RecordSpec::new(Endian::Little, F, None).unwrap();
        let mut buf = vec![0xAA];
        buf.extend_from_slice(&0xBEEFu16.to_le_bytes());
        buf.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        buf.extend_from_slice(&42u64.to_le_bytes());
        let rec = spec.read(&buf, 1).unwrap();
        assert_eq!(rec.u16("a").unwrap(), 0xBEEF);
        assert_eq!(rec.u32("b").unwrap(), 0xDEAD_BEEF);
        assert_eq!(rec.u64("c").unwrap(), 42);
        assert_eq!(rec.offset, 1);
    }

    #[test]
    fn size_mismatch_is_malformed() {
        let err = RecordSpec::new(Endian::Big, HEADER, Some(0x18)).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
    }

    #[test]
    fn duplicate_names_are_malformed() {
        const F: &[Field] = &[Field::u16("a"), Field::u16("a")];
        assert!(RecordSpec::new(Endian::Big, F, None).is_err());
    }

    #[test]
    fn padding_may_repeat() {
        const F: &[Field] = &[Field::padding(2), Field::padding(2)];
        let spec = RecordSpec::new(Endian::Big, F, Some(4)).unwrap();
        // non-zero padding is only a warning
        assert!(spec.read(&[0, 1, 0, 0], 0).is_ok());
    }

    #[test]
    fn short_buffer_is_truncated() {
        let spec = RecordSpec::new(Endian::Big, HEADER, None).unwrap();
        let buf = header_bytes();
        match spec.read(&buf[..10], 0) {
            Err(Error::TruncatedData {
                expected,
                available,
            }) => {
                assert_eq!(expected, 0x14);
                assert_eq!(available, 10);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrong_accessor_type() {
        let spec = RecordSpec::new(Endian::Big, HEADER, None).unwrap();
        let rec = spec.read(&header_bytes(), 0).unwrap();
        assert!(rec.u32("magic").is_err());
        assert!(rec.u32("missing").is_err());
        assert!(rec.u8("size").is_err());
    }

    #[test]
    fn bad_bom_fails() {
        let mut buf = header_bytes();
        buf[6] = 0x12;
        let spec = RecordSpec::new(Endian::Big, HEADER, None).unwrap();
        assert!(spec.read(&buf, 0).is_err());
    }

    #[test]
    fn read_at_seeks() {
        let mut data = vec![0u8; 3];
        data.extend(header_bytes());
        let mut cur = std::io::Cursor::new(data);
        let spec = RecordSpec::new(Endian::Big, HEADER, None).unwrap();
        let rec = spec.read_at(&mut cur, 3).unwrap();
        assert_eq!(rec.offset, 3);
        assert_eq!(rec.u32("size").unwrap(), 0x1234_5678);
    }

    #[test]
    fn read_array_is_contiguous() {
        const F: &[Field] = &[Field::u16("v")];
        let spec = RecordSpec::new(Endian::Big, F, Some(2)).unwrap();
        let recs = spec.read_array(&[0, 1, 0, 2, 0, 3], 0, 3).unwrap();
        let vs: Vec<u16> = recs.iter().map(|r| r.u16("v").unwrap()).collect();
        assert_eq!(vs, [1, 2, 3]);
    }
}
