//! Library-wide error and result types.

use std::io;

use thiserror::Error;

/// Result alias used throughout nxextract.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Error messages are kept intentionally terse; callers that need richer
/// context should wrap `Error` in their own type.
#[derive(Debug, Error)]
pub enum Error {
    /// No registered codec matched the leading bytes. `magic` holds the
    /// bytes actually read (at most four).
    ///
    /// While walking an archive this is the normal end of recursion, not a
    /// failure.
    #[error("unsupported file type (magic {})", hex_bytes(.magic))]
    UnsupportedFormat { magic: Vec<u8> },
    /// A magic/signature field did not match the expected value.
    #[error("bad magic: expected {}, found {}", hex_bytes(.expected), hex_bytes(.found))]
    InvalidMagic {
        expected: &'static [u8],
        found: Vec<u8>,
    },
    /// A format version is present in the data but not supported.
    #[error("unsupported {format} version: {version:#x}")]
    InvalidVersion { format: &'static str, version: u32 },
    /// A structural constraint was violated (message describes which one).
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    /// Fewer bytes were available than the data declared.
    #[error("truncated data: needed {expected} bytes, {available} available")]
    TruncatedData { expected: u64, available: u64 },
    /// A recognized but unimplemented variant of a format.
    #[error("unsupported variant: {0}")]
    UnsupportedVariant(&'static str),
    /// A texture format identifier outside the supported BCn family.
    #[error("unsupported pixel format: {0:#06x}")]
    UnsupportedPixelFormat(u32),
    /// A null-terminated string had no null terminator within the buffer.
    #[error("unterminated string")]
    UnterminatedName,
    /// An offset or size field would read outside the valid region.
    #[error("invalid offset or size")]
    InvalidRange,
    /// `unpack` was called on a decoder opened without a destination.
    #[error("no destination path given")]
    MissingDestination,
    /// The caller asked for the extraction to stop.
    #[error("extraction cancelled")]
    Cancelled,
    /// An underlying I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Shorthand for [`Error::MalformedRecord`].
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedRecord(msg.into())
    }

    /// Whether this is the "no codec for these bytes" condition.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, Error::UnsupportedFormat { .. })
    }
}

fn hex_bytes(bytes: &[u8]) -> String {
    let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02X}")).collect();
    format!("{} ({:?})", hex.join(" "), String::from_utf8_lossy(bytes))
}
