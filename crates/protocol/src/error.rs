use std::io;

use signature::SignatureError;
use thiserror::Error;

/// Errors raised while encoding or decoding a dbsync stream.
#[derive(Debug, Error)]
pub enum WireError {
    /// The stream does not start with the expected magic bytes.
    #[error("bad magic {found:?}, expected {expected:?}")]
    BadMagic {
        /// Magic this reader accepts.
        expected: [u8; 4],
        /// Bytes actually found.
        found: [u8; 4],
    },
    /// The stream was written by an incompatible format version.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),
    /// The checksum header names an algorithm this build does not know.
    #[error("unknown strong hash id {0}")]
    UnknownAlgorithm(u8),
    /// A record tag other than "record" or "end".
    #[error("unexpected record tag {0:#04x}")]
    UnknownTag(u8),
    /// A header field does not fit its in-memory type.
    #[error("{field} value {value} out of range")]
    OutOfRange {
        /// Name of the field.
        field: &'static str,
        /// Value that was read or supplied.
        value: u64,
    },
    /// A literal token announced more bytes than one chunk may carry.
    #[error("literal chunk of {len} bytes exceeds limit {max}")]
    LiteralTooLarge {
        /// Announced length.
        len: u64,
        /// Largest permitted chunk.
        max: usize,
    },
    /// The trailer digest was made with another algorithm than the header
    /// announced.
    #[error("trailer digest id {found} does not match announced id {announced}")]
    DigestMismatch {
        /// Strong hash id from the header, `0` for none.
        announced: u8,
        /// Strong hash id found in the trailer.
        found: u8,
    },
    /// Decoded records violate the announced layout.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// Underlying stream failure, including truncation.
    #[error("I/O error: {0}")]
    Io(#[from] #[source] io::Error),
}

impl WireError {
    /// Reports whether the stream ended early.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        match self {
            Self::Io(error) => error.kind() == io::ErrorKind::UnexpectedEof,
            Self::Signature(SignatureError::Io(error)) => {
                error.kind() == io::ErrorKind::UnexpectedEof
            }
            _ => false,
        }
    }
}

impl From<WireError> for io::Error {
    fn from(error: WireError) -> Self {
        match error {
            WireError::Io(inner) => inner,
            other => Self::new(io::ErrorKind::InvalidData, other),
        }
    }
}
