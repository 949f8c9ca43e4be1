use std::io;

use thiserror::Error;

/// Error produced when slice arithmetic leaves the `u64` range.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum SliceError {
    /// `offset + length` does not fit in `u64`.
    #[error("slice overflows u64: offset {offset} + length {length}")]
    Overflow {
        /// Offset of the attempted range.
        offset: u64,
        /// Length of the attempted range.
        length: u64,
    },
}

/// Errors raised while reading from a [`RemoteByteSource`](crate::RemoteByteSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing object ended before the requested range was read.
    #[error("source truncated at offset {offset}: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Offset where the short read started.
        offset: u64,
        /// Bytes that were requested.
        expected: u64,
        /// Bytes actually delivered.
        actual: u64,
    },
    /// A view could not be derived.
    #[error(transparent)]
    Slice(#[from] SliceError),
    /// Underlying read or write failure.
    #[error("I/O error: {0}")]
    Io(#[from] #[source] io::Error),
}

impl SourceError {
    /// Reports whether the error means the baseline is shorter than expected.
    #[must_use]
    pub const fn is_truncation(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

impl From<SourceError> for io::Error {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::Io(inner) => inner,
            SourceError::Truncated { .. } => Self::new(io::ErrorKind::UnexpectedEof, error),
            SourceError::Slice(_) => Self::new(io::ErrorKind::InvalidInput, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_maps_to_unexpected_eof() {
        let err: io::Error = SourceError::Truncated {
            offset: 8,
            expected: 4,
            actual: 1,
        }
        .into();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(err.to_string().contains("offset 8"));
    }

    #[test]
    fn overflow_maps_to_invalid_input() {
        let err: io::Error = SourceError::from(SliceError::Overflow {
            offset: u64::MAX,
            length: 2,
        })
        .into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn io_errors_pass_through() {
        let err: io::Error = SourceError::Io(io::Error::other("boom")).into();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(err.to_string(), "boom");
    }
}
