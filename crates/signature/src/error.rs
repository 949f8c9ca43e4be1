//! crates/signature/src/error.rs
//!
//! Errors raised while laying out, generating or assembling checksum sets.

use std::io;

use checksums::StrongHashAlgorithm;
use thiserror::Error;

/// Errors returned when generating or validating checksum sets.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// Block length exceeds the supported maximum.
    #[error("block size {len} exceeds the maximum of {max} bytes")]
    InvalidBlockSize {
        /// Requested block length.
        len: u32,
        /// Largest accepted block length.
        max: u32,
    },
    /// Number of blocks derived from the layout does not fit a 32-bit block index.
    #[error("baseline layout describes {0} blocks which exceeds the 32-bit block index")]
    TooManyBlocks(u64),
    /// Extra bytes were present in the input after consuming the advertised length.
    #[error("input contained {bytes} trailing byte(s) beyond the expected layout")]
    TrailingData {
        /// Number of bytes observed beyond the expected layout.
        bytes: u64,
    },
    /// Underlying I/O failure raised while reading the baseline or writing records.
    #[error("failed to read input while generating checksums: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
    /// A record arrived out of order.
    #[error("expected checksum record for block {expected}, found block {found}")]
    UnexpectedBlock {
        /// Index the set expected next.
        expected: u32,
        /// Index carried by the record.
        found: u32,
    },
    /// A record's length disagrees with the block layout.
    #[error("block {index} has length {found}, layout requires {expected}")]
    BlockLength {
        /// Block index.
        index: u32,
        /// Length implied by the layout.
        expected: u32,
        /// Length carried by the record.
        found: u32,
    },
    /// A record's strong digest has the wrong width for the set's algorithm.
    #[error("{algorithm} digests are {expected} bytes, record carries {found}")]
    DigestWidth {
        /// Algorithm recorded for the set.
        algorithm: StrongHashAlgorithm,
        /// Width the algorithm produces.
        expected: usize,
        /// Width carried by the record.
        found: usize,
    },
    /// The set ended before every block had a record.
    #[error("checksum set holds {found} of {expected} records")]
    Incomplete {
        /// Blocks described by the layout.
        expected: u32,
        /// Records received.
        found: u32,
    },
}
