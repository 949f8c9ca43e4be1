use std::io;

use checksums::{RollingError, StrongHashAlgorithm};
use thiserror::Error;

/// Errors raised while indexing checksums or generating instructions.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The checksum set was produced with a different block size.
    #[error("checksum set uses {index}-byte blocks but the generator expects {generator}-byte blocks")]
    BlockSizeMismatch {
        /// Block size recorded in the checksum set.
        index: u32,
        /// Block size configured on the generator.
        generator: u32,
    },
    /// The checksum set was produced with a different strong hash.
    #[error("checksum set uses {index} digests but the generator expects {generator}")]
    AlgorithmMismatch {
        /// Algorithm recorded in the checksum set.
        index: StrongHashAlgorithm,
        /// Algorithm configured on the generator.
        generator: StrongHashAlgorithm,
    },
    /// Records do not ascend contiguously from zero.
    #[error("expected checksum record {expected}, found {found}")]
    NonContiguousIndex {
        /// Index expected next.
        expected: u32,
        /// Index carried by the record.
        found: u32,
    },
    /// A record's length disagrees with the block layout.
    #[error("block {block} has length {found}, layout requires {expected}")]
    InvalidBlockLength {
        /// Block index.
        block: u32,
        /// Length implied by the layout.
        expected: u32,
        /// Length carried by the record.
        found: u32,
    },
    /// The rolling checksum rejected an update.
    #[error(transparent)]
    Rolling(#[from] RollingError),
    /// Reading the target or writing instructions failed.
    #[error("instruction generation failed: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
}
