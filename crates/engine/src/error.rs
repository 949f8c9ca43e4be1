//! crates/engine/src/error.rs
//! Session errors and their classification.

use std::io;

use checksums::StrongDigest;
use matching::MatchError;
use protocol::WireError;
use remote_io::SourceError;
use signature::SignatureError;
use thiserror::Error;

/// Broad category of a failure, used to pick an exit status.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// Invalid or inconsistent parameters. Nothing was attempted.
    Configuration,
    /// Inputs disagree with each other: unknown block references, truncated
    /// baselines, malformed checksum sets or a verification mismatch.
    Integrity,
    /// Reading or writing an object failed.
    Io,
}

impl ErrorKind {
    /// Process exit status for the category.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Configuration => 1,
            Self::Integrity => 2,
            Self::Io => 3,
        }
    }
}

/// Errors returned by [`SyncSession`](crate::SyncSession) and
/// [`InstructionReceiver`](crate::InstructionReceiver).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A copy instruction names a block the baseline does not have.
    #[error("copy instruction references block {index}, baseline has {block_count} blocks")]
    UnknownBlock {
        /// Referenced block.
        index: u32,
        /// Blocks in the baseline layout.
        block_count: u32,
    },
    /// Output digest differs from the digest of the target.
    #[error("reconstructed output digest {actual} does not match target digest {expected}")]
    VerificationFailed {
        /// Digest announced for the target.
        expected: StrongDigest,
        /// Digest of the bytes written.
        actual: StrongDigest,
    },
    /// Checksum generation or validation failed.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// Instruction generation failed.
    #[error(transparent)]
    Match(#[from] MatchError),
    /// Reading a baseline range failed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// Decoding or encoding a stream failed.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    /// Category of the failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::UnknownBlock { .. } | Self::VerificationFailed { .. } => ErrorKind::Integrity,
            Self::Signature(error) => signature_kind(error),
            Self::Match(error) => match error {
                MatchError::BlockSizeMismatch { .. } | MatchError::AlgorithmMismatch { .. } => {
                    ErrorKind::Configuration
                }
                MatchError::Io(_) => ErrorKind::Io,
                _ => ErrorKind::Integrity,
            },
            Self::Source(error) => match error {
                SourceError::Truncated { .. } => ErrorKind::Integrity,
                SourceError::Slice(_) | SourceError::Io(_) => ErrorKind::Io,
            },
            Self::Wire(error) => match error {
                WireError::Signature(inner) => signature_kind(inner),
                WireError::DigestMismatch { .. } => ErrorKind::Configuration,
                _ => ErrorKind::Io,
            },
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Exit status for the failure.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }
}

fn signature_kind(error: &SignatureError) -> ErrorKind {
    match error {
        SignatureError::InvalidBlockSize { .. } | SignatureError::TooManyBlocks(_) => {
            ErrorKind::Configuration
        }
        SignatureError::Io(_) => ErrorKind::Io,
        _ => ErrorKind::Integrity,
    }
}
