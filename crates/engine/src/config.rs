//! crates/engine/src/config.rs
//! Session configuration.

use std::num::{NonZeroU32, NonZeroUsize};

use checksums::StrongHashAlgorithm;
use matching::InstructionGenerator;
use remote_io::DEFAULT_MAX_FORWARD_SKIP;
use signature::{ChecksumGenerator, DEFAULT_BLOCK_LEN, MAX_BLOCK_LEN};

use crate::error::EngineError;

const DEFAULT_MAX_LITERAL: NonZeroUsize = match NonZeroUsize::new(DEFAULT_BLOCK_LEN.get() as usize) {
    Some(len) => len,
    None => unreachable!(),
};

/// Parameters shared by every phase of a synchronisation session.
///
/// `block_size` and `strong_hash` must be identical on the checksum and the
/// instruction side; both are recorded in the checksum stream so a mismatch
/// is caught before scanning.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "kebab-case"))]
pub struct SyncConfig {
    /// Nominal baseline block length in bytes.
    pub block_size: NonZeroU32,
    /// Digest confirming weak checksum matches.
    pub strong_hash: StrongHashAlgorithm,
    /// Largest literal emitted as one instruction.
    pub max_literal_len: NonZeroUsize,
    /// Hash baseline blocks on the rayon pool.
    pub parallel_checksums: bool,
    /// Largest gap skipped on an open baseline stream before reopening.
    pub max_forward_skip: u64,
    /// Hash target and output and fail when they differ.
    pub verify: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_LEN,
            strong_hash: StrongHashAlgorithm::default(),
            max_literal_len: DEFAULT_MAX_LITERAL,
            parallel_checksums: false,
            max_forward_skip: DEFAULT_MAX_FORWARD_SKIP,
            verify: true,
        }
    }
}

impl SyncConfig {
    /// Sets the block size.
    pub fn with_block_size(mut self, block_size: NonZeroU32) -> Self {
        self.block_size = block_size;
        self
    }

    /// Sets the strong hash algorithm.
    pub fn with_strong_hash(mut self, algorithm: StrongHashAlgorithm) -> Self {
        self.strong_hash = algorithm;
        self
    }

    /// Sets the literal batching limit.
    pub fn with_max_literal_len(mut self, len: NonZeroUsize) -> Self {
        self.max_literal_len = len;
        self
    }

    /// Enables or disables parallel baseline checksumming.
    pub fn with_parallel_checksums(mut self, enabled: bool) -> Self {
        self.parallel_checksums = enabled;
        self
    }

    /// Sets the forward skip limit of baseline sources.
    pub fn with_max_forward_skip(mut self, bytes: u64) -> Self {
        self.max_forward_skip = bytes;
        self
    }

    /// Enables or disables end-to-end verification.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Rejects settings no phase can honour.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.block_size.get() > MAX_BLOCK_LEN {
            return Err(EngineError::Config(format!(
                "block size {} exceeds the maximum of {MAX_BLOCK_LEN} bytes",
                self.block_size
            )));
        }
        Ok(())
    }

    /// Checksum generator for these settings.
    pub fn checksum_generator(&self) -> Result<ChecksumGenerator, EngineError> {
        Ok(ChecksumGenerator::new(self.block_size, self.strong_hash)?)
    }

    /// Instruction generator for these settings.
    #[must_use]
    pub fn instruction_generator(&self) -> InstructionGenerator {
        InstructionGenerator::new(self.block_size, self.strong_hash)
            .with_max_literal_len(self.max_literal_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.block_size.get(), 4096);
        assert_eq!(config.strong_hash, StrongHashAlgorithm::Sha256);
        assert_eq!(config.max_literal_len.get(), 4096);
        assert!(config.verify);
        assert!(!config.parallel_checksums);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oversized_block_is_a_configuration_error() {
        let config =
            SyncConfig::default().with_block_size(NonZeroU32::new(MAX_BLOCK_LEN + 1).unwrap());
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn builders_chain() {
        let config = SyncConfig::default()
            .with_block_size(NonZeroU32::new(512).unwrap())
            .with_strong_hash(StrongHashAlgorithm::Xxh3_128)
            .with_max_literal_len(NonZeroUsize::new(64).unwrap())
            .with_parallel_checksums(true)
            .with_max_forward_skip(0)
            .with_verify(false);
        assert_eq!(config.block_size.get(), 512);
        assert_eq!(config.instruction_generator().max_literal_len().get(), 64);
        assert_eq!(config.checksum_generator().unwrap().block_len().get(), 512);
        assert_eq!(config.max_forward_skip, 0);
        assert!(!config.verify);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_kebab_case_and_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"block-size": 1024, "strong-hash": "xxh3-128"}"#).unwrap();
        assert_eq!(config.block_size.get(), 1024);
        assert_eq!(config.strong_hash, StrongHashAlgorithm::Xxh3_128);
        assert!(config.verify);

        let json = serde_json::to_string(&SyncConfig::default()).unwrap();
        assert!(json.contains("\"strong-hash\":\"sha256\""));
    }
}
