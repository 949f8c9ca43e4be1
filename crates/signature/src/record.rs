//! crates/signature/src/record.rs
//!
//! Checksum record describing one baseline block.

use checksums::StrongDigest;

/// Weak and strong checksums of one baseline block.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ChecksumRecord {
    block_index: u32,
    weak: u32,
    strong: StrongDigest,
    len: u32,
}

impl ChecksumRecord {
    /// Creates a record from its components.
    #[must_use]
    pub const fn new(block_index: u32, weak: u32, strong: StrongDigest, len: u32) -> Self {
        Self {
            block_index,
            weak,
            strong,
            len,
        }
    }

    /// Zero-based index of the block within the baseline.
    #[inline]
    #[must_use]
    pub const fn block_index(&self) -> u32 {
        self.block_index
    }

    /// Packed rolling checksum of the block.
    #[inline]
    #[must_use]
    pub const fn weak(&self) -> u32 {
        self.weak
    }

    /// Strong digest of the block.
    #[inline]
    #[must_use]
    pub const fn strong(&self) -> &StrongDigest {
        &self.strong
    }

    /// Number of bytes in the block.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// Reports whether the block is empty. Generated records never are.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}
