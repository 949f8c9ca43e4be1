//! crates/signature/src/set.rs
//!
//! Materialised checksum set used by the target side.

use checksums::StrongHashAlgorithm;

use crate::error::SignatureError;
use crate::layout::BlockLayout;
use crate::record::ChecksumRecord;

/// The ordered checksum records of one baseline, with the parameters that
/// produced them.
///
/// Records are validated on insertion: indices must ascend contiguously from
/// zero, lengths must follow the layout and digests must have the width of
/// the recorded algorithm.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChecksumSet {
    layout: BlockLayout,
    algorithm: StrongHashAlgorithm,
    records: Vec<ChecksumRecord>,
}

impl ChecksumSet {
    /// Creates an empty set for `layout`.
    #[must_use]
    pub fn new(layout: BlockLayout, algorithm: StrongHashAlgorithm) -> Self {
        // Wire input controls the layout, so do not trust its block count for
        // the initial allocation.
        let capacity = (layout.block_count() as usize).min(1 << 16);
        Self {
            layout,
            algorithm,
            records: Vec::with_capacity(capacity),
        }
    }

    /// Appends the next record.
    ///
    /// # Errors
    ///
    /// - [`SignatureError::UnexpectedBlock`] when the index is not the next one.
    /// - [`SignatureError::BlockLength`] when the length disagrees with the layout.
    /// - [`SignatureError::DigestWidth`] when the digest width disagrees with the algorithm.
    pub fn push(&mut self, record: ChecksumRecord) -> Result<(), SignatureError> {
        let expected = self.records.len() as u32;
        let Some(block) = self.layout.block(expected) else {
            return Err(SignatureError::TrailingData {
                bytes: u64::from(record.len()),
            });
        };
        if record.block_index() != expected {
            return Err(SignatureError::UnexpectedBlock {
                expected,
                found: record.block_index(),
            });
        }
        if record.len() != block.len {
            return Err(SignatureError::BlockLength {
                index: expected,
                expected: block.len,
                found: record.len(),
            });
        }
        let width = self.algorithm.digest_len();
        if record.strong().len() != width {
            return Err(SignatureError::DigestWidth {
                algorithm: self.algorithm,
                expected: width,
                found: record.strong().len(),
            });
        }
        self.records.push(record);
        Ok(())
    }

    /// Verifies that every block of the layout has a record.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Incomplete`] when records are missing.
    pub fn ensure_complete(&self) -> Result<(), SignatureError> {
        let found = self.records.len() as u32;
        if found == self.layout.block_count() {
            Ok(())
        } else {
            Err(SignatureError::Incomplete {
                expected: self.layout.block_count(),
                found,
            })
        }
    }

    /// Block layout of the baseline.
    #[must_use]
    pub const fn layout(&self) -> BlockLayout {
        self.layout
    }

    /// Strong hash algorithm used for every record.
    #[must_use]
    pub const fn algorithm(&self) -> StrongHashAlgorithm {
        self.algorithm
    }

    /// Records in ascending block order.
    #[must_use]
    pub fn records(&self) -> &[ChecksumRecord] {
        &self.records
    }

    /// Returns the record for `index`.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&ChecksumRecord> {
        self.records.get(index as usize)
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Reports whether the set holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over the records in ascending block order.
    pub fn iter(&self) -> std::slice::Iter<'_, ChecksumRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a ChecksumSet {
    type Item = &'a ChecksumRecord;
    type IntoIter = std::slice::Iter<'a, ChecksumRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
