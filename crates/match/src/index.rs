//! Weak-checksum lookup table over a baseline's checksum records.

use checksums::{StrongDigest, StrongHashAlgorithm};
use rustc_hash::FxHashMap;
use signature::{BlockLayout, ChecksumRecord, ChecksumSet};

use crate::error::MatchError;

/// Maps weak checksums to the baseline blocks that carry them.
///
/// Candidate lists are kept in ascending block order, so the first candidate
/// that survives strong verification is always the lowest block index.
#[derive(Clone, Debug)]
pub struct ChecksumIndex {
    layout: BlockLayout,
    algorithm: StrongHashAlgorithm,
    blocks: Vec<IndexedBlock>,
    by_weak: FxHashMap<u32, Vec<u32>>,
}

#[derive(Clone, Copy, Debug)]
struct IndexedBlock {
    strong: StrongDigest,
    len: u32,
}

impl ChecksumIndex {
    /// Builds an index over a validated checksum set.
    #[must_use]
    pub fn from_set(set: &ChecksumSet) -> Self {
        let mut index = Self::empty(set.layout(), set.algorithm());
        for record in set {
            index.insert(record);
        }
        index
    }

    /// Builds an index from raw records, validating them against `layout`.
    ///
    /// # Errors
    ///
    /// - [`MatchError::NonContiguousIndex`] when indices do not ascend from zero
    ///   or the records do not cover every block.
    /// - [`MatchError::InvalidBlockLength`] when a length disagrees with the layout.
    pub fn from_records<I>(
        layout: BlockLayout,
        algorithm: StrongHashAlgorithm,
        records: I,
    ) -> Result<Self, MatchError>
    where
        I: IntoIterator<Item = ChecksumRecord>,
    {
        let mut index = Self::empty(layout, algorithm);
        for record in records {
            let expected = index.blocks.len() as u32;
            if record.block_index() != expected {
                return Err(MatchError::NonContiguousIndex {
                    expected,
                    found: record.block_index(),
                });
            }
            let block = layout.block(expected).ok_or(MatchError::NonContiguousIndex {
                expected: layout.block_count(),
                found: record.block_index(),
            })?;
            if block.len != record.len() {
                return Err(MatchError::InvalidBlockLength {
                    block: expected,
                    expected: block.len,
                    found: record.len(),
                });
            }
            index.insert(&record);
        }
        let found = index.blocks.len() as u32;
        if found != layout.block_count() {
            return Err(MatchError::NonContiguousIndex {
                expected: layout.block_count(),
                found,
            });
        }
        Ok(index)
    }

    fn empty(layout: BlockLayout, algorithm: StrongHashAlgorithm) -> Self {
        let capacity = (layout.block_count() as usize).min(1 << 16);
        Self {
            layout,
            algorithm,
            blocks: Vec::with_capacity(capacity),
            by_weak: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    fn insert(&mut self, record: &ChecksumRecord) {
        let block_index = self.blocks.len() as u32;
        self.blocks.push(IndexedBlock {
            strong: *record.strong(),
            len: record.len(),
        });
        self.by_weak.entry(record.weak()).or_default().push(block_index);
    }

    /// Block layout of the indexed baseline.
    #[must_use]
    pub const fn layout(&self) -> BlockLayout {
        self.layout
    }

    /// Strong hash algorithm of the indexed records.
    #[must_use]
    pub const fn algorithm(&self) -> StrongHashAlgorithm {
        self.algorithm
    }

    /// Number of indexed blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Reports whether the baseline had no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Length of the baseline's final block when it is shorter than a full block.
    #[must_use]
    pub fn short_block_len(&self) -> Option<u32> {
        match self.layout.remainder() {
            0 => None,
            remainder => Some(remainder),
        }
    }

    /// Blocks whose weak checksum equals `weak`, in ascending order.
    #[must_use]
    pub fn candidates(&self, weak: u32) -> &[u32] {
        self.by_weak.get(&weak).map_or(&[], Vec::as_slice)
    }

    /// Finds the lowest block with the given weak checksum and length whose
    /// strong digest equals the one produced by `strong`.
    ///
    /// `strong` is only called when at least one candidate has the right
    /// length, and at most once.
    pub fn find<F>(&self, weak: u32, len: usize, strong: F) -> Option<u32>
    where
        F: FnOnce() -> StrongDigest,
    {
        let mut strong = Some(strong);
        let mut digest: Option<StrongDigest> = None;
        for &candidate in self.candidates(weak) {
            let block = &self.blocks[candidate as usize];
            if block.len as usize != len {
                continue;
            }
            if digest.is_none() {
                digest = strong.take().map(|compute| compute());
            }
            if digest.as_ref() == Some(&block.strong) {
                return Some(candidate);
            }
        }
        None
    }
}
