//! crates/signature/src/layout.rs
//!
//! Partitioning of a baseline into fixed-size blocks.

use core::num::NonZeroU32;

use crate::error::SignatureError;

/// Largest block length accepted by the generators (1 GiB).
pub const MAX_BLOCK_LEN: u32 = 1 << 30;

/// Default block length used when the caller does not choose one.
pub const DEFAULT_BLOCK_LEN: NonZeroU32 = match NonZeroU32::new(4096) {
    Some(len) => len,
    None => unreachable!(),
};

/// Describes how a baseline of `total_len` bytes splits into blocks.
///
/// Blocks are contiguous and non-overlapping. Every block is `block_len`
/// bytes except possibly the last, which holds the remainder.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockLayout {
    block_len: NonZeroU32,
    total_len: u64,
    block_count: u32,
}

/// Position of one block within the baseline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockRange {
    /// Zero-based block index.
    pub index: u32,
    /// Byte offset of the first byte of the block.
    pub offset: u64,
    /// Number of bytes in the block.
    pub len: u32,
}

impl BlockLayout {
    /// Creates the layout for a baseline of `total_len` bytes.
    ///
    /// # Errors
    ///
    /// - [`SignatureError::InvalidBlockSize`] when `block_len` exceeds [`MAX_BLOCK_LEN`].
    /// - [`SignatureError::TooManyBlocks`] when the block count does not fit in `u32`.
    pub fn new(block_len: NonZeroU32, total_len: u64) -> Result<Self, SignatureError> {
        if block_len.get() > MAX_BLOCK_LEN {
            return Err(SignatureError::InvalidBlockSize {
                len: block_len.get(),
                max: MAX_BLOCK_LEN,
            });
        }
        let count = total_len.div_ceil(u64::from(block_len.get()));
        let block_count = u32::try_from(count).map_err(|_| SignatureError::TooManyBlocks(count))?;
        Ok(Self {
            block_len,
            total_len,
            block_count,
        })
    }

    /// Returns the nominal block length in bytes.
    #[inline]
    #[must_use]
    pub const fn block_len(self) -> NonZeroU32 {
        self.block_len
    }

    /// Returns the total baseline length in bytes.
    #[inline]
    #[must_use]
    pub const fn total_len(self) -> u64 {
        self.total_len
    }

    /// Returns the number of blocks, `ceil(total_len / block_len)`.
    #[inline]
    #[must_use]
    pub const fn block_count(self) -> u32 {
        self.block_count
    }

    /// Returns the byte count of a short final block, or zero when every block is full.
    #[must_use]
    pub const fn remainder(self) -> u32 {
        (self.total_len % self.block_len.get() as u64) as u32
    }

    /// Length of the final block, or `None` for an empty baseline.
    #[must_use]
    pub const fn last_block_len(self) -> Option<u32> {
        if self.block_count == 0 {
            return None;
        }
        match self.remainder() {
            0 => Some(self.block_len.get()),
            partial => Some(partial),
        }
    }

    /// Returns the range covered by block `index`, or `None` when out of bounds.
    #[must_use]
    pub fn block(self, index: u32) -> Option<BlockRange> {
        if index >= self.block_count {
            return None;
        }
        let offset = u64::from(index) * u64::from(self.block_len.get());
        let len = if index + 1 == self.block_count {
            self.last_block_len()?
        } else {
            self.block_len.get()
        };
        Some(BlockRange { index, offset, len })
    }

    /// Returns `(offset, len)` of `count` consecutive blocks starting at `first`.
    ///
    /// Returns `None` when the run is empty or extends past the last block.
    #[must_use]
    pub fn span(self, first: u32, count: u32) -> Option<(u64, u64)> {
        let last = first.checked_add(count)?.checked_sub(1)?;
        let start = self.block(first)?;
        let end = self.block(last)?;
        Some((start.offset, end.offset + u64::from(end.len) - start.offset))
    }

    /// Iterates over every block in ascending index order.
    pub fn blocks(self) -> impl Iterator<Item = BlockRange> {
        (0..self.block_count).filter_map(move |index| self.block(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(block: u32, total: u64) -> BlockLayout {
        BlockLayout::new(NonZeroU32::new(block).unwrap(), total).unwrap()
    }

    #[test]
    fn empty_baseline_has_no_blocks() {
        let layout = layout(4, 0);
        assert_eq!(layout.block_count(), 0);
        assert_eq!(layout.last_block_len(), None);
        assert_eq!(layout.block(0), None);
        assert_eq!(layout.blocks().count(), 0);
    }

    #[test]
    fn exact_multiple_has_full_last_block() {
        let layout = layout(4, 12);
        assert_eq!(layout.block_count(), 3);
        assert_eq!(layout.remainder(), 0);
        assert_eq!(layout.last_block_len(), Some(4));
        assert_eq!(
            layout.block(2),
            Some(BlockRange {
                index: 2,
                offset: 8,
                len: 4
            })
        );
    }

    #[test]
    fn remainder_forms_short_last_block() {
        let layout = layout(4, 10);
        assert_eq!(layout.block_count(), 3);
        assert_eq!(layout.last_block_len(), Some(2));
        assert_eq!(layout.block(2).map(|b| b.len), Some(2));
        assert_eq!(layout.block(3), None);
    }

    #[test]
    fn blocks_cover_baseline_exactly() {
        let layout = layout(7, 100);
        let mut expected_offset = 0;
        for block in layout.blocks() {
            assert_eq!(block.offset, expected_offset);
            expected_offset += u64::from(block.len);
        }
        assert_eq!(expected_offset, 100);
    }

    #[test]
    fn span_covers_consecutive_blocks() {
        let layout = layout(4, 10);
        assert_eq!(layout.span(0, 3), Some((0, 10)));
        assert_eq!(layout.span(1, 1), Some((4, 4)));
        assert_eq!(layout.span(1, 3), None);
        assert_eq!(layout.span(0, 0), None);
    }

    #[test]
    fn oversized_block_is_rejected() {
        let err = BlockLayout::new(NonZeroU32::new(MAX_BLOCK_LEN + 1).unwrap(), 1).unwrap_err();
        assert!(matches!(err, SignatureError::InvalidBlockSize { .. }));
    }

    #[test]
    fn block_count_must_fit_u32() {
        let err = BlockLayout::new(NonZeroU32::new(1).unwrap(), u64::from(u32::MAX) + 1)
            .unwrap_err();
        assert!(matches!(err, SignatureError::TooManyBlocks(_)));
    }
}
