//! crates/signature/src/generation.rs
//!
//! Sequential checksum generation over a baseline reader.

use std::io::{self, Read};
use std::num::{NonZeroU32, NonZeroUsize};

use checksums::{RollingChecksum, StrongHashAlgorithm};
use logging::trace_checksum;

use crate::error::SignatureError;
use crate::layout::{BlockLayout, MAX_BLOCK_LEN};
use crate::record::ChecksumRecord;
use crate::set::ChecksumSet;

/// Produces one [`ChecksumRecord`] per baseline block.
///
/// The baseline is read once, front to back. Records are handed to a sink as
/// soon as each block is hashed so memory stays bounded by one block.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChecksumGenerator {
    block_len: NonZeroU32,
    algorithm: StrongHashAlgorithm,
}

impl ChecksumGenerator {
    /// Creates a generator for blocks of `block_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidBlockSize`] when `block_len` exceeds
    /// [`MAX_BLOCK_LEN`].
    pub fn new(block_len: NonZeroU32, algorithm: StrongHashAlgorithm) -> Result<Self, SignatureError> {
        if block_len.get() > MAX_BLOCK_LEN {
            return Err(SignatureError::InvalidBlockSize {
                len: block_len.get(),
                max: MAX_BLOCK_LEN,
            });
        }
        Ok(Self {
            block_len,
            algorithm,
        })
    }

    /// Block length in bytes.
    #[must_use]
    pub const fn block_len(&self) -> NonZeroU32 {
        self.block_len
    }

    /// Strong hash algorithm applied to each block.
    #[must_use]
    pub const fn algorithm(&self) -> StrongHashAlgorithm {
        self.algorithm
    }

    /// Computes the layout for a baseline of `total_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::TooManyBlocks`] when the block count overflows.
    pub fn layout_for(&self, total_len: u64) -> Result<BlockLayout, SignatureError> {
        BlockLayout::new(self.block_len, total_len)
    }

    /// Reads exactly `total_len` bytes from `reader` and emits one record per
    /// block to `sink`, in ascending block order.
    ///
    /// On error, records already passed to the sink do not form a usable set
    /// and must be discarded by the caller.
    ///
    /// # Errors
    ///
    /// - [`SignatureError::Io`] when the reader fails or ends early
    ///   (`UnexpectedEof`).
    /// - [`SignatureError::TrailingData`] when the reader has more than
    ///   `total_len` bytes.
    /// - Any error returned by `sink`, unchanged.
    pub fn generate<R, F>(
        &self,
        mut reader: R,
        total_len: u64,
        mut sink: F,
    ) -> Result<BlockLayout, SignatureError>
    where
        R: Read,
        F: FnMut(ChecksumRecord) -> Result<(), SignatureError>,
    {
        let layout = self.layout_for(total_len)?;
        let mut rolling = RollingChecksum::new(block_len_usize(self.block_len));

        for block in layout.blocks() {
            let mut limited = (&mut reader).take(u64::from(block.len));
            let filled = rolling.reset_from_reader(&mut limited)?;
            if filled != block.len as usize {
                return Err(truncated(block.offset + filled as u64, total_len));
            }
            let (head, tail) = rolling.window_slices();
            let mut hasher = self.algorithm.hasher();
            hasher.update(head);
            hasher.update(tail);
            sink(ChecksumRecord::new(
                block.index,
                rolling.value(),
                hasher.finalize(),
                block.len,
            ))?;
        }

        ensure_drained(&mut reader)?;
        trace_checksum!(
            blocks = layout.block_count(),
            total_len,
            algorithm = %self.algorithm,
            "checksummed baseline"
        );
        Ok(layout)
    }

    /// Generates the complete [`ChecksumSet`] for a baseline.
    ///
    /// # Errors
    ///
    /// Same as [`generate`](Self::generate).
    pub fn generate_set<R: Read>(&self, reader: R, total_len: u64) -> Result<ChecksumSet, SignatureError> {
        let layout = self.layout_for(total_len)?;
        let mut set = ChecksumSet::new(layout, self.algorithm);
        self.generate(reader, total_len, |record| set.push(record))?;
        Ok(set)
    }
}

pub(crate) fn block_len_usize(block_len: NonZeroU32) -> NonZeroUsize {
    NonZeroUsize::MIN.saturating_add(block_len.get() as usize - 1)
}

pub(crate) fn truncated(read: u64, expected: u64) -> SignatureError {
    SignatureError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("baseline ended after {read} of {expected} bytes"),
    ))
}

pub(crate) fn ensure_drained<R: Read>(reader: &mut R) -> Result<(), SignatureError> {
    let mut extra = [0u8; 1];
    loop {
        match reader.read(&mut extra) {
            Ok(0) => return Ok(()),
            Ok(_) => return Err(SignatureError::TrailingData { bytes: 1 }),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
}
