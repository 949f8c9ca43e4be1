//! crates/signature/src/parallel.rs
//!
//! Parallel checksum generation using rayon.
//!
//! Blocks are independent, so their strong digests can be computed on any
//! thread. The generator reads a bounded batch of blocks into one buffer,
//! hashes the batch with rayon and then emits the batch's records in
//! ascending index order before reading the next one. Memory is therefore
//! bounded by the batch size rather than the baseline size.

use std::io::Read;
use std::num::{NonZeroU32, NonZeroUsize};

use checksums::{RollingDigest, StrongHashAlgorithm};
use logging::trace_checksum;
use rayon::prelude::*;

use crate::error::SignatureError;
use crate::generation::{ChecksumGenerator, ensure_drained, truncated};
use crate::layout::BlockLayout;
use crate::record::ChecksumRecord;
use crate::set::ChecksumSet;

/// Default number of blocks hashed per batch.
pub const DEFAULT_BATCH_BLOCKS: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(blocks) => blocks,
    None => unreachable!(),
};

/// Upper bound on the bytes buffered for one batch.
pub const MAX_BATCH_BYTES: usize = 64 * 1024 * 1024;

/// Checksum generator that hashes batches of blocks in parallel.
///
/// Produces exactly the records of [`ChecksumGenerator`] in the same order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ParallelChecksumGenerator {
    inner: ChecksumGenerator,
    batch_blocks: NonZeroUsize,
}

impl ParallelChecksumGenerator {
    /// Creates a parallel generator with [`DEFAULT_BATCH_BLOCKS`] blocks per batch.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidBlockSize`] for oversized blocks.
    pub fn new(block_len: NonZeroU32, algorithm: StrongHashAlgorithm) -> Result<Self, SignatureError> {
        Ok(Self::from_sequential(ChecksumGenerator::new(
            block_len, algorithm,
        )?))
    }

    /// Wraps an existing sequential generator.
    #[must_use]
    pub const fn from_sequential(inner: ChecksumGenerator) -> Self {
        Self {
            inner,
            batch_blocks: DEFAULT_BATCH_BLOCKS,
        }
    }

    /// Sets the number of blocks hashed per batch.
    #[must_use]
    pub const fn with_batch_blocks(mut self, batch_blocks: NonZeroUsize) -> Self {
        self.batch_blocks = batch_blocks;
        self
    }

    /// Blocks per batch after applying [`MAX_BATCH_BYTES`].
    #[must_use]
    pub fn effective_batch_blocks(&self) -> usize {
        let block_len = self.inner.block_len().get() as usize;
        self.batch_blocks.get().min(MAX_BATCH_BYTES / block_len).max(1)
    }

    /// Parallel counterpart of [`ChecksumGenerator::generate`].
    ///
    /// # Errors
    ///
    /// Same as [`ChecksumGenerator::generate`].
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
        let layout = self.inner.layout_for(total_len)?;
        let algorithm = self.inner.algorithm();
        let block_len = layout.block_len().get() as usize;
        let batch_blocks = self.effective_batch_blocks();
        let mut buffer = Vec::new();
        let mut consumed: u64 = 0;
        let mut next_index: u32 = 0;

        while consumed < total_len {
            let batch_len = (total_len - consumed).min((batch_blocks * block_len) as u64) as usize;
            buffer.resize(batch_len, 0);
            read_full(&mut reader, &mut buffer, consumed, total_len)?;

            let first = next_index;
            let records: Vec<ChecksumRecord> = buffer
                .par_chunks(block_len)
                .enumerate()
                .map(|(offset, chunk)| {
                    ChecksumRecord::new(
                        first + offset as u32,
                        RollingDigest::from_bytes(chunk).value(),
                        algorithm.digest(chunk),
                        chunk.len() as u32,
                    )
                })
                .collect();

            next_index += records.len() as u32;
            consumed += batch_len as u64;
            for record in records {
                sink(record)?;
            }
        }

        ensure_drained(&mut reader)?;
        trace_checksum!(
            blocks = layout.block_count(),
            total_len,
            batch_blocks,
            "checksummed baseline in parallel"
        );
        Ok(layout)
    }

    /// Parallel counterpart of [`ChecksumGenerator::generate_set`].
    ///
    /// # Errors
    ///
    /// Same as [`ChecksumGenerator::generate`].
    pub fn generate_set<R: Read>(&self, reader: R, total_len: u64) -> Result<ChecksumSet, SignatureError> {
        let layout = self.inner.layout_for(total_len)?;
        let mut set = ChecksumSet::new(layout, self.inner.algorithm());
        self.generate(reader, total_len, |record| set.push(record))?;
        Ok(set)
    }
}

fn read_full<R: Read>(
    reader: &mut R,
    buffer: &mut [u8],
    consumed: u64,
    total_len: u64,
) -> Result<(), SignatureError> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => return Err(truncated(consumed + filled as u64, total_len)),
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
