//! crates/engine/src/receiver.rs
//!
//! Applies an instruction stream to a baseline and writes the reconstruction.

use std::io::{self, Write};

use checksums::{StrongDigest, StrongHashAlgorithm, StrongHasher};
use logging::trace_recv;
use matching::Instruction;
use remote_io::{ObjectWrite, RemoteByteSource};
use signature::BlockLayout;

use crate::error::EngineError;
use crate::verify::Tee;

/// Counters describing what a receiver wrote.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReceiverStats {
    /// Copy instructions applied.
    pub copies: u64,
    /// Non-empty literal instructions applied.
    pub literals: u64,
    /// Bytes copied from the baseline.
    pub copied_bytes: u64,
    /// Bytes written from literals.
    pub literal_bytes: u64,
    /// Baseline reads issued; adjacent copies share one read.
    pub copy_runs: u64,
}

/// Outcome of a completed reconstruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReceiveSummary {
    /// Bytes committed to the output.
    pub output_len: u64,
    /// Digest of the output when verification was enabled.
    pub digest: Option<StrongDigest>,
    /// Receiver counters.
    pub stats: ReceiverStats,
}

#[derive(Clone, Copy, Debug)]
struct PendingRun {
    first: u32,
    count: u32,
}

impl PendingRun {
    const fn next_index(self) -> u32 {
        self.first + self.count
    }
}

/// Rebuilds a target from baseline blocks and literal bytes.
///
/// Instructions are applied in order. Copies of consecutive block indices are
/// merged into a single ranged read of the baseline, which keeps a remote
/// baseline on one stream while the target mostly matches it. Output is
/// committed by [`finish`](Self::finish); on any error, or when the receiver
/// is dropped unfinished, the partial output is discarded.
pub struct InstructionReceiver {
    baseline: RemoteByteSource,
    layout: BlockLayout,
    sink: Option<Box<dyn ObjectWrite>>,
    pending: Option<PendingRun>,
    hasher: Option<StrongHasher>,
    stats: ReceiverStats,
}

impl InstructionReceiver {
    /// Creates a receiver reading blocks of `layout` from `baseline` and
    /// writing to `sink`.
    pub fn new(baseline: RemoteByteSource, layout: BlockLayout, sink: Box<dyn ObjectWrite>) -> Self {
        Self {
            baseline,
            layout,
            sink: Some(sink),
            pending: None,
            hasher: None,
            stats: ReceiverStats::default(),
        }
    }

    /// Hashes the output with `algorithm` so it can be checked by
    /// [`finish_verified`](Self::finish_verified).
    #[must_use]
    pub fn with_verification(mut self, algorithm: StrongHashAlgorithm) -> Self {
        self.hasher = Some(StrongHasher::new(algorithm));
        self
    }

    /// Baseline layout copies are resolved against.
    #[must_use]
    pub const fn layout(&self) -> BlockLayout {
        self.layout
    }

    /// Counters so far. Copies still waiting to be merged are counted but
    /// their bytes are not.
    #[must_use]
    pub const fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// Applies one instruction.
    ///
    /// # Errors
    ///
    /// - [`EngineError::UnknownBlock`] when a copy names a block past the
    ///   end of the layout.
    /// - [`EngineError::Source`] when the baseline read fails or ends early.
    /// - [`EngineError::Io`] when writing fails or the receiver already
    ///   failed.
    ///
    /// After an error the output has been aborted and every later call fails.
    pub fn receive(&mut self, instruction: Instruction) -> Result<(), EngineError> {
        self.ensure_open()?;
        let result = self.apply(instruction);
        if result.is_err() {
            self.abort();
        }
        result
    }

    /// Commits the output without verification.
    ///
    /// # Errors
    ///
    /// Same as [`finish_verified`](Self::finish_verified).
    pub fn finish(self) -> Result<ReceiveSummary, EngineError> {
        self.finish_verified(None)
    }

    /// Flushes pending copies, checks the output digest against `expected`
    /// and commits the output.
    ///
    /// # Errors
    ///
    /// - [`EngineError::VerificationFailed`] when the digests differ. The
    ///   output is aborted, not committed.
    /// - [`EngineError::Config`] when `expected` is given but the receiver
    ///   was not built [`with_verification`](Self::with_verification).
    /// - Any error [`receive`](Self::receive) can return for the final run.
    pub fn finish_verified(
        mut self,
        expected: Option<&StrongDigest>,
    ) -> Result<ReceiveSummary, EngineError> {
        let result = self.complete(expected);
        if result.is_err() {
            self.abort();
        }
        result
    }

    fn apply(&mut self, instruction: Instruction) -> Result<(), EngineError> {
        match instruction {
            Instruction::Copy { block_index } => {
                let block_count = self.layout.block_count();
                if block_index >= block_count {
                    return Err(EngineError::UnknownBlock {
                        index: block_index,
                        block_count,
                    });
                }
                self.stats.copies += 1;
                match self.pending.as_mut() {
                    Some(run) if run.next_index() == block_index => run.count += 1,
                    _ => {
                        self.flush_run()?;
                        self.pending = Some(PendingRun {
                            first: block_index,
                            count: 1,
                        });
                    }
                }
                Ok(())
            }
            Instruction::Literal(bytes) => {
                self.flush_run()?;
                if bytes.is_empty() {
                    return Ok(());
                }
                let sink = self.sink.as_deref_mut().ok_or_else(closed)?;
                let mut tee = Tee::new(sink, self.hasher.as_mut());
                tee.write_all(&bytes)?;
                self.stats.literals += 1;
                self.stats.literal_bytes += tee.written();
                Ok(())
            }
        }
    }

    fn flush_run(&mut self) -> Result<(), EngineError> {
        let Some(run) = self.pending.take() else {
            return Ok(());
        };
        let (offset, len) =
            self.layout
                .span(run.first, run.count)
                .ok_or(EngineError::UnknownBlock {
                    index: run.next_index() - 1,
                    block_count: self.layout.block_count(),
                })?;
        let view = self.baseline.slice(offset, len).map_err(remote_io::SourceError::from)?;
        let sink = self.sink.as_deref_mut().ok_or_else(closed)?;
        let mut tee = Tee::new(sink, self.hasher.as_mut());
        let copied = view.copy_to(&mut tee)?;
        trace_recv!(
            first = run.first,
            blocks = run.count,
            offset,
            len = copied,
            "copied baseline run"
        );
        self.stats.copy_runs += 1;
        self.stats.copied_bytes += copied;
        Ok(())
    }

    fn complete(&mut self, expected: Option<&StrongDigest>) -> Result<ReceiveSummary, EngineError> {
        self.ensure_open()?;
        self.flush_run()?;

        let digest = self.hasher.take().map(StrongHasher::finalize);
        if let Some(expected) = expected {
            let Some(actual) = digest else {
                return Err(EngineError::Config(
                    "a target digest was supplied but output hashing is disabled".into(),
                ));
            };
            if actual != *expected {
                return Err(EngineError::VerificationFailed {
                    expected: *expected,
                    actual,
                });
            }
        }

        let sink = self.sink.take().ok_or_else(closed)?;
        let output_len = sink.finish()?;
        self.baseline.release()?;
        trace_recv!(
            output_len,
            copies = self.stats.copies,
            runs = self.stats.copy_runs,
            literals = self.stats.literals,
            verified = expected.is_some(),
            "reconstruction committed"
        );
        Ok(ReceiveSummary {
            output_len,
            digest,
            stats: self.stats,
        })
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.sink.is_some() {
            Ok(())
        } else {
            Err(closed().into())
        }
    }

    fn abort(&mut self) {
        self.pending = None;
        if let Some(sink) = self.sink.take() {
            if let Err(error) = sink.abort() {
                trace_recv!(%error, "discarding partial output failed");
            }
        }
        if let Err(error) = self.baseline.release() {
            trace_recv!(%error, "releasing baseline stream failed");
        }
    }
}

impl Drop for InstructionReceiver {
    fn drop(&mut self) {
        if self.sink.is_some() {
            self.abort();
        }
    }
}

impl std::fmt::Debug for InstructionReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstructionReceiver")
            .field("baseline", &self.baseline)
            .field("layout", &self.layout)
            .field("open", &self.sink.is_some())
            .field("pending", &self.pending)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn closed() -> io::Error {
    io::Error::other("instruction receiver is already finished or failed")
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::sync::Arc;

    use remote_io::{InMemory, WritableStore};

    use super::*;
    use crate::error::ErrorKind;

    const BASELINE: &[u8] = b"0123456789abcdefghij";

    fn setup(block: u32) -> (InstructionReceiver, InMemory, RemoteByteSource) {
        let baseline = RemoteByteSource::new(Arc::new(InMemory::new(BASELINE)));
        let layout = BlockLayout::new(NonZeroU32::new(block).unwrap(), BASELINE.len() as u64).unwrap();
        let output = InMemory::default();
        let receiver = InstructionReceiver::new(baseline.clone(), layout, output.create_writer().unwrap());
        (receiver, output, baseline)
    }

    fn copy(block_index: u32) -> Instruction {
        Instruction::Copy { block_index }
    }

    #[test]
    fn applies_copies_and_literals_in_order() {
        let (mut receiver, output, _) = setup(5);
        for instruction in [
            copy(3),
            Instruction::Literal(b"--".to_vec()),
            copy(0),
            copy(1),
            Instruction::Literal(Vec::new()),
        ] {
            receiver.receive(instruction).unwrap();
        }
        let summary = receiver.finish().unwrap();
        assert_eq!(output.to_vec().unwrap(), b"fghij--0123456789");
        assert_eq!(summary.output_len, 17);
        assert_eq!(
            summary.stats,
            ReceiverStats {
                copies: 3,
                literals: 1,
                copied_bytes: 15,
                literal_bytes: 2,
                copy_runs: 2,
            }
        );
    }

    #[test]
    fn adjacent_copies_share_one_read() {
        let (mut receiver, output, baseline) = setup(4);
        for index in 0..5 {
            receiver.receive(copy(index)).unwrap();
        }
        let summary = receiver.finish().unwrap();
        assert_eq!(output.to_vec().unwrap(), BASELINE);
        assert_eq!(summary.stats.copy_runs, 1);
        assert_eq!(baseline.stats().unwrap().opens, 1);
    }

    #[test]
    fn short_final_block_is_copied_whole() {
        let (mut receiver, output, _) = setup(8);
        receiver.receive(copy(2)).unwrap();
        receiver.receive(copy(0)).unwrap();
        receiver.finish().unwrap();
        assert_eq!(output.to_vec().unwrap(), b"ghij01234567");
    }

    #[test]
    fn unknown_block_aborts_output() {
        let (mut receiver, output, _) = setup(5);
        receiver.receive(Instruction::Literal(b"partial".to_vec())).unwrap();
        let error = receiver.receive(copy(4)).unwrap_err();
        assert!(matches!(
            error,
            EngineError::UnknownBlock {
                index: 4,
                block_count: 4
            }
        ));
        assert_eq!(error.kind(), ErrorKind::Integrity);
        assert!(receiver.receive(copy(0)).is_err());
        assert!(receiver.finish().is_err());
        assert!(output.to_vec().unwrap().is_empty());
    }

    #[test]
    fn truncated_baseline_is_an_integrity_error() {
        let store = InMemory::new(&BASELINE[..12]);
        let baseline = RemoteByteSource::new(Arc::new(store));
        let layout = BlockLayout::new(NonZeroU32::new(5).unwrap(), BASELINE.len() as u64).unwrap();
        let output = InMemory::default();
        let mut receiver = InstructionReceiver::new(baseline, layout, output.create_writer().unwrap());
        receiver.receive(copy(2)).unwrap();
        let error = receiver.finish().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Integrity, "{error}");
        assert!(output.to_vec().unwrap().is_empty());
    }

    #[test]
    fn verification_accepts_matching_digest() {
        let (receiver, output, _) = setup(5);
        let mut receiver = receiver.with_verification(StrongHashAlgorithm::Sha256);
        receiver.receive(copy(1)).unwrap();
        receiver.receive(Instruction::Literal(b"!".to_vec())).unwrap();
        let expected = StrongHashAlgorithm::Sha256.digest(b"56789!");
        let summary = receiver.finish_verified(Some(&expected)).unwrap();
        assert_eq!(summary.digest, Some(expected));
        assert_eq!(output.to_vec().unwrap(), b"56789!");
    }

    #[test]
    fn verification_mismatch_discards_output() {
        let (receiver, output, _) = setup(5);
        let mut receiver = receiver.with_verification(StrongHashAlgorithm::Sha256);
        receiver.receive(copy(1)).unwrap();
        let expected = StrongHashAlgorithm::Sha256.digest(b"something else");
        let error = receiver.finish_verified(Some(&expected)).unwrap_err();
        assert!(matches!(error, EngineError::VerificationFailed { .. }));
        assert_eq!(error.kind(), ErrorKind::Integrity);
        assert!(output.to_vec().unwrap().is_empty());
    }

    #[test]
    fn expected_digest_without_hashing_is_rejected() {
        let (receiver, _, _) = setup(5);
        let expected = StrongHashAlgorithm::Sha256.digest(b"");
        let error = receiver.finish_verified(Some(&expected)).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn dropping_unfinished_receiver_leaves_output_untouched() {
        let output = InMemory::new(b"previous".to_vec());
        {
            let baseline = RemoteByteSource::new(Arc::new(InMemory::new(BASELINE)));
            let layout = BlockLayout::new(NonZeroU32::new(5).unwrap(), 20).unwrap();
            let mut receiver =
                InstructionReceiver::new(baseline, layout, output.create_writer().unwrap());
            receiver.receive(copy(0)).unwrap();
            receiver.receive(Instruction::Literal(b"x".to_vec())).unwrap();
        }
        assert_eq!(output.to_vec().unwrap(), b"previous");
    }

    #[test]
    fn empty_layout_produces_empty_output() {
        let baseline = RemoteByteSource::new(Arc::new(InMemory::default()));
        let layout = BlockLayout::new(NonZeroU32::new(5).unwrap(), 0).unwrap();
        let output = InMemory::new(b"stale".to_vec());
        let mut receiver = InstructionReceiver::new(baseline, layout, output.create_writer().unwrap());
        assert!(receiver.receive(copy(0)).is_err());

        let baseline = RemoteByteSource::new(Arc::new(InMemory::default()));
        let receiver = InstructionReceiver::new(baseline, layout, output.create_writer().unwrap());
        assert_eq!(receiver.finish().unwrap().output_len, 0);
        assert!(output.to_vec().unwrap().is_empty());
    }
}
