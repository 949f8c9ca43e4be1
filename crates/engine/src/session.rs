//! crates/engine/src/session.rs
//!
//! Drives checksum generation, instruction generation and reconstruction
//! with one set of parameters.

use std::io::{self, BufReader, Read, Write};
use std::num::NonZeroU32;
use std::sync::Arc;

use checksums::StrongDigest;
use logging::trace_session;
use matching::{ChecksumIndex, Instruction, InstructionStats, MatchError};
use protocol::{InstructionReader, InstructionWriter, TargetDigest};
use remote_io::{ObjectWrite, RangeReadable, RemoteByteSource, SourceStats, WritableStore};
use signature::{BlockLayout, ChecksumSet};

use crate::config::SyncConfig;
use crate::error::EngineError;
use crate::receiver::{InstructionReceiver, ReceiveSummary, ReceiverStats};
use crate::verify::HashingReader;

const STREAM_BUFFER: usize = 256 * 1024;

/// Result of scanning a target against a checksum set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InstructionSummary {
    /// Instruction counters.
    pub stats: InstructionStats,
    /// Bytes read from the target.
    pub target_len: u64,
    /// Digest of the target when verification is enabled.
    pub target_digest: Option<TargetDigest>,
}

/// Everything a completed [`SyncSession::synchronize`] observed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SyncReport {
    /// Blocks in the baseline layout.
    pub block_count: u32,
    /// Baseline length in bytes.
    pub baseline_len: u64,
    /// Target length in bytes.
    pub target_len: u64,
    /// Output length in bytes; equals `target_len` on success.
    pub output_len: u64,
    /// Instruction generation counters.
    pub instructions: InstructionStats,
    /// Reconstruction counters.
    pub receiver: ReceiverStats,
    /// Baseline stream usage during reconstruction.
    pub source: SourceStats,
    /// Verified digest of the output, when verification is enabled.
    pub digest: Option<TargetDigest>,
}

/// One synchronisation configuration applied to any number of objects.
#[derive(Clone, Debug, Default)]
pub struct SyncSession {
    config: SyncConfig,
}

impl SyncSession {
    /// Validates `config` and creates a session.
    pub fn new(config: SyncConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Session parameters.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Wraps `store` in a source using the session's forward skip limit.
    pub fn source(&self, store: Arc<dyn RangeReadable>) -> RemoteByteSource {
        RemoteByteSource::new(store).with_max_forward_skip(self.config.max_forward_skip)
    }

    /// Computes the checksum set of `baseline` in one sequential read.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] when the baseline size cannot be determined,
    /// otherwise whatever opening or checksumming the stream reports.
    pub fn checksum_baseline(&self, baseline: &RemoteByteSource) -> Result<ChecksumSet, EngineError> {
        let total_len = baseline
            .size_if_known()?
            .ok_or_else(|| EngineError::Config("baseline size is unknown".into()))?;
        let reader = BufReader::with_capacity(STREAM_BUFFER, baseline.open_stream()?);
        let set = self.checksum_reader(reader, total_len)?;
        trace_session!(
            blocks = set.layout().block_count(),
            total_len,
            block_size = self.config.block_size.get(),
            "baseline checksummed"
        );
        Ok(set)
    }

    /// Computes the checksum set of exactly `total_len` bytes from `reader`.
    pub fn checksum_reader<R: Read>(&self, reader: R, total_len: u64) -> Result<ChecksumSet, EngineError> {
        let generator = self.config.checksum_generator()?;
        #[cfg(feature = "parallel")]
        {
            if self.config.parallel_checksums {
                let parallel = signature::ParallelChecksumGenerator::from_sequential(generator);
                return Ok(parallel.generate_set(reader, total_len)?);
            }
        }
        Ok(generator.generate_set(reader, total_len)?)
    }

    /// Scans `target` against `set` and passes each instruction to `sink`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Match`] when `set` was produced with a different
    ///   block size or strong hash, or the target cannot be read.
    /// - An error returned by `sink`, wrapped as [`MatchError::Io`].
    pub fn generate_instructions<R, F>(
        &self,
        target: R,
        set: &ChecksumSet,
        mut sink: F,
    ) -> Result<InstructionSummary, EngineError>
    where
        R: Read,
        F: FnMut(Instruction) -> io::Result<()>,
    {
        let index = ChecksumIndex::from_set(set);
        let generator = self.config.instruction_generator();
        let mut forward = |instruction: Instruction| sink(instruction).map_err(MatchError::from);

        let summary = if self.config.verify {
            let mut reader = HashingReader::new(target, self.config.strong_hash);
            let stats = generator.generate(&mut reader, &index, &mut forward)?;
            let (digest, target_len) = reader.finish();
            InstructionSummary {
                stats,
                target_len,
                target_digest: Some(TargetDigest {
                    algorithm: self.config.strong_hash,
                    digest,
                }),
            }
        } else {
            let stats = generator.generate(target, &index, &mut forward)?;
            InstructionSummary {
                stats,
                target_len: stats.total_bytes(),
                target_digest: None,
            }
        };
        trace_session!(
            copies = summary.stats.copies,
            literals = summary.stats.literals,
            target_len = summary.target_len,
            "instructions generated"
        );
        Ok(summary)
    }

    /// Encodes the instruction stream for `target` into `writer`, including
    /// the target digest trailer when verification is enabled.
    pub fn write_delta<R, W>(
        &self,
        target: R,
        set: &ChecksumSet,
        writer: W,
    ) -> Result<(W, InstructionSummary), EngineError>
    where
        R: Read,
        W: Write,
    {
        let digest = self.config.verify.then_some(self.config.strong_hash);
        let mut out = InstructionWriter::with_digest(writer, self.config.block_size, digest)?;
        let summary = self.generate_instructions(target, set, |instruction| {
            out.write(&instruction).map_err(io::Error::from)
        })?;
        let writer = out.finish(summary.target_digest.as_ref())?;
        Ok((writer, summary))
    }

    /// Builds a receiver over `baseline` that hashes its output when
    /// verification is enabled.
    pub fn receiver(
        &self,
        baseline: &RemoteByteSource,
        layout: BlockLayout,
        output: Box<dyn ObjectWrite>,
    ) -> InstructionReceiver {
        let receiver = InstructionReceiver::new(baseline.clone(), layout, output);
        if self.config.verify {
            receiver.with_verification(self.config.strong_hash)
        } else {
            receiver
        }
    }

    /// Applies `instructions` to `baseline` and commits the result to
    /// `output`, checking it against `expected` when given.
    ///
    /// Blocks are resolved with the session block size. The output is
    /// discarded on any error.
    pub fn reconstruct<I, E>(
        &self,
        baseline: &RemoteByteSource,
        instructions: I,
        output: Box<dyn ObjectWrite>,
        expected: Option<&TargetDigest>,
    ) -> Result<ReceiveSummary, EngineError>
    where
        I: IntoIterator<Item = Result<Instruction, E>>,
        E: Into<EngineError>,
    {
        let layout = self.baseline_layout(baseline, self.config.block_size)?;
        let expected = self.expected_digest(expected)?;
        let mut receiver = self.receiver(baseline, layout, output);
        for instruction in instructions {
            receiver.receive(instruction.map_err(Into::<EngineError>::into)?)?;
        }
        receiver.finish_verified(expected.as_ref())
    }

    /// Applies a decoded instruction stream to `baseline`.
    ///
    /// Blocks are resolved with the block size recorded in the stream. When
    /// verification is enabled and the stream announces a target digest, the
    /// output is hashed with the announced algorithm and checked against the
    /// trailer.
    pub fn reconstruct_from<R: Read>(
        &self,
        baseline: &RemoteByteSource,
        mut reader: InstructionReader<R>,
        output: Box<dyn ObjectWrite>,
    ) -> Result<ReceiveSummary, EngineError> {
        let layout = self.baseline_layout(baseline, reader.block_len())?;
        let algorithm = reader.digest_algorithm().filter(|_| self.config.verify);
        let mut receiver = InstructionReceiver::new(baseline.clone(), layout, output);
        if let Some(algorithm) = algorithm {
            receiver = receiver.with_verification(algorithm);
        }
        while let Some(instruction) = reader.next_instruction()? {
            receiver.receive(instruction)?;
        }
        let expected = algorithm
            .and(reader.target_digest())
            .map(|target| target.digest);
        receiver.finish_verified(expected.as_ref())
    }

    /// Checksums `baseline`, scans `target` and writes the reconstruction to
    /// `output`, streaming instructions straight into the receiver.
    pub fn synchronize<R: Read>(
        &self,
        baseline: &RemoteByteSource,
        target: R,
        output: &dyn WritableStore,
    ) -> Result<SyncReport, EngineError> {
        let set = self.checksum_baseline(baseline)?;
        let layout = set.layout();
        let mut receiver = self.receiver(baseline, layout, output.create_writer()?);

        let mut failure = None;
        let generated = self.generate_instructions(target, &set, |instruction| {
            receiver.receive(instruction).map_err(|error| {
                let bridged = io::Error::other(error.to_string());
                failure = Some(error);
                bridged
            })
        });
        let summary = match generated {
            Ok(summary) => summary,
            Err(error) => return Err(failure.unwrap_or(error)),
        };

        let expected = summary.target_digest.map(|target| target.digest);
        let received = receiver.finish_verified(expected.as_ref())?;
        let report = SyncReport {
            block_count: layout.block_count(),
            baseline_len: layout.total_len(),
            target_len: summary.target_len,
            output_len: received.output_len,
            instructions: summary.stats,
            receiver: received.stats,
            source: baseline.stats()?,
            digest: summary.target_digest,
        };
        trace_session!(
            baseline_len = report.baseline_len,
            target_len = report.target_len,
            copied = report.receiver.copied_bytes,
            literal = report.receiver.literal_bytes,
            opens = report.source.opens,
            "synchronized"
        );
        Ok(report)
    }

    fn baseline_layout(
        &self,
        baseline: &RemoteByteSource,
        block_len: NonZeroU32,
    ) -> Result<BlockLayout, EngineError> {
        let total_len = baseline
            .size_if_known()?
            .ok_or_else(|| EngineError::Config("baseline size is unknown".into()))?;
        Ok(BlockLayout::new(block_len, total_len)?)
    }

    fn expected_digest(
        &self,
        target: Option<&TargetDigest>,
    ) -> Result<Option<StrongDigest>, EngineError> {
        if !self.config.verify {
            return Ok(None);
        }
        match target {
            None => Ok(None),
            Some(target) if target.algorithm == self.config.strong_hash => Ok(Some(target.digest)),
            Some(target) => Err(EngineError::Config(format!(
                "target digest uses {} but the session verifies with {}",
                target.algorithm, self.config.strong_hash
            ))),
        }
    }
}
