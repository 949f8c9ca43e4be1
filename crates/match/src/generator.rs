use std::io::{self, BufRead, BufReader, Read};
use std::num::{NonZeroU32, NonZeroUsize};

use checksums::{RollingChecksum, StrongHashAlgorithm};
use logging::trace_delta;

use crate::error::MatchError;
use crate::index::ChecksumIndex;
use crate::instruction::{Instruction, InstructionScript, InstructionStats};

/// Default read buffer used when scanning the target.
const DEFAULT_BUFFER_LEN: usize = 128 * 1024;

/// Scans a target stream and emits the instructions that rebuild it from a
/// baseline.
///
/// The scan keeps a rolling checksum over the next `block_len` target bytes.
/// When the window's weak checksum and strong digest match a baseline block,
/// the pending literal is flushed, a copy is emitted and the window is reset
/// past the matched bytes. Otherwise the window slides by one byte and the
/// byte that left it joins the pending literal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InstructionGenerator {
    block_len: NonZeroU32,
    algorithm: StrongHashAlgorithm,
    max_literal_len: NonZeroUsize,
    buffer_len: usize,
}

impl InstructionGenerator {
    /// Creates a generator for blocks of `block_len` bytes hashed with `algorithm`.
    ///
    /// Literals are batched up to one block length.
    #[must_use]
    pub fn new(block_len: NonZeroU32, algorithm: StrongHashAlgorithm) -> Self {
        let max_literal_len =
            NonZeroUsize::MIN.saturating_add(block_len.get() as usize - 1);
        Self {
            block_len,
            algorithm,
            max_literal_len,
            buffer_len: DEFAULT_BUFFER_LEN,
        }
    }

    /// Sets the largest literal emitted as one instruction.
    #[must_use]
    pub const fn with_max_literal_len(mut self, max_literal_len: NonZeroUsize) -> Self {
        self.max_literal_len = max_literal_len;
        self
    }

    /// Overrides the read buffer length used for the target stream.
    #[must_use]
    pub fn with_buffer_len(mut self, buffer_len: usize) -> Self {
        self.buffer_len = buffer_len.max(1);
        self
    }

    /// Block length in bytes.
    #[must_use]
    pub const fn block_len(&self) -> NonZeroU32 {
        self.block_len
    }

    /// Largest literal emitted as one instruction.
    #[must_use]
    pub const fn max_literal_len(&self) -> NonZeroUsize {
        self.max_literal_len
    }

    /// Scans `reader` to the end and hands each instruction to `sink`.
    ///
    /// Replaying the emitted instructions in order against the indexed
    /// baseline reproduces the target exactly. On error, instructions already
    /// emitted are not a usable plan.
    ///
    /// # Errors
    ///
    /// - [`MatchError::BlockSizeMismatch`] / [`MatchError::AlgorithmMismatch`]
    ///   when `index` was built with different parameters. Nothing is read.
    /// - [`MatchError::Io`] when reading the target fails.
    /// - Any error returned by `sink`, unchanged.
    pub fn generate<R, F>(
        &self,
        reader: R,
        index: &ChecksumIndex,
        sink: F,
    ) -> Result<InstructionStats, MatchError>
    where
        R: Read,
        F: FnMut(Instruction) -> Result<(), MatchError>,
    {
        self.check_index(index)?;

        let block_len = self.block_len.get() as usize;
        let mut input = BufReader::with_capacity(self.buffer_len.max(block_len), reader);
        let mut rolling = RollingChecksum::new(NonZeroUsize::MIN.saturating_add(block_len - 1));
        let mut emitter = Emitter::new(self.max_literal_len.get(), sink);

        'scan: loop {
            let filled = rolling.reset_from_reader(&mut input)?;
            if filled == 0 {
                break;
            }
            if filled < block_len {
                self.finish_tail(&mut rolling, index, &mut emitter)?;
                break;
            }
            loop {
                if let Some(block) = self.match_window(&rolling, index) {
                    emitter.copy(block, rolling.len())?;
                    continue 'scan;
                }
                match next_byte(&mut input)? {
                    Some(incoming) => {
                        let outgoing = rolling.roll(incoming)?;
                        emitter.literal_byte(outgoing)?;
                    }
                    None => {
                        self.finish_tail(&mut rolling, index, &mut emitter)?;
                        break 'scan;
                    }
                }
            }
        }

        let stats = emitter.finish()?;
        trace_delta!(
            copies = stats.copies,
            literals = stats.literals,
            copied_bytes = stats.copied_bytes,
            literal_bytes = stats.literal_bytes,
            "generated instructions"
        );
        Ok(stats)
    }

    /// Generates the complete [`InstructionScript`] for `reader`.
    ///
    /// # Errors
    ///
    /// Same as [`generate`](Self::generate).
    pub fn generate_script<R: Read>(
        &self,
        reader: R,
        index: &ChecksumIndex,
    ) -> Result<InstructionScript, MatchError> {
        let mut instructions = Vec::new();
        let stats = self.generate(reader, index, |instruction| {
            instructions.push(instruction);
            Ok(())
        })?;
        Ok(InstructionScript::new(instructions, stats))
    }

    fn check_index(&self, index: &ChecksumIndex) -> Result<(), MatchError> {
        let index_block = index.layout().block_len().get();
        if index_block != self.block_len.get() {
            return Err(MatchError::BlockSizeMismatch {
                index: index_block,
                generator: self.block_len.get(),
            });
        }
        if index.algorithm() != self.algorithm {
            return Err(MatchError::AlgorithmMismatch {
                index: index.algorithm(),
                generator: self.algorithm,
            });
        }
        Ok(())
    }

    fn match_window(&self, rolling: &RollingChecksum, index: &ChecksumIndex) -> Option<u32> {
        index.find(rolling.value(), rolling.len(), || {
            let (head, tail) = rolling.window_slices();
            let mut hasher = self.algorithm.hasher();
            hasher.update(head);
            hasher.update(tail);
            hasher.finalize()
        })
    }

    /// Handles the final window once the target is exhausted.
    ///
    /// Only the baseline's short last block can still match, and only against
    /// the very end of the target. Everything else becomes literal.
    fn finish_tail<F>(
        &self,
        rolling: &mut RollingChecksum,
        index: &ChecksumIndex,
        emitter: &mut Emitter<F>,
    ) -> Result<(), MatchError>
    where
        F: FnMut(Instruction) -> Result<(), MatchError>,
    {
        if let Some(short) = index.short_block_len().map(|len| len as usize) {
            if rolling.len() >= short {
                while rolling.len() > short {
                    let Some(outgoing) = rolling.shrink_front() else {
                        break;
                    };
                    emitter.literal_byte(outgoing)?;
                }
                if let Some(block) = self.match_window(rolling, index) {
                    emitter.copy(block, short)?;
                    return Ok(());
                }
            }
        }
        while let Some(outgoing) = rolling.shrink_front() {
            emitter.literal_byte(outgoing)?;
        }
        Ok(())
    }
}

fn next_byte<R: BufRead>(input: &mut R) -> io::Result<Option<u8>> {
    loop {
        match input.fill_buf() {
            Ok(buffer) => {
                let byte = buffer.first().copied();
                if byte.is_some() {
                    input.consume(1);
                }
                return Ok(byte);
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
}

/// Accumulates literal bytes and forwards instructions to the sink.
struct Emitter<F> {
    pending: Vec<u8>,
    max_literal_len: usize,
    stats: InstructionStats,
    sink: F,
}

impl<F> Emitter<F>
where
    F: FnMut(Instruction) -> Result<(), MatchError>,
{
    fn new(max_literal_len: usize, sink: F) -> Self {
        Self {
            pending: Vec::with_capacity(max_literal_len.min(DEFAULT_BUFFER_LEN)),
            max_literal_len,
            stats: InstructionStats::default(),
            sink,
        }
    }

    fn literal_byte(&mut self, byte: u8) -> Result<(), MatchError> {
        self.pending.push(byte);
        if self.pending.len() >= self.max_literal_len {
            self.flush_literal()?;
        }
        Ok(())
    }

    fn flush_literal(&mut self) -> Result<(), MatchError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let bytes = std::mem::replace(
            &mut self.pending,
            Vec::with_capacity(self.max_literal_len.min(DEFAULT_BUFFER_LEN)),
        );
        self.stats.record_literal(bytes.len());
        (self.sink)(Instruction::Literal(bytes))
    }

    fn copy(&mut self, block_index: u32, len: usize) -> Result<(), MatchError> {
        self.flush_literal()?;
        self.stats.record_copy(len as u32);
        (self.sink)(Instruction::Copy { block_index })
    }

    fn finish(mut self) -> Result<InstructionStats, MatchError> {
        self.flush_literal()?;
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signature::ChecksumGenerator;
    use std::io::Cursor;

    fn index_for(baseline: &[u8], block: u32) -> ChecksumIndex {
        let set = ChecksumGenerator::new(NonZeroU32::new(block).unwrap(), StrongHashAlgorithm::Sha256)
            .unwrap()
            .generate_set(Cursor::new(baseline), baseline.len() as u64)
            .unwrap();
        ChecksumIndex::from_set(&set)
    }

    fn generator(block: u32) -> InstructionGenerator {
        InstructionGenerator::new(NonZeroU32::new(block).unwrap(), StrongHashAlgorithm::Sha256)
    }

    fn script(baseline: &[u8], target: &[u8], block: u32) -> Vec<Instruction> {
        let index = index_for(baseline, block);
        generator(block)
            .generate_script(Cursor::new(target), &index)
            .unwrap()
            .into_instructions()
    }

    #[test]
    fn identical_aligned_input_is_all_copies() {
        let baseline: Vec<u8> = (0..64u8).collect();
        let instructions = script(&baseline, &baseline, 16);
        assert_eq!(
            instructions,
            (0..4).map(|block_index| Instruction::Copy { block_index }).collect::<Vec<_>>()
        );
    }

    #[test]
    fn empty_baseline_yields_literals() {
        let instructions = script(b"", b"brand new", 4);
        assert_eq!(instructions, vec![Instruction::Literal(b"bran".to_vec()), Instruction::Literal(b"d ne".to_vec()), Instruction::Literal(b"w".to_vec())]);
    }

    #[test]
    fn empty_target_yields_nothing() {
        assert!(script(b"baseline", b"", 4).is_empty());
    }

    #[test]
    fn insertion_before_block_becomes_literal() {
        let baseline = b"AAAABBBBCCCC";
        let instructions = script(baseline, b"xyAAAABBBBCCCC", 4);
        assert_eq!(
            instructions,
            vec![
                Instruction::Literal(b"xy".to_vec()),
                Instruction::Copy { block_index: 0 },
                Instruction::Copy { block_index: 1 },
                Instruction::Copy { block_index: 2 },
            ]
        );
    }

    #[test]
    fn short_final_block_matches_target_tail() {
        let baseline = b"AAAABBBBcc";
        let instructions = script(baseline, b"BBBBzcc", 4);
        assert_eq!(
            instructions,
            vec![
                Instruction::Copy { block_index: 1 },
                Instruction::Literal(b"z".to_vec()),
                Instruction::Copy { block_index: 2 },
            ]
        );
    }

    #[test]
    fn short_target_matches_short_block_only() {
        let baseline = b"AAAAcc";
        assert_eq!(script(baseline, b"cc", 4), vec![Instruction::Copy { block_index: 1 }]);
        assert_eq!(script(b"AAAA", b"AA", 4), vec![Instruction::Literal(b"AA".to_vec())]);
    }

    #[test]
    fn duplicate_baseline_blocks_pick_lowest_index() {
        let baseline = b"ABCDXXXXABCD";
        assert_eq!(
            script(baseline, b"ABCD", 4),
            vec![Instruction::Copy { block_index: 0 }]
        );
    }

    #[test]
    fn literal_batches_respect_limit() {
        let index = index_for(b"", 4);
        let generator = generator(4).with_max_literal_len(NonZeroUsize::new(3).unwrap());
        let script = generator
            .generate_script(Cursor::new(b"abcdefgh"), &index)
            .unwrap();
        let lens: Vec<usize> = script.instructions().iter().map(Instruction::literal_len).collect();
        assert_eq!(lens, vec![3, 3, 2]);
        assert_eq!(script.stats().literal_bytes, 8);
    }

    #[test]
    fn mismatched_block_size_is_rejected() {
        let index = index_for(b"abcdefgh", 4);
        let err = generator(8)
            .generate_script(Cursor::new(b"abcdefgh"), &index)
            .unwrap_err();
        assert!(matches!(
            err,
            MatchError::BlockSizeMismatch {
                index: 4,
                generator: 8
            }
        ));
    }

    #[test]
    fn mismatched_algorithm_is_rejected() {
        let index = index_for(b"abcdefgh", 4);
        let generator = InstructionGenerator::new(NonZeroU32::new(4).unwrap(), StrongHashAlgorithm::Md5);
        let err = generator
            .generate_script(Cursor::new(b"abcdefgh"), &index)
            .unwrap_err();
        assert!(matches!(err, MatchError::AlgorithmMismatch { .. }));
    }

    #[test]
    fn read_errors_abort_generation() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("disk gone"))
            }
        }
        let index = index_for(b"abcd", 4);
        let err = generator(4).generate_script(Failing, &index).unwrap_err();
        assert!(matches!(err, MatchError::Io(_)));
    }

    #[test]
    fn stats_account_for_every_byte() {
        let baseline: Vec<u8> = (0..200u32).map(|i| (i * 7 % 256) as u8).collect();
        let mut target = baseline.clone();
        target[50] ^= 0xff;
        target.extend_from_slice(b"tail");
        let index = index_for(&baseline, 16);
        let script = generator(16)
            .generate_script(Cursor::new(&target), &index)
            .unwrap();
        assert_eq!(script.stats().total_bytes(), target.len() as u64);
    }
}
