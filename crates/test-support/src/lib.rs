//! Shared helpers for dbsync tests.
//!
//! Deterministic data generators, an in-memory sync pipeline built directly
//! on the checksum and matching crates, and a store wrapper that records
//! every range request.

use std::io::{self, Cursor};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

use checksums::StrongHashAlgorithm;
use matching::{ChecksumIndex, Instruction, InstructionGenerator};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use remote_io::{ByteStream, RangeReadable};
use signature::{BlockLayout, ChecksumGenerator};

/// Returns `len` pseudo-random bytes derived from `seed`.
pub fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

/// Copy of `data` with the byte at `at` inverted.
pub fn flip_byte(data: &[u8], at: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    out[at] ^= 0xff;
    out
}

/// Copy of `data` with `insert` spliced in at `at`.
pub fn insert_at(data: &[u8], at: usize, insert: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + insert.len());
    out.extend_from_slice(&data[..at]);
    out.extend_from_slice(insert);
    out.extend_from_slice(&data[at..]);
    out
}

/// Applies `plan` to an in-memory `baseline` without going through any store.
///
/// # Panics
///
/// Panics when a copy names a block outside `layout`.
pub fn replay<'a, I>(baseline: &[u8], layout: BlockLayout, plan: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a Instruction>,
{
    let mut out = Vec::new();
    for instruction in plan {
        match instruction {
            Instruction::Copy { block_index } => {
                let block = layout
                    .block(*block_index)
                    .unwrap_or_else(|| panic!("block {block_index} outside layout"));
                let start = block.offset as usize;
                out.extend_from_slice(&baseline[start..start + block.len as usize]);
            }
            Instruction::Literal(bytes) => out.extend_from_slice(bytes),
        }
    }
    out
}

/// One named baseline/target pair pushed through checksum generation,
/// instruction generation and an in-memory replay.
#[derive(Clone, Debug)]
pub struct SyncHarness {
    /// Label used in assertion messages.
    pub name: &'static str,
    /// Baseline bytes.
    pub baseline: Vec<u8>,
    /// Target bytes.
    pub target: Vec<u8>,
    /// Block size.
    pub block_size: NonZeroU32,
    /// Strong hash.
    pub algorithm: StrongHashAlgorithm,
}

/// What [`SyncHarness::run`] produced.
#[derive(Clone, Debug)]
pub struct HarnessOutcome {
    /// Baseline layout.
    pub layout: BlockLayout,
    /// Generated plan.
    pub instructions: Vec<Instruction>,
    /// Plan replayed against the baseline.
    pub reconstructed: Vec<u8>,
}

impl HarnessOutcome {
    /// Number of copy instructions in the plan.
    pub fn copies(&self) -> usize {
        self.instructions.iter().filter(|i| i.is_copy()).count()
    }

    /// Number of literal instructions in the plan.
    pub fn literals(&self) -> usize {
        self.instructions.len() - self.copies()
    }
}

impl SyncHarness {
    /// Harness with the default strong hash.
    ///
    /// # Panics
    ///
    /// Panics when `block_size` is zero.
    pub fn new(name: &'static str, baseline: Vec<u8>, target: Vec<u8>, block_size: u32) -> Self {
        Self {
            name,
            baseline,
            target,
            block_size: NonZeroU32::new(block_size).expect("block size must be non-zero"),
            algorithm: StrongHashAlgorithm::default(),
        }
    }

    /// Uses `algorithm` for strong digests.
    pub fn with_algorithm(mut self, algorithm: StrongHashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Runs the pipeline.
    ///
    /// # Panics
    ///
    /// Panics when any phase fails; inputs are in memory so none should.
    pub fn run(&self) -> HarnessOutcome {
        let set = ChecksumGenerator::new(self.block_size, self.algorithm)
            .and_then(|generator| {
                generator.generate_set(Cursor::new(&self.baseline), self.baseline.len() as u64)
            })
            .unwrap_or_else(|error| panic!("{}: checksum generation failed: {error}", self.name));
        let index = ChecksumIndex::from_set(&set);
        let instructions = InstructionGenerator::new(self.block_size, self.algorithm)
            .generate_script(Cursor::new(&self.target), &index)
            .unwrap_or_else(|error| panic!("{}: instruction generation failed: {error}", self.name))
            .into_instructions();
        let reconstructed = replay(&self.baseline, set.layout(), &instructions);
        HarnessOutcome {
            layout: set.layout(),
            instructions,
            reconstructed,
        }
    }

    /// Runs the pipeline and asserts the replay equals the target.
    pub fn assert_round_trip(&self) -> HarnessOutcome {
        let outcome = self.run();
        assert!(
            outcome.reconstructed == self.target,
            "{}: reconstruction differs from target ({} vs {} bytes)",
            self.name,
            outcome.reconstructed.len(),
            self.target.len()
        );
        outcome
    }
}

/// Store wrapper that records each `open_at` request.
#[derive(Debug)]
pub struct CountingStore {
    inner: Arc<dyn RangeReadable>,
    requests: Mutex<Vec<(u64, Option<u64>)>>,
}

impl CountingStore {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn RangeReadable>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Number of streams opened so far.
    pub fn opens(&self) -> usize {
        self.requests().len()
    }

    /// `(offset, len)` of every stream opened so far, in order.
    pub fn requests(&self) -> Vec<(u64, Option<u64>)> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Forgets recorded requests.
    pub fn reset(&self) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.clear();
        }
    }
}

impl RangeReadable for CountingStore {
    fn open_at(&self, offset: u64, len: Option<u64>) -> io::Result<ByteStream> {
        self.requests
            .lock()
            .map_err(|_| io::Error::other("request log poisoned"))?
            .push((offset, len));
        self.inner.open_at(offset, len)
    }

    fn size(&self) -> io::Result<Option<u64>> {
        self.inner.size()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use remote_io::InMemory;

    use super::*;

    #[test]
    fn random_bytes_are_deterministic() {
        assert_eq!(random_bytes(7, 64), random_bytes(7, 64));
        assert_ne!(random_bytes(7, 64), random_bytes(8, 64));
    }

    #[test]
    fn edits() {
        assert_eq!(flip_byte(b"\x00\x01", 1), b"\x00\xfe");
        assert_eq!(insert_at(b"abef", 2, b"cd"), b"abcdef");
    }

    #[test]
    fn replay_resolves_short_tail() {
        let layout = BlockLayout::new(NonZeroU32::new(4).unwrap(), 10).unwrap();
        let plan = [
            Instruction::Copy { block_index: 2 },
            Instruction::Literal(b"-".to_vec()),
            Instruction::Copy { block_index: 0 },
        ];
        assert_eq!(replay(b"0123456789", layout, &plan), b"89-0123");
    }

    #[test]
    fn harness_round_trips_an_edit() {
        let baseline = random_bytes(1, 4096);
        let target = flip_byte(&baseline, 1000);
        let outcome = SyncHarness::new("flip", baseline, target, 256).assert_round_trip();
        assert_eq!(outcome.literals(), 1);
        assert_eq!(outcome.copies(), 15);
    }

    #[test]
    fn counting_store_records_requests() {
        let store = CountingStore::new(Arc::new(InMemory::new(b"abcdef".to_vec())));
        let mut out = String::new();
        store.open_at(2, Some(3)).unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "cde");
        assert_eq!(store.requests(), vec![(2, Some(3))]);
        store.reset();
        assert_eq!(store.opens(), 0);
    }
}
