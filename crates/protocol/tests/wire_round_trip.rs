//! Checksums and instructions that cross the wire still rebuild the target.

use std::io::Cursor;
use std::num::NonZeroU32;

use checksums::StrongHashAlgorithm;
use matching::{ChecksumIndex, Instruction, InstructionGenerator};
use proptest::prelude::*;
use protocol::{read_checksum_set, read_instructions, write_checksum_set, write_instructions};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use signature::ChecksumGenerator;

fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

fn sync_over_wire(
    baseline: &[u8],
    target: &[u8],
    block: u32,
    algorithm: StrongHashAlgorithm,
) -> Vec<u8> {
    let block_len = NonZeroU32::new(block).unwrap();
    let set = ChecksumGenerator::new(block_len, algorithm)
        .unwrap()
        .generate_set(Cursor::new(baseline), baseline.len() as u64)
        .unwrap();
    let checksum_bytes = write_checksum_set(Vec::new(), &set).unwrap();

    let received = read_checksum_set(Cursor::new(checksum_bytes)).unwrap();
    let index = ChecksumIndex::from_set(&received);
    let script = InstructionGenerator::new(block_len, algorithm)
        .generate_script(Cursor::new(target), &index)
        .unwrap();
    let instruction_bytes =
        write_instructions(Vec::new(), block_len, script.instructions()).unwrap();

    let mut out = Vec::new();
    for instruction in read_instructions(Cursor::new(instruction_bytes)).unwrap() {
        match instruction {
            Instruction::Copy { block_index } => {
                let block = set.layout().block(block_index).unwrap();
                let start = block.offset as usize;
                out.extend_from_slice(&baseline[start..start + block.len as usize]);
            }
            Instruction::Literal(bytes) => out.extend_from_slice(&bytes),
        }
    }
    out
}

#[test]
fn every_algorithm_survives_the_wire() {
    let baseline = random_bytes(1, 100_000);
    let mut target = baseline.clone();
    target.splice(50_000..50_000, random_bytes(2, 70_000));
    target.truncate(150_000);
    for algorithm in StrongHashAlgorithm::ALL {
        assert_eq!(sync_over_wire(&baseline, &target, 2048, algorithm), target);
    }
}

#[test]
fn empty_inputs() {
    let algorithm = StrongHashAlgorithm::default();
    assert!(sync_over_wire(b"", b"", 16, algorithm).is_empty());
    assert_eq!(sync_over_wire(b"", b"new", 16, algorithm), b"new");
    assert!(sync_over_wire(b"old data", b"", 16, algorithm).is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn arbitrary_pairs(
        baseline in prop::collection::vec(any::<u8>(), 0..2000),
        target in prop::collection::vec(any::<u8>(), 0..2000),
        block in 1u32..128,
    ) {
        prop_assert_eq!(
            sync_over_wire(&baseline, &target, block, StrongHashAlgorithm::Xxh3_128),
            target
        );
    }
}
