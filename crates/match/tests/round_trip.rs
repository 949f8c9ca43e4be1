//! Replaying generated instructions against the baseline reproduces the target.

use std::io::Cursor;
use std::num::{NonZeroU32, NonZeroUsize};

use checksums::StrongHashAlgorithm;
use matching::{ChecksumIndex, Instruction, InstructionGenerator};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use signature::ChecksumGenerator;

fn index_for(baseline: &[u8], block: u32) -> ChecksumIndex {
    let set = ChecksumGenerator::new(NonZeroU32::new(block).unwrap(), StrongHashAlgorithm::Sha256)
        .unwrap()
        .generate_set(Cursor::new(baseline), baseline.len() as u64)
        .unwrap();
    ChecksumIndex::from_set(&set)
}

fn replay(baseline: &[u8], index: &ChecksumIndex, instructions: &[Instruction]) -> Vec<u8> {
    let mut out = Vec::new();
    for instruction in instructions {
        match instruction {
            Instruction::Copy { block_index } => {
                let block = index.layout().block(*block_index).unwrap();
                let start = block.offset as usize;
                out.extend_from_slice(&baseline[start..start + block.len as usize]);
            }
            Instruction::Literal(bytes) => out.extend_from_slice(bytes),
        }
    }
    out
}

fn plan(baseline: &[u8], target: &[u8], block: u32) -> (ChecksumIndex, Vec<Instruction>) {
    let index = index_for(baseline, block);
    let instructions =
        InstructionGenerator::new(NonZeroU32::new(block).unwrap(), StrongHashAlgorithm::Sha256)
            .generate_script(Cursor::new(target), &index)
            .unwrap()
            .into_instructions();
    (index, instructions)
}

fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

#[test]
fn corrupted_and_shifted_baseline_reconstructs() {
    let baseline = random_bytes(1, 64 * 1024);
    let mut target = baseline.clone();
    target[123] ^= 0x5a;
    target.drain(512..516);

    let (index, instructions) = plan(&baseline, &target, 4096);
    assert_eq!(replay(&baseline, &index, &instructions), target);

    let copies = instructions.iter().filter(|i| i.is_copy()).count();
    assert_eq!(copies, 15, "every block after the damaged first one is reused");
}

#[test]
fn single_byte_change_only_touches_its_block() {
    let block = 1024;
    let baseline = random_bytes(2, 16 * block);
    let mut target = baseline.clone();
    target[5 * block + 17] ^= 1;

    let (index, instructions) = plan(&baseline, &target, block as u32);
    assert_eq!(replay(&baseline, &index, &instructions), target);

    let copied: Vec<u32> = instructions
        .iter()
        .filter_map(|i| match i {
            Instruction::Copy { block_index } => Some(*block_index),
            Instruction::Literal(_) => None,
        })
        .collect();
    let expected: Vec<u32> = (0..16).filter(|&b| b != 5).collect();
    assert_eq!(copied, expected);
}

#[test]
fn reordered_blocks_are_copied_out_of_order() {
    let baseline = random_bytes(3, 8 * 256);
    let mut target = Vec::new();
    for block in [7usize, 2, 2, 0, 5] {
        target.extend_from_slice(&baseline[block * 256..(block + 1) * 256]);
    }
    let (index, instructions) = plan(&baseline, &target, 256);
    assert_eq!(
        instructions,
        [7, 2, 2, 0, 5]
            .into_iter()
            .map(|block_index| Instruction::Copy { block_index })
            .collect::<Vec<_>>()
    );
    assert_eq!(replay(&baseline, &index, &instructions), target);
}

#[test]
fn literal_batching_does_not_change_output() {
    let baseline = random_bytes(4, 10_000);
    let mut target = random_bytes(5, 3_000);
    target.extend_from_slice(&baseline[2_000..9_000]);
    let index = index_for(&baseline, 500);

    let mut outputs = Vec::new();
    for limit in [1usize, 7, 500, 100_000] {
        let instructions =
            InstructionGenerator::new(NonZeroU32::new(500).unwrap(), StrongHashAlgorithm::Sha256)
                .with_max_literal_len(NonZeroUsize::new(limit).unwrap())
                .generate_script(Cursor::new(&target), &index)
                .unwrap()
                .into_instructions();
        assert!(instructions.iter().all(|i| i.literal_len() <= limit));
        outputs.push(replay(&baseline, &index, &instructions));
    }
    assert!(outputs.iter().all(|out| *out == target));
}

#[test]
fn random_edit_scripts_round_trip() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..20 {
        let baseline = random_bytes(rng.r#gen(), rng.gen_range(0..20_000));
        let mut target = baseline.clone();
        for _ in 0..rng.gen_range(0..6) {
            let at = rng.gen_range(0..=target.len());
            let insert = random_bytes(rng.r#gen(), rng.gen_range(0..300));
            target.splice(at..at, insert);
        }
        let block = rng.gen_range(1..2048);
        let (index, instructions) = plan(&baseline, &target, block);
        assert_eq!(replay(&baseline, &index, &instructions), target);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn arbitrary_pairs_round_trip(
        baseline in prop::collection::vec(any::<u8>(), 0..600),
        target in prop::collection::vec(any::<u8>(), 0..600),
        block in 1u32..64,
    ) {
        let (index, instructions) = plan(&baseline, &target, block);
        prop_assert_eq!(replay(&baseline, &index, &instructions), target);
    }

    #[test]
    fn identical_input_needs_no_literals(
        blocks in 1usize..20,
        block in 1u32..64,
        seed in any::<u64>(),
    ) {
        let baseline = random_bytes(seed, blocks * block as usize);
        let (_, instructions) = plan(&baseline, &baseline, block);
        prop_assert!(instructions.iter().all(Instruction::is_copy));
        prop_assert_eq!(instructions.len(), blocks);
    }
}
