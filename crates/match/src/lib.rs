#![deny(unsafe_code)]
#![deny(missing_docs)]

//! Block matching and instruction generation for dbsync.
//!
//! This crate turns a target byte stream plus a baseline's checksum set into
//! the copy/literal plan that rebuilds the target:
//! - [`ChecksumIndex`] maps weak checksums to candidate baseline blocks
//! - [`InstructionGenerator`] scans the target with a rolling checksum and
//!   confirms every weak hit with the strong digest
//! - [`Instruction`] and [`InstructionScript`] represent the plan
//!
//! # Design
//!
//! The generator reuses the rolling checksum from the `checksums` crate, which
//! owns the window bytes; the strong digest is computed directly over the two
//! halves of that window and only when a candidate of the right length exists.
//! Ties between identical baseline blocks resolve to the lowest index, so the
//! output is reproducible for identical inputs.
//!
//! # See also
//!
//! - [`signature`] crate for checksum generation

mod error;
mod generator;
mod index;
mod instruction;

pub use error::MatchError;
pub use generator::InstructionGenerator;
pub use index::ChecksumIndex;
pub use instruction::{Instruction, InstructionScript, InstructionStats};
