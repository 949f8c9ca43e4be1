#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `protocol` serialises the two sequences that cross the process boundary
//! in a dbsync session: the baseline's checksum set (baseline side to target
//! side) and the instruction stream (target side back to the baseline side).
//! The transport itself is left to the caller; anything implementing
//! [`std::io::Read`] / [`std::io::Write`] works.
//!
//! # Design
//!
//! - [`varint`] holds the LEB128 codec used for header fields.
//! - [`wire::checksum`] frames a [`signature::ChecksumSet`] with its layout
//!   and strong hash id, so the instruction side detects a block size or
//!   algorithm mismatch before scanning.
//! - [`wire::instruction`] uses rsync's signed token encoding for copies and
//!   literals, requires an explicit end token and may carry a digest of the
//!   whole target so the receiving side can verify its output.
//!
//! Readers validate as they go and report truncation as an I/O error with
//! [`std::io::ErrorKind::UnexpectedEof`].
//!
//! # Examples
//!
//! ```
//! use std::io::Cursor;
//! use std::num::NonZeroU32;
//! use matching::Instruction;
//! use protocol::{read_instructions, write_instructions};
//!
//! let plan = vec![Instruction::Copy { block_index: 2 }, Instruction::Literal(b"tail".to_vec())];
//! let block_len = NonZeroU32::new(4096).unwrap();
//! let bytes = write_instructions(Vec::new(), block_len, &plan)?;
//! assert_eq!(read_instructions(Cursor::new(bytes))?, plan);
//! # Ok::<(), protocol::WireError>(())
//! ```

mod error;
pub mod varint;
pub mod wire;

pub use error::WireError;
pub use varint::{MAX_VARINT_LEN, decode_varint, encode_varint_to_vec, read_varint, write_varint};
pub use wire::{
    CHUNK_SIZE, ChecksumReader, ChecksumWriter, InstructionReader, InstructionWriter, TargetDigest,
    read_checksum_set, read_instructions, write_checksum_set, write_instructions,
};
