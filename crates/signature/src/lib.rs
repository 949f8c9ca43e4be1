#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `signature` partitions a baseline into fixed-size blocks and computes the
//! weak and strong checksum of each block. The resulting [`ChecksumSet`] is
//! what the target side matches against.
//!
//! # Design
//!
//! - [`BlockLayout`] describes the partition: `ceil(total / block_len)` blocks,
//!   all full except possibly the last.
//! - [`ChecksumGenerator`] reads the baseline once and streams
//!   [`ChecksumRecord`]s into a caller-supplied sink, so arbitrarily large
//!   baselines need one block of memory.
//! - `ParallelChecksumGenerator` (feature `parallel`) hashes bounded batches of
//!   blocks with rayon and emits them in the same order.
//! - [`ChecksumSet`] is the materialised, validated form.
//!
//! # Examples
//!
//! ```
//! use std::io::Cursor;
//! use std::num::NonZeroU32;
//! use checksums::StrongHashAlgorithm;
//! use signature::ChecksumGenerator;
//!
//! let generator = ChecksumGenerator::new(NonZeroU32::new(4).unwrap(), StrongHashAlgorithm::Sha256)?;
//! let set = generator.generate_set(Cursor::new(b"abcdefghij"), 10)?;
//! assert_eq!(set.len(), 3);
//! assert_eq!(set.records()[2].len(), 2);
//! # Ok::<(), signature::SignatureError>(())
//! ```

mod error;
mod generation;
mod layout;
#[cfg(feature = "parallel")]
mod parallel;
mod record;
mod set;

pub use error::SignatureError;
pub use generation::ChecksumGenerator;
pub use layout::{BlockLayout, BlockRange, DEFAULT_BLOCK_LEN, MAX_BLOCK_LEN};
#[cfg(feature = "parallel")]
pub use parallel::{DEFAULT_BATCH_BLOCKS, MAX_BATCH_BYTES, ParallelChecksumGenerator};
pub use record::ChecksumRecord;
pub use set::ChecksumSet;
