#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `engine` ties the dbsync building blocks into a synchronisation pass:
//! checksum the baseline, scan the target against those checksums, and apply
//! the resulting instructions to the baseline to produce a copy of the
//! target. Each phase is available on its own so the baseline and target
//! sides can run in different processes, with the `protocol` crate carrying
//! the streams between them.
//!
//! # Design
//!
//! - [`SyncConfig`] holds every tunable; both sides must agree on the block
//!   size and strong hash.
//! - [`SyncSession`] runs the phases. [`SyncSession::synchronize`] streams
//!   instructions straight into an [`InstructionReceiver`] without
//!   materialising the plan.
//! - [`InstructionReceiver`] merges copies of adjacent blocks into a single
//!   ranged read, writes through an [`remote_io::ObjectWrite`] and commits
//!   only when every instruction applied cleanly.
//! - When verification is enabled the target is hashed while it is scanned
//!   and the output is hashed while it is written; a mismatch aborts the
//!   output.
//! - [`EngineError::kind`] sorts failures into configuration, integrity and
//!   I/O errors.
//!
//! # Examples
//!
//! ```
//! use std::io::Cursor;
//! use std::sync::Arc;
//! use engine::{SyncConfig, SyncSession};
//! use remote_io::InMemory;
//!
//! let session = SyncSession::new(SyncConfig::default())?;
//! let baseline = session.source(Arc::new(InMemory::new(vec![7u8; 10_000])));
//! let mut target = vec![7u8; 10_000];
//! target[5_000] = 8;
//!
//! let output = InMemory::default();
//! let report = session.synchronize(&baseline, Cursor::new(&target), &output)?;
//! assert_eq!(output.to_vec()?, target);
//! assert_eq!(report.output_len, 10_000);
//! # Ok::<(), engine::EngineError>(())
//! ```

mod config;
mod error;
mod receiver;
mod session;
mod verify;

pub use config::SyncConfig;
pub use error::{EngineError, ErrorKind};
pub use receiver::{InstructionReceiver, ReceiveSummary, ReceiverStats};
pub use session::{InstructionSummary, SyncReport, SyncSession};
pub use verify::HashingReader;
