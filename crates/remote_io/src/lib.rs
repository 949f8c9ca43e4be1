#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `remote_io` gives the sync engine uniform access to byte ranges of local
//! and remote objects. Callers ask for "the bytes between O and O + L" through
//! a [`RemoteByteSource`] and never see whether a file, a buffer or an object
//! store answers.
//!
//! # Design
//!
//! - [`Slice`] is a composable offset/length view with overflow-checked
//!   arithmetic.
//! - [`RangeReadable`] is the only thing a backend implements: open a stream
//!   at an offset and report the size when cheap.
//! - [`RemoteByteSource`] layers slicing and stream reuse on top of any
//!   backend. Views derived from one source share a cursor, so ascending range
//!   copies continue one stream and only backward (or far forward) requests
//!   reconnect.
//! - [`ObjectWrite`] / [`WritableStore`] publish a new object atomically:
//!   nothing is visible until `finish`, and `abort` discards the upload.
//!
//! Backends: [`LocalFile`], [`InMemory`], `S3Object` with the `s3` feature
//! and `GcsObject` with the `gcs` feature.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use remote_io::{InMemory, RemoteByteSource};
//!
//! let source = RemoteByteSource::new(Arc::new(InMemory::new(b"hello, world".to_vec())));
//! let mut out = Vec::new();
//! source.slice(7, 5)?.copy_to(&mut out)?;
//! assert_eq!(out, b"world");
//! # Ok::<(), remote_io::SourceError>(())
//! ```

mod error;
#[cfg(feature = "gcs")]
mod gcs;
mod local;
mod memory;
#[cfg(feature = "s3")]
mod s3;
mod slice;
mod source;
mod store;

pub use error::{SliceError, SourceError};
#[cfg(feature = "gcs")]
pub use gcs::{CHUNK_SIZE, GcsObject};
pub use local::LocalFile;
pub use memory::InMemory;
#[cfg(feature = "s3")]
pub use s3::{PART_SIZE, S3Object};
pub use slice::Slice;
pub use source::{DEFAULT_MAX_FORWARD_SKIP, RemoteByteSource, SourceStats};
pub use store::{ByteStream, ObjectWrite, RangeReadable, WritableStore, read_all, write_all};
