#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `checksums` provides the two hashing primitives the delta engine is built
//! on:
//!
//! - [`RollingChecksum`], a weak Adler-style checksum over a fixed-size window
//!   that can slide one byte at a time in O(1).
//! - [`StrongHashAlgorithm`] / [`StrongDigest`], the collision-resistant digest
//!   used to confirm every weak-checksum candidate before it is trusted.
//!
//! # Design
//!
//! The rolling checksum owns its window in a fixed-capacity ring buffer. The
//! instruction generator therefore never keeps a second copy of the bytes it
//! is matching: the strong digest is computed directly over the window halves
//! and the byte that leaves the window on [`RollingChecksum::roll`] is handed
//! back to the caller so it can be appended to a pending literal.
//!
//! Strong digests are stored inline in a fixed 32-byte buffer, which keeps
//! [`StrongDigest`] `Copy` and cheap to compare regardless of the selected
//! algorithm.
//!
//! # Examples
//!
//! ```
//! use std::num::NonZeroUsize;
//! use checksums::{RollingChecksum, RollingDigest};
//!
//! let data = b"ABCDE";
//! let mut rolling = RollingChecksum::new(NonZeroUsize::new(3).unwrap());
//! rolling.reset_from_slice(data, 0);
//!
//! let outgoing = rolling.roll(data[3]).unwrap();
//! assert_eq!(outgoing, b'A');
//! assert_eq!(rolling.digest(), RollingDigest::from_bytes(b"BCD"));
//! ```

mod rolling;
pub mod strong;

pub use rolling::{CHAR_OFFSET, RollingChecksum, RollingDigest, RollingError};
pub use strong::{MAX_DIGEST_LEN, StrongDigest, StrongHashAlgorithm, StrongHasher};
