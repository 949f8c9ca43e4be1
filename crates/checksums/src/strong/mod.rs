//! crates/checksums/src/strong/mod.rs
//!
//! Strong digests used to confirm weak-checksum candidates.
//!
//! The algorithm is selected once per session and recorded in the checksum
//! set header, so both sides of a transfer always hash with the same function.
//! [`StrongHasher`] accepts the window in pieces, which lets the instruction
//! generator hash the two halves of its ring buffer without copying them into
//! a contiguous scratch buffer first.

mod algorithm;
mod digest;

pub use algorithm::{ParseAlgorithmError, StrongHashAlgorithm};
pub use digest::{MAX_DIGEST_LEN, StrongDigest};

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use xxhash_rust::xxh3::Xxh3;

/// Streaming hasher for one [`StrongHashAlgorithm`].
///
/// # Examples
///
/// ```
/// use checksums::{StrongHashAlgorithm, StrongHasher};
///
/// let mut hasher = StrongHasher::new(StrongHashAlgorithm::Sha256);
/// hasher.update(b"hello ");
/// hasher.update(b"world");
/// assert_eq!(hasher.finalize(), StrongHashAlgorithm::Sha256.digest(b"hello world"));
/// ```
#[derive(Clone)]
pub struct StrongHasher {
    inner: Inner,
}

#[derive(Clone)]
enum Inner {
    Sha256(Sha256),
    Sha1(Sha1),
    Md5(Md5),
    Xxh3_128(Box<Xxh3>),
}

impl StrongHasher {
    /// Creates a fresh hasher for `algorithm`.
    #[must_use]
    pub fn new(algorithm: StrongHashAlgorithm) -> Self {
        let inner = match algorithm {
            StrongHashAlgorithm::Sha256 => Inner::Sha256(Sha256::new()),
            StrongHashAlgorithm::Sha1 => Inner::Sha1(Sha1::new()),
            StrongHashAlgorithm::Md5 => Inner::Md5(Md5::new()),
            StrongHashAlgorithm::Xxh3_128 => Inner::Xxh3_128(Box::new(Xxh3::new())),
        };
        Self { inner }
    }

    /// Returns the algorithm this hasher computes.
    #[must_use]
    pub const fn algorithm(&self) -> StrongHashAlgorithm {
        match self.inner {
            Inner::Sha256(_) => StrongHashAlgorithm::Sha256,
            Inner::Sha1(_) => StrongHashAlgorithm::Sha1,
            Inner::Md5(_) => StrongHashAlgorithm::Md5,
            Inner::Xxh3_128(_) => StrongHashAlgorithm::Xxh3_128,
        }
    }

    /// Feeds more input into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.inner {
            Inner::Sha256(hasher) => hasher.update(data),
            Inner::Sha1(hasher) => hasher.update(data),
            Inner::Md5(hasher) => hasher.update(data),
            Inner::Xxh3_128(hasher) => hasher.update(data),
        }
    }

    /// Consumes the hasher and returns the digest.
    #[must_use]
    pub fn finalize(self) -> StrongDigest {
        match self.inner {
            Inner::Sha256(hasher) => StrongDigest::from_slice(&hasher.finalize()),
            Inner::Sha1(hasher) => StrongDigest::from_slice(&hasher.finalize()),
            Inner::Md5(hasher) => StrongDigest::from_slice(&hasher.finalize()),
            Inner::Xxh3_128(hasher) => {
                StrongDigest::from_slice(&hasher.digest128().to_be_bytes())
            }
        }
    }
}

impl std::fmt::Debug for StrongHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrongHasher")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}
