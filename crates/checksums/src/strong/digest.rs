use std::fmt;

/// Widest digest produced by any supported algorithm.
pub const MAX_DIGEST_LEN: usize = 32;

/// Strong digest stored inline.
///
/// Digests narrower than [`MAX_DIGEST_LEN`] are zero padded; equality and
/// hashing only consider the first `len` bytes because the padding is always
/// zero.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct StrongDigest {
    bytes: [u8; MAX_DIGEST_LEN],
    len: u8,
}

impl StrongDigest {
    /// Copies `bytes` into a digest, truncating to [`MAX_DIGEST_LEN`].
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        let len = bytes.len().min(MAX_DIGEST_LEN);
        let mut buffer = [0u8; MAX_DIGEST_LEN];
        buffer[..len].copy_from_slice(&bytes[..len]);
        Self {
            bytes: buffer,
            len: len as u8,
        }
    }

    /// Returns the significant digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    /// Digest width in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Reports whether the digest holds no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for StrongDigest {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Display for StrongDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for StrongDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StrongDigest({self})")
    }
}
