use super::accumulate;

/// Digest produced by the rolling checksum.
///
/// The digest records the number of bytes it covers so that a checksum over a
/// short final block never compares equal to a full-length window by accident.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct RollingDigest {
    s1: u16,
    s2: u16,
    len: usize,
}

impl RollingDigest {
    /// Creates a digest from individual components.
    #[must_use]
    pub const fn new(sum1: u16, sum2: u16, len: usize) -> Self {
        Self {
            s1: sum1,
            s2: sum2,
            len,
        }
    }

    /// Computes the digest of `block` in one pass.
    #[must_use]
    pub fn from_bytes(block: &[u8]) -> Self {
        let (s1, s2) = accumulate(0, 0, block);
        Self {
            s1: (s1 & 0xffff) as u16,
            s2: (s2 & 0xffff) as u16,
            len: block.len(),
        }
    }

    /// Returns the first checksum component (sum of offset bytes).
    #[must_use]
    pub const fn sum1(&self) -> u16 {
        self.s1
    }

    /// Returns the second checksum component (sum of prefix sums).
    #[must_use]
    pub const fn sum2(&self) -> u16 {
        self.s2
    }

    /// Returns the number of bytes that contributed to the digest.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Reports whether the digest covers zero bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the checksum in its packed 32-bit representation, `(s2 << 16) | s1`.
    #[must_use]
    pub const fn value(&self) -> u32 {
        ((self.s2 as u32) << 16) | (self.s1 as u32)
    }
}
