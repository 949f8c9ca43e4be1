//! Rolling checksum used to propose candidate block matches.
//!
//! The checksum is an Adler-32 style pair of 16-bit sums over a window of at
//! most `block_len` bytes:
//!
//! - `s1` is the sum of `byte + CHAR_OFFSET` over the window,
//! - `s2` is the sum of the running `s1` prefix sums,
//!
//! packed as `(s2 << 16) | s1`. Sliding the window by one byte only needs the
//! outgoing byte, the incoming byte and the window length, so each step is
//! O(1). Repositioning the window (after a match) costs O(block_len).
//!
//! Collisions are expected. Callers must confirm every weak hit with a strong
//! digest before acting on it.

mod checksum;
mod digest;
mod error;
mod window;

pub use checksum::RollingChecksum;
pub use digest::RollingDigest;
pub use error::RollingError;

/// Value added to every byte before it contributes to the weak sums.
///
/// Without an offset, windows made of zero bytes hash to zero regardless of
/// their length.
pub const CHAR_OFFSET: u32 = 31;

#[inline]
pub(crate) const fn weight(byte: u8) -> u32 {
    byte as u32 + CHAR_OFFSET
}

/// Accumulates `chunk` into the `(s1, s2)` pair without masking.
#[inline]
pub(crate) fn accumulate(mut s1: u32, mut s2: u32, chunk: &[u8]) -> (u32, u32) {
    let mut iter = chunk.chunks_exact(4);
    for block in &mut iter {
        s1 = s1.wrapping_add(weight(block[0]));
        s2 = s2.wrapping_add(s1);

        s1 = s1.wrapping_add(weight(block[1]));
        s2 = s2.wrapping_add(s1);

        s1 = s1.wrapping_add(weight(block[2]));
        s2 = s2.wrapping_add(s1);

        s1 = s1.wrapping_add(weight(block[3]));
        s2 = s2.wrapping_add(s1);
    }

    for &byte in iter.remainder() {
        s1 = s1.wrapping_add(weight(byte));
        s2 = s2.wrapping_add(s1);
    }

    (s1, s2)
}
