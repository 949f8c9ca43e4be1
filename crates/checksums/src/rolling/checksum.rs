use std::io::{self, Read};
use std::num::NonZeroUsize;

use super::window::Window;
use super::{RollingDigest, RollingError, accumulate, weight};

/// Rolling checksum that owns the bytes of its window.
///
/// The window holds at most `block_len` bytes. [`reset_from_slice`] and
/// [`reset_from_reader`] reposition it in O(`block_len`); [`roll`] slides it
/// by one byte in O(1) and returns the byte that left the window.
///
/// [`reset_from_slice`]: Self::reset_from_slice
/// [`reset_from_reader`]: Self::reset_from_reader
/// [`roll`]: Self::roll
#[derive(Clone, Debug)]
pub struct RollingChecksum {
    s1: u32,
    s2: u32,
    window: Window,
}

impl RollingChecksum {
    /// Creates an empty checksum whose window holds at most `block_len` bytes.
    #[must_use]
    pub fn new(block_len: NonZeroUsize) -> Self {
        Self {
            s1: 0,
            s2: 0,
            window: Window::with_capacity(block_len.get()),
        }
    }

    /// Maximum number of bytes the window can hold.
    #[must_use]
    pub fn block_len(&self) -> usize {
        self.window.capacity()
    }

    /// Number of bytes currently under the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Reports whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.len() == 0
    }

    /// Repositions the window at `data[offset..]`, taking up to `block_len` bytes.
    ///
    /// Returns the number of bytes now under the window. An `offset` past the
    /// end of `data` leaves the window empty.
    pub fn reset_from_slice(&mut self, data: &[u8], offset: usize) -> usize {
        let tail = data.get(offset..).unwrap_or_default();
        let filled = self.window.fill_from_slice(tail);
        let (s1, s2) = accumulate(0, 0, filled);
        let len = filled.len();
        self.store(s1, s2);
        len
    }

    /// Repositions the window over the next `block_len` bytes of `reader`.
    ///
    /// Fewer bytes are taken only when the reader reaches end of stream; zero
    /// means the reader is exhausted. Interrupted reads are retried.
    ///
    /// # Errors
    ///
    /// Propagates any other I/O error from `reader`. The window is left empty
    /// in that case.
    pub fn reset_from_reader<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<usize> {
        self.s1 = 0;
        self.s2 = 0;
        let filled = self.window.fill_from_reader(reader)?;
        let (s1, s2) = accumulate(0, 0, filled);
        let len = filled.len();
        self.store(s1, s2);
        Ok(len)
    }

    /// Slides the window forward by one byte.
    ///
    /// `incoming` is appended at the end of the window and the oldest byte is
    /// returned. The window length does not change.
    ///
    /// # Errors
    ///
    /// Returns [`RollingError::EmptyWindow`] when no bytes are under the window
    /// and [`RollingError::WindowTooLarge`] when the window length does not fit
    /// in 32 bits. The checksum is unchanged on error.
    pub fn roll(&mut self, incoming: u8) -> Result<u8, RollingError> {
        let len = self.window_len_u32()?;
        let outgoing = self
            .window
            .replace_oldest(incoming)
            .ok_or(RollingError::EmptyWindow)?;

        let out = weight(outgoing);
        let s1 = self.s1.wrapping_sub(out).wrapping_add(weight(incoming));
        let s2 = self.s2.wrapping_sub(len.wrapping_mul(out)).wrapping_add(s1);
        self.store(s1, s2);
        Ok(outgoing)
    }

    /// Drops the oldest byte without appending a replacement.
    ///
    /// Used at end of input, where the window can only shrink. Returns `None`
    /// once the window is empty.
    pub fn shrink_front(&mut self) -> Option<u8> {
        let len = u32::try_from(self.window.len()).ok()?;
        let outgoing = self.window.pop_front()?;
        let out = weight(outgoing);
        let s1 = self.s1.wrapping_sub(out);
        let s2 = self.s2.wrapping_sub(len.wrapping_mul(out));
        self.store(s1, s2);
        Some(outgoing)
    }

    /// Packed weak checksum of the current window, `(s2 << 16) | s1`.
    #[must_use]
    pub fn value(&self) -> u32 {
        (self.s2 << 16) | self.s1
    }

    /// Digest of the current window, including its length.
    #[must_use]
    pub fn digest(&self) -> RollingDigest {
        RollingDigest::new(self.s1 as u16, self.s2 as u16, self.window.len())
    }

    /// Returns the window contents in order as one or two slices.
    #[must_use]
    pub fn window_slices(&self) -> (&[u8], &[u8]) {
        self.window.as_slices()
    }

    /// Copies the window contents into a new vector.
    #[must_use]
    pub fn window_to_vec(&self) -> Vec<u8> {
        let (first, second) = self.window.as_slices();
        let mut out = Vec::with_capacity(first.len() + second.len());
        out.extend_from_slice(first);
        out.extend_from_slice(second);
        out
    }

    fn window_len_u32(&self) -> Result<u32, RollingError> {
        let len = self.window.len();
        if len == 0 {
            return Err(RollingError::EmptyWindow);
        }
        u32::try_from(len).map_err(|_| RollingError::WindowTooLarge { len })
    }

    #[inline]
    fn store(&mut self, s1: u32, s2: u32) {
        self.s1 = s1 & 0xffff;
        self.s2 = s2 & 0xffff;
    }
}
