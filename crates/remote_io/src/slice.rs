//! crates/remote_io/src/slice.rs
//! Offset/length views over a byte source.

use std::fmt;

use crate::error::SliceError;

/// A `[offset, offset + length)` view over a byte source.
///
/// Slices compose: re-slicing keeps the new view inside the old one, clamping
/// the end and never wrapping. Arithmetic that would overflow `u64` is
/// reported as [`SliceError::Overflow`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Slice {
    offset: u64,
    length: u64,
}

impl Slice {
    /// Creates a slice, rejecting ranges whose end does not fit in `u64`.
    pub fn new(offset: u64, length: u64) -> Result<Self, SliceError> {
        offset
            .checked_add(length)
            .ok_or(SliceError::Overflow { offset, length })?;
        Ok(Self { offset, length })
    }

    /// The widest possible view: offset zero, length `u64::MAX`.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            offset: 0,
            length: u64::MAX,
        }
    }

    /// First byte of the view.
    #[must_use]
    #[inline]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of bytes in the view.
    #[must_use]
    #[inline]
    pub const fn length(&self) -> u64 {
        self.length
    }

    /// Reports whether the view covers no bytes.
    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// One past the last byte of the view.
    #[must_use]
    #[inline]
    pub const fn end_exclusive(&self) -> u64 {
        // Checked at construction.
        self.offset + self.length
    }

    /// Last byte of the view, `None` for an empty view.
    #[must_use]
    pub const fn end_inclusive(&self) -> Option<u64> {
        if self.length == 0 {
            None
        } else {
            Some(self.end_exclusive() - 1)
        }
    }

    /// Narrows the view to `length` bytes starting `offset` bytes into it.
    ///
    /// The new end is clamped to this slice's end. An `offset` at or past the
    /// end yields an empty slice positioned at `self.offset() + offset`.
    pub fn reslice(&self, offset: u64, length: u64) -> Result<Self, SliceError> {
        let start = self
            .offset
            .checked_add(offset)
            .ok_or(SliceError::Overflow {
                offset: self.offset,
                length: offset,
            })?;
        let requested_end = start
            .checked_add(length)
            .ok_or(SliceError::Overflow {
                offset: start,
                length,
            })?;
        let end = requested_end.min(self.end_exclusive());
        Ok(Self {
            offset: start,
            length: end.saturating_sub(start),
        })
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, +{})", self.offset, self.length)
    }
}
