//! Fixed-capacity ring buffer holding the bytes under the rolling window.
//!
//! Unlike [`std::collections::VecDeque`], the buffer never grows and exposes
//! its contents as at most two slices, which is all the strong hash needs.

use std::io::{self, Read};

#[derive(Clone, Debug)]
pub(crate) struct Window {
    buffer: Box<[u8]>,
    head: usize,
    len: usize,
}

impl Window {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "window capacity must be non-zero");
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Replaces the contents with up to `capacity` bytes of `data`.
    pub(crate) fn fill_from_slice(&mut self, data: &[u8]) -> &[u8] {
        let len = data.len().min(self.capacity());
        self.buffer[..len].copy_from_slice(&data[..len]);
        self.head = 0;
        self.len = len;
        &self.buffer[..len]
    }

    /// Replaces the contents with up to `capacity` bytes read from `reader`.
    ///
    /// Fewer bytes are only returned when the reader reaches end of stream.
    pub(crate) fn fill_from_reader<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<&[u8]> {
        self.clear();
        let mut filled = 0usize;
        while filled < self.buffer.len() {
            match reader.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        self.len = filled;
        Ok(&self.buffer[..filled])
    }

    /// Drops the oldest byte and appends `incoming`, keeping the length constant.
    ///
    /// Returns `None` when the window is empty.
    #[inline]
    pub(crate) fn replace_oldest(&mut self, incoming: u8) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let capacity = self.buffer.len();
        let outgoing = self.buffer[self.head];
        self.head = (self.head + 1) % capacity;
        let tail = (self.head + self.len - 1) % capacity;
        self.buffer[tail] = incoming;
        Some(outgoing)
    }

    /// Removes and returns the oldest byte.
    #[inline]
    pub(crate) fn pop_front(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let byte = self.buffer[self.head];
        self.head = (self.head + 1) % self.buffer.len();
        self.len -= 1;
        Some(byte)
    }

    /// Returns the contents in logical order as one or two slices.
    pub(crate) fn as_slices(&self) -> (&[u8], &[u8]) {
        if self.len == 0 {
            return (&[], &[]);
        }
        let end = self.head + self.len;
        if end <= self.buffer.len() {
            (&self.buffer[self.head..end], &[])
        } else {
            let second_len = end - self.buffer.len();
            (&self.buffer[self.head..], &self.buffer[..second_len])
        }
    }
}
