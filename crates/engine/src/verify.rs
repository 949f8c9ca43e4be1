//! crates/engine/src/verify.rs
//! Pass-through adapters that hash the bytes flowing through them.

use std::io::{self, Read, Write};

use checksums::{StrongDigest, StrongHashAlgorithm, StrongHasher};

/// Reader that hashes everything read through it.
pub struct HashingReader<R> {
    inner: R,
    hasher: StrongHasher,
    bytes: u64,
}

impl<R: Read> HashingReader<R> {
    /// Wraps `inner`.
    pub fn new(inner: R, algorithm: StrongHashAlgorithm) -> Self {
        Self {
            inner,
            hasher: StrongHasher::new(algorithm),
            bytes: 0,
        }
    }

    /// Bytes read so far.
    #[must_use]
    pub const fn bytes_read(&self) -> u64 {
        self.bytes
    }

    /// Digest and length of everything read.
    #[must_use]
    pub fn finish(self) -> (StrongDigest, u64) {
        (self.hasher.finalize(), self.bytes)
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.hasher.update(&buf[..read]);
        self.bytes += read as u64;
        Ok(read)
    }
}

/// Writer that counts and optionally hashes what it forwards.
pub(crate) struct Tee<'a, W: ?Sized> {
    inner: &'a mut W,
    hasher: Option<&'a mut StrongHasher>,
    written: u64,
}

impl<'a, W: Write + ?Sized> Tee<'a, W> {
    pub(crate) fn new(inner: &'a mut W, hasher: Option<&'a mut StrongHasher>) -> Self {
        Self {
            inner,
            hasher,
            written: 0,
        }
    }

    pub(crate) const fn written(&self) -> u64 {
        self.written
    }
}

impl<W: Write + ?Sized> Write for Tee<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        if let Some(hasher) = self.hasher.as_deref_mut() {
            hasher.update(&buf[..written]);
        }
        self.written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
