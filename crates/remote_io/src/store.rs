//! crates/remote_io/src/store.rs
//! Minimal primitives every backing store implements.
//!
//! A store only needs to open a forward-only stream at an offset and, when it
//! is cheap, report its size. Offset tracking, slicing and stream reuse are
//! layered on top by [`RemoteByteSource`](crate::RemoteByteSource), so a new
//! backend never reimplements them.

use std::fmt;
use std::io::{self, Read, Write};

/// Boxed forward-only stream returned by [`RangeReadable::open_at`].
pub type ByteStream = Box<dyn Read + Send>;

/// Random-access entry point of a backing object.
pub trait RangeReadable: Send + Sync + fmt::Debug {
    /// Opens a stream starting at `offset`.
    ///
    /// With `len = Some(n)` the stream ends after at most `n` bytes; with
    /// `None` it runs to the end of the object. Opening past the end yields a
    /// stream that is immediately exhausted.
    fn open_at(&self, offset: u64, len: Option<u64>) -> io::Result<ByteStream>;

    /// Total object size, `None` if the store cannot tell.
    fn size(&self) -> io::Result<Option<u64>>;
}

/// Writer that publishes an object only when explicitly finished.
///
/// Dropping a writer without calling [`finish`](Self::finish) must leave the
/// destination untouched.
pub trait ObjectWrite: Write + Send {
    /// Flushes and publishes the object, returning the bytes written.
    fn finish(self: Box<Self>) -> io::Result<u64>;

    /// Discards everything written so far.
    fn abort(self: Box<Self>) -> io::Result<()>;
}

/// Store that can create a new version of its object.
pub trait WritableStore: Send + Sync + fmt::Debug {
    /// Starts writing a replacement object.
    fn create_writer(&self) -> io::Result<Box<dyn ObjectWrite>>;
}

/// Reads the entire object into memory.
pub fn read_all(store: &dyn RangeReadable) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    store.open_at(0, None)?.read_to_end(&mut out)?;
    Ok(out)
}

/// Writes `data` as the new object and publishes it.
pub fn write_all(store: &dyn WritableStore, data: &[u8]) -> io::Result<u64> {
    let mut writer = store.create_writer()?;
    if let Err(error) = writer.write_all(data) {
        // The write error is the one worth reporting.
        let _ = writer.abort();
        return Err(error);
    }
    writer.finish()
}
