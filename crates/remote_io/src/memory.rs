//! crates/remote_io/src/memory.rs
//! In-memory backend for tests and small payloads.

use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, RwLock};

use crate::store::{ByteStream, ObjectWrite, RangeReadable, WritableStore};

/// An object held in memory.
///
/// Clones share the same content. Readers work on a snapshot taken when the
/// stream is opened, so a concurrent [`ObjectWrite::finish`] never changes
/// bytes under an open stream.
#[derive(Clone, Debug, Default)]
pub struct InMemory {
    content: Arc<RwLock<Arc<[u8]>>>,
}

impl InMemory {
    /// Creates an object holding `data`.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Self {
            content: Arc::new(RwLock::new(Arc::from(data))),
        }
    }

    /// Current content.
    pub fn snapshot(&self) -> io::Result<Arc<[u8]>> {
        self.content
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| poisoned())
    }

    /// Current content as an owned vector.
    pub fn to_vec(&self) -> io::Result<Vec<u8>> {
        Ok(self.snapshot()?.to_vec())
    }

    fn replace(&self, data: Vec<u8>) -> io::Result<()> {
        let mut guard = self.content.write().map_err(|_| poisoned())?;
        *guard = Arc::from(data);
        Ok(())
    }
}

fn poisoned() -> io::Error {
    io::Error::other("in-memory object lock poisoned")
}

impl RangeReadable for InMemory {
    fn open_at(&self, offset: u64, len: Option<u64>) -> io::Result<ByteStream> {
        let mut cursor = Cursor::new(self.snapshot()?);
        cursor.set_position(offset);
        Ok(match len {
            Some(limit) => Box::new(cursor.take(limit)),
            None => Box::new(cursor),
        })
    }

    fn size(&self) -> io::Result<Option<u64>> {
        Ok(Some(self.snapshot()?.len() as u64))
    }
}

impl WritableStore for InMemory {
    fn create_writer(&self) -> io::Result<Box<dyn ObjectWrite>> {
        Ok(Box::new(MemoryWriter {
            target: self.clone(),
            buffer: Vec::new(),
        }))
    }
}

struct MemoryWriter {
    target: InMemory,
    buffer: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ObjectWrite for MemoryWriter {
    fn finish(self: Box<Self>) -> io::Result<u64> {
        let Self { target, buffer } = *self;
        let written = buffer.len() as u64;
        target.replace(buffer)?;
        Ok(written)
    }

    fn abort(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}
