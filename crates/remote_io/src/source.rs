//! crates/remote_io/src/source.rs
//! Slice-tracking byte source with forward stream reuse.
//!
//! Object stores make a fresh ranged read expensive (one round trip) while
//! continuing an open stream is cheap. [`RemoteByteSource`] therefore keeps
//! one open stream and its offset in a cursor shared by every view derived
//! with [`RemoteByteSource::slice`]. A copy whose start is at or slightly
//! ahead of the cursor skips forward on the open stream; a copy that starts
//! behind it, or too far ahead, reopens at the requested offset.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use logging::{trace_io, trace_slice};

use crate::error::{SliceError, SourceError};
use crate::slice::Slice;
use crate::store::{ByteStream, RangeReadable};

/// Largest forward gap skipped on an open stream before reopening instead.
pub const DEFAULT_MAX_FORWARD_SKIP: u64 = 16 * 1024 * 1024;

/// Counters describing how a source (and every slice of it) used its stream.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SourceStats {
    /// Streams opened against the backing store.
    pub opens: u64,
    /// Bytes read and discarded to move the stream forward.
    pub bytes_skipped: u64,
    /// Bytes delivered to callers through [`RemoteByteSource::copy_to`].
    pub bytes_copied: u64,
}

#[derive(Default)]
struct StreamCursor {
    stream: Option<ByteStream>,
    offset: u64,
    stats: SourceStats,
}

/// A view over a backing store that reads ranges through a shared cursor.
///
/// Views created by [`slice`](Self::slice) share the cursor with their
/// parent, so a receiver that copies mostly ascending ranges reuses a single
/// stream. The cursor is meant for one logical reader at a time: it is safe
/// to share across threads, but interleaved readers will keep reopening.
#[derive(Clone)]
pub struct RemoteByteSource {
    store: Arc<dyn RangeReadable>,
    view: Option<Slice>,
    cursor: Arc<Mutex<StreamCursor>>,
    max_forward_skip: u64,
}

impl RemoteByteSource {
    /// Wraps a store; the initial view is the whole object.
    pub fn new(store: Arc<dyn RangeReadable>) -> Self {
        Self {
            store,
            view: None,
            cursor: Arc::new(Mutex::new(StreamCursor::default())),
            max_forward_skip: DEFAULT_MAX_FORWARD_SKIP,
        }
    }

    /// Sets the largest gap skipped on an open stream.
    pub fn with_max_forward_skip(mut self, bytes: u64) -> Self {
        self.max_forward_skip = bytes;
        self
    }

    /// Backing store of the source.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RangeReadable> {
        &self.store
    }

    /// Explicit view of this source, `None` for the whole object.
    #[must_use]
    pub const fn view(&self) -> Option<Slice> {
        self.view
    }

    /// Returns a view of `length` bytes starting `offset` bytes into this one.
    ///
    /// No I/O is performed; the new view shares this source's stream.
    pub fn slice(&self, offset: u64, length: u64) -> Result<Self, SliceError> {
        let view = match self.view {
            Some(current) => current.reslice(offset, length)?,
            None => Slice::new(offset, length)?,
        };
        trace_slice!(%view, "derived slice");
        Ok(Self {
            store: Arc::clone(&self.store),
            view: Some(view),
            cursor: Arc::clone(&self.cursor),
            max_forward_skip: self.max_forward_skip,
        })
    }

    /// Length of the view if it was sliced, otherwise the store's size.
    pub fn size_if_known(&self) -> io::Result<Option<u64>> {
        match self.view {
            Some(view) => Ok(Some(view.length())),
            None => self.store.size(),
        }
    }

    /// Snapshot of the shared cursor counters.
    pub fn stats(&self) -> io::Result<SourceStats> {
        Ok(self.lock()?.stats)
    }

    /// Closes the shared stream, if one is open.
    pub fn release(&self) -> io::Result<()> {
        let mut cursor = self.lock()?;
        if cursor.stream.take().is_some() {
            trace_io!(offset = cursor.offset, "released stream");
        }
        Ok(())
    }

    /// Opens a stream over exactly this view.
    ///
    /// The shared stream is handed over when it already sits at the view's
    /// start; otherwise a new ranged stream is opened. Either way the shared
    /// cursor no longer owns a stream afterwards.
    pub fn open_stream(&self) -> io::Result<ByteStream> {
        let (start, limit) = self.bounds();
        let reusable = {
            let mut cursor = self.lock()?;
            if cursor.offset == start {
                cursor.stream.take()
            } else {
                cursor.stream = None;
                None
            }
        };
        let stream = match reusable {
            Some(stream) => {
                trace_io!(offset = start, "reusing stream");
                stream
            }
            None => {
                self.lock()?.stats.opens += 1;
                return self.store.open_at(start, limit);
            }
        };
        Ok(match limit {
            Some(limit) => Box::new(stream.take(limit)),
            None => stream,
        })
    }

    /// Copies the bytes of this view into `sink`.
    ///
    /// A view with an explicit slice copies exactly its length and fails with
    /// [`SourceError::Truncated`] when the store ends early. The whole-object
    /// view copies to end of stream. Any failure closes the shared stream.
    pub fn copy_to<W>(&self, sink: &mut W) -> Result<u64, SourceError>
    where
        W: Write + ?Sized,
    {
        let (start, limit) = self.bounds();
        if limit == Some(0) {
            return Ok(0);
        }

        // The stream is taken out so the lock is not held across I/O.
        let (stream, position) = {
            let mut cursor = self.lock()?;
            (cursor.stream.take(), cursor.offset)
        };

        let mut stats = SourceStats::default();
        let result = self.copy_with(stream, position, start, limit, sink, &mut stats);

        let mut cursor = self.lock()?;
        cursor.stats.opens += stats.opens;
        cursor.stats.bytes_skipped += stats.bytes_skipped;
        cursor.stats.bytes_copied += stats.bytes_copied;
        match result {
            Ok((stream, offset, copied)) => {
                cursor.stream = Some(stream);
                cursor.offset = offset;
                Ok(copied)
            }
            Err(error) => {
                cursor.stream = None;
                Err(error)
            }
        }
    }

    fn copy_with<W>(
        &self,
        stream: Option<ByteStream>,
        position: u64,
        start: u64,
        limit: Option<u64>,
        sink: &mut W,
        stats: &mut SourceStats,
    ) -> Result<(ByteStream, u64, u64), SourceError>
    where
        W: Write + ?Sized,
    {
        let reuse = stream.filter(|_| start >= position && start - position <= self.max_forward_skip);
        let (mut stream, mut offset) = match reuse {
            Some(stream) => (stream, position),
            None => {
                trace_io!(from = position, to = start, "opening stream");
                stats.opens += 1;
                (self.store.open_at(start, None)?, start)
            }
        };

        let gap = start - offset;
        if gap > 0 {
            let skipped = io::copy(&mut (&mut stream).take(gap), &mut io::sink())?;
            stats.bytes_skipped += skipped;
            offset += skipped;
            if skipped < gap {
                return Err(SourceError::Truncated {
                    offset: start,
                    expected: limit.unwrap_or(gap),
                    actual: 0,
                });
            }
        }

        let copied = match limit {
            Some(len) => {
                let copied = io::copy(&mut (&mut stream).take(len), sink)?;
                stats.bytes_copied += copied;
                if copied < len {
                    return Err(SourceError::Truncated {
                        offset: start,
                        expected: len,
                        actual: copied,
                    });
                }
                copied
            }
            None => {
                let copied = io::copy(&mut stream, sink)?;
                stats.bytes_copied += copied;
                copied
            }
        };
        offset += copied;
        trace_slice!(start, copied, "copied slice");
        Ok((stream, offset, copied))
    }

    fn bounds(&self) -> (u64, Option<u64>) {
        match self.view {
            Some(view) => (view.offset(), Some(view.length())),
            None => (0, None),
        }
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, StreamCursor>> {
        self.cursor
            .lock()
            .map_err(|_| io::Error::other("source cursor lock poisoned"))
    }
}

impl fmt::Debug for RemoteByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteByteSource")
            .field("store", &self.store)
            .field("view", &self.view)
            .field("max_forward_skip", &self.max_forward_skip)
            .finish_non_exhaustive()
    }
}
