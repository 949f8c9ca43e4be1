//! crates/remote_io/src/local.rs
//! Local filesystem backend.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use logging::trace_io;
use tempfile::NamedTempFile;

use crate::store::{ByteStream, ObjectWrite, RangeReadable, WritableStore};

/// A file on the local filesystem.
///
/// Reads open a fresh handle per stream. Writes go to a temporary file next to
/// the destination that replaces it atomically on [`ObjectWrite::finish`], so
/// an interrupted reconstruction never leaves a half-written destination.
#[derive(Clone, Debug)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    /// Wraps `path`; the file does not need to exist until it is read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl RangeReadable for LocalFile {
    fn open_at(&self, offset: u64, len: Option<u64>) -> io::Result<ByteStream> {
        let mut file = File::open(&self.path)?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))?;
        }
        trace_io!(path = %self.path.display(), offset, ?len, "opened local stream");
        Ok(match len {
            Some(limit) => Box::new(file.take(limit)),
            None => Box::new(file),
        })
    }

    fn size(&self) -> io::Result<Option<u64>> {
        Ok(Some(std::fs::metadata(&self.path)?.len()))
    }
}

impl WritableStore for LocalFile {
    fn create_writer(&self) -> io::Result<Box<dyn ObjectWrite>> {
        let temp = NamedTempFile::new_in(self.parent_dir())?;
        Ok(Box::new(LocalWriter {
            inner: BufWriter::new(temp),
            destination: self.path.clone(),
            written: 0,
        }))
    }
}

struct LocalWriter {
    inner: BufWriter<NamedTempFile>,
    destination: PathBuf,
    written: u64,
}

impl Write for LocalWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl ObjectWrite for LocalWriter {
    fn finish(self: Box<Self>) -> io::Result<u64> {
        let Self {
            inner,
            destination,
            written,
        } = *self;
        let temp = inner.into_inner().map_err(io::IntoInnerError::into_error)?;
        temp.as_file().sync_all()?;
        temp.persist(&destination).map_err(|err| err.error)?;
        trace_io!(path = %destination.display(), written, "published local file");
        Ok(written)
    }

    fn abort(self: Box<Self>) -> io::Result<()> {
        let (temp, _) = self.inner.into_parts();
        temp.close()
    }
}
