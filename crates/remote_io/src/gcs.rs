//! crates/remote_io/src/gcs.rs
//! Google Cloud Storage backend.
//!
//! Same shape as the S3 backend: the handle owns a tokio runtime, ranged
//! reads come back as a byte stream bridged to `Read`, and writes are
//! buffered into chunks. Objects up to one chunk are written with a single
//! upload; larger objects go through a resumable upload session that is
//! cancelled when the writer is aborted.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use futures_util::TryStreamExt;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::Error as GcsError;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::resumable_upload_client::{
    ChunkSize, ResumableUploadClient, UploadStatus,
};
use logging::trace_io;
use tokio::runtime::Runtime;
use tokio_util::io::{StreamReader, SyncIoBridge};

use crate::store::{ByteStream, ObjectWrite, RangeReadable, WritableStore};

/// Bytes sent per resumable upload request. Must be a multiple of 256 KiB.
pub const CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// A single Cloud Storage object addressed by bucket and name.
#[derive(Clone)]
pub struct GcsObject {
    client: Client,
    bucket: String,
    name: String,
    runtime: Arc<Runtime>,
}

impl GcsObject {
    /// Creates a handle from an existing client and runtime.
    pub fn new(
        client: Client,
        runtime: Arc<Runtime>,
        bucket: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            name: name.into(),
            runtime,
        }
    }

    /// Creates a handle using application default credentials.
    pub fn from_env(bucket: impl Into<String>, name: impl Into<String>) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let config = runtime
            .block_on(ClientConfig::default().with_auth())
            .map_err(io::Error::other)?;
        Ok(Self::new(Client::new(config), Arc::new(runtime), bucket, name))
    }

    /// Bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn get_request(&self) -> GetObjectRequest {
        GetObjectRequest {
            bucket: self.bucket.clone(),
            object: self.name.clone(),
            ..GetObjectRequest::default()
        }
    }

    fn upload_request(&self) -> (UploadObjectRequest, UploadType) {
        let request = UploadObjectRequest {
            bucket: self.bucket.clone(),
            ..UploadObjectRequest::default()
        };
        (request, UploadType::Simple(Media::new(self.name.clone())))
    }
}

impl fmt::Debug for GcsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcsObject")
            .field("bucket", &self.bucket)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Inclusive byte range for a read of `len` bytes at `offset`.
fn byte_range(offset: u64, len: Option<u64>) -> Range {
    match len {
        Some(len) => Range(Some(offset), Some(offset + len - 1)),
        None => Range(Some(offset), None),
    }
}

fn is_unsatisfiable_range(error: &GcsError) -> bool {
    matches!(error, GcsError::Response(response) if response.code == 416)
}

impl RangeReadable for GcsObject {
    fn open_at(&self, offset: u64, len: Option<u64>) -> io::Result<ByteStream> {
        if len == Some(0) {
            return Ok(Box::new(io::empty()));
        }
        let range = byte_range(offset, len);
        trace_io!(bucket = %self.bucket, name = %self.name, offset, ?len, "gcs download");
        let response = self
            .runtime
            .block_on(self.client.download_streamed_object(&self.get_request(), &range));
        let stream = match response {
            Ok(stream) => stream,
            // A range starting past the end reads as an exhausted stream.
            Err(error) if is_unsatisfiable_range(&error) => return Ok(Box::new(io::empty())),
            Err(error) => return Err(io::Error::other(error)),
        };
        let body = Box::pin(StreamReader::new(stream.map_err(io::Error::other)));
        Ok(Box::new(SyncIoBridge::new_with_handle(
            body,
            self.runtime.handle().clone(),
        )))
    }

    fn size(&self) -> io::Result<Option<u64>> {
        let object = self
            .runtime
            .block_on(self.client.get_object(&self.get_request()))
            .map_err(io::Error::other)?;
        Ok(u64::try_from(object.size).ok())
    }
}

impl WritableStore for GcsObject {
    fn create_writer(&self) -> io::Result<Box<dyn ObjectWrite>> {
        Ok(Box::new(GcsWriter {
            object: self.clone(),
            buffer: Vec::with_capacity(CHUNK_SIZE),
            session: None,
            uploaded: 0,
            written: 0,
        }))
    }
}

/// Buffers one chunk at a time; opens a resumable session once the object
/// grows past [`CHUNK_SIZE`].
struct GcsWriter {
    object: GcsObject,
    buffer: Vec<u8>,
    session: Option<ResumableUploadClient>,
    uploaded: u64,
    written: u64,
}

impl GcsWriter {
    fn session(&mut self) -> io::Result<ResumableUploadClient> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }
        let object = &self.object;
        let (request, upload_type) = object.upload_request();
        let session = object
            .runtime
            .block_on(object.client.prepare_resumable_upload(&request, &upload_type))
            .map_err(io::Error::other)?;
        trace_io!(name = %object.name, "started resumable upload");
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Sends the buffer as the next chunk. `total` is known only for the last.
    fn upload_chunk(&mut self, total: Option<u64>) -> io::Result<()> {
        let session = self.session()?;
        let data = std::mem::replace(&mut self.buffer, Vec::with_capacity(CHUNK_SIZE));
        let len = data.len() as u64;
        if len == 0 {
            return Err(io::Error::other("empty resumable upload chunk"));
        }
        let chunk = ChunkSize::new(self.uploaded, self.uploaded + len - 1, total);
        let status = self
            .object
            .runtime
            .block_on(session.upload_multiple_chunk(data, &chunk))
            .map_err(io::Error::other)?;
        self.uploaded += len;
        match (status, total) {
            (UploadStatus::Ok(_), Some(_)) | (UploadStatus::ResumeIncomplete(_), None) => Ok(()),
            (UploadStatus::NotStarted, _) => Err(io::Error::other("resumable upload did not start")),
            (UploadStatus::Ok(_), None) => Err(io::Error::other("resumable upload completed early")),
            (UploadStatus::ResumeIncomplete(_), Some(_)) => {
                Err(io::Error::other("resumable upload incomplete after last chunk"))
            }
        }
    }

    fn complete(&mut self) -> io::Result<()> {
        if self.session.is_some() {
            if self.buffer.is_empty() {
                // The final request must carry at least one byte, so the last
                // full chunk was held back by `write`.
                return Err(io::Error::other("no data left for the final chunk"));
            }
            return self.upload_chunk(Some(self.written));
        }
        let object = &self.object;
        let data = std::mem::take(&mut self.buffer);
        let (request, upload_type) = object.upload_request();
        object
            .runtime
            .block_on(object.client.upload_object(&request, data, &upload_type))
            .map_err(io::Error::other)?;
        Ok(())
    }

    fn cancel(&mut self) -> io::Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        trace_io!(name = %self.object.name, "cancelling resumable upload");
        self.object
            .runtime
            .block_on(session.cancel())
            .map_err(io::Error::other)
    }
}

impl Write for GcsWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // A full chunk is only sent once more data arrives, so `finish`
        // always has bytes for the request that declares the total size.
        if self.buffer.len() == CHUNK_SIZE {
            let uploaded = self.upload_chunk(None);
            if uploaded.is_err() {
                let _ = self.cancel();
            }
            uploaded?;
        }
        let room = CHUNK_SIZE - self.buffer.len();
        let n = buf.len().min(room);
        self.buffer.extend_from_slice(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ObjectWrite for GcsWriter {
    fn finish(mut self: Box<Self>) -> io::Result<u64> {
        if let Err(error) = self.complete() {
            let _ = self.cancel();
            return Err(error);
        }
        trace_io!(name = %self.object.name, written = self.written, "published gcs object");
        Ok(self.written)
    }

    fn abort(mut self: Box<Self>) -> io::Result<()> {
        self.cancel()
    }
}
