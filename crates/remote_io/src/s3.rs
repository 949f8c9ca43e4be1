//! crates/remote_io/src/s3.rs
//! Amazon S3 backend.
//!
//! The engine reads and writes through blocking `std::io` traits, so every SDK
//! call is driven on a tokio runtime owned by the object handle. Response
//! bodies are bridged to `Read` with [`SyncIoBridge`] and stream directly from
//! the connection instead of being buffered.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream as S3Body;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use logging::trace_io;
use tokio::runtime::Runtime;
use tokio_util::io::SyncIoBridge;

use crate::store::{ByteStream, ObjectWrite, RangeReadable, WritableStore};

/// Size of each multipart upload part; objects up to this size use a single
/// `PutObject`.
pub const PART_SIZE: usize = 10 * 1024 * 1024;

/// A single S3 object addressed by bucket and key.
#[derive(Clone)]
pub struct S3Object {
    client: Client,
    bucket: String,
    key: String,
    runtime: Arc<Runtime>,
}

impl S3Object {
    /// Creates a handle from an existing client and runtime.
    pub fn new(
        client: Client,
        runtime: Arc<Runtime>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
            runtime,
        }
    }

    /// Creates a handle using credentials and region from the environment.
    pub fn from_env(bucket: impl Into<String>, key: impl Into<String>) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let conf = runtime.block_on(aws_config::load_from_env());
        let client = Client::new(&conf);
        Ok(Self::new(client, Arc::new(runtime), bucket, key))
    }

    /// Bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for S3Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Object")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

fn range_header(offset: u64, len: Option<u64>) -> Option<String> {
    match len {
        Some(len) => Some(format!("bytes={}-{}", offset, offset + len - 1)),
        None if offset == 0 => None,
        None => Some(format!("bytes={offset}-")),
    }
}

fn is_unsatisfiable_range<E>(error: &aws_sdk_s3::error::SdkError<E>) -> bool {
    error
        .raw_response()
        .is_some_and(|response| response.status().as_u16() == 416)
}

impl RangeReadable for S3Object {
    fn open_at(&self, offset: u64, len: Option<u64>) -> io::Result<ByteStream> {
        if len == Some(0) {
            return Ok(Box::new(io::empty()));
        }
        let range = range_header(offset, len);
        trace_io!(bucket = %self.bucket, key = %self.key, ?range, "s3 get_object");
        let response = self.runtime.block_on(
            self.client
                .get_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .set_range(range)
                .send(),
        );
        let output = match response {
            Ok(output) => output,
            // A range starting past the end reads as an exhausted stream.
            Err(error) if is_unsatisfiable_range(&error) => return Ok(Box::new(io::empty())),
            Err(error) => return Err(io::Error::other(error)),
        };
        let body = Box::pin(output.body.into_async_read());
        Ok(Box::new(SyncIoBridge::new_with_handle(
            body,
            self.runtime.handle().clone(),
        )))
    }

    fn size(&self) -> io::Result<Option<u64>> {
        let head = self
            .runtime
            .block_on(
                self.client
                    .head_object()
                    .bucket(&self.bucket)
                    .key(&self.key)
                    .send(),
            )
            .map_err(io::Error::other)?;
        Ok(head
            .content_length()
            .and_then(|len| u64::try_from(len).ok()))
    }
}

impl WritableStore for S3Object {
    fn create_writer(&self) -> io::Result<Box<dyn ObjectWrite>> {
        Ok(Box::new(S3Writer {
            object: self.clone(),
            buffer: Vec::with_capacity(PART_SIZE),
            upload_id: None,
            parts: Vec::new(),
            written: 0,
        }))
    }
}

/// Buffers one part at a time; switches to a multipart upload once the
/// object grows past [`PART_SIZE`].
struct S3Writer {
    object: S3Object,
    buffer: Vec<u8>,
    upload_id: Option<String>,
    parts: Vec<CompletedPart>,
    written: u64,
}

impl S3Writer {
    fn upload_id(&mut self) -> io::Result<String> {
        if let Some(id) = &self.upload_id {
            return Ok(id.clone());
        }
        let object = &self.object;
        let created = object
            .runtime
            .block_on(
                object
                    .client
                    .create_multipart_upload()
                    .bucket(&object.bucket)
                    .key(&object.key)
                    .send(),
            )
            .map_err(io::Error::other)?;
        let id = created
            .upload_id()
            .map(str::to_owned)
            .ok_or_else(|| io::Error::other("create_multipart_upload returned no upload id"))?;
        trace_io!(key = %object.key, upload_id = %id, "started multipart upload");
        self.upload_id = Some(id.clone());
        Ok(id)
    }

    fn upload_part(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let upload_id = self.upload_id()?;
        let part_number = i32::try_from(self.parts.len() + 1)
            .map_err(|_| io::Error::other("too many multipart parts"))?;
        let data = std::mem::replace(&mut self.buffer, Vec::with_capacity(PART_SIZE));
        let object = &self.object;
        let uploaded = object
            .runtime
            .block_on(
                object
                    .client
                    .upload_part()
                    .bucket(&object.bucket)
                    .key(&object.key)
                    .upload_id(&upload_id)
                    .part_number(part_number)
                    .body(S3Body::from(data))
                    .send(),
            )
            .map_err(io::Error::other)?;
        self.parts.push(
            CompletedPart::builder()
                .part_number(part_number)
                .set_e_tag(uploaded.e_tag().map(str::to_owned))
                .build(),
        );
        Ok(())
    }

    fn complete(&mut self) -> io::Result<()> {
        let object = &self.object;
        let Some(upload_id) = self.upload_id.clone() else {
            let data = std::mem::take(&mut self.buffer);
            object
                .runtime
                .block_on(
                    object
                        .client
                        .put_object()
                        .bucket(&object.bucket)
                        .key(&object.key)
                        .body(S3Body::from(data))
                        .send(),
                )
                .map_err(io::Error::other)?;
            return Ok(());
        };
        self.upload_part()?;
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(std::mem::take(&mut self.parts)))
            .build();
        let object = &self.object;
        object
            .runtime
            .block_on(
                object
                    .client
                    .complete_multipart_upload()
                    .bucket(&object.bucket)
                    .key(&object.key)
                    .upload_id(upload_id)
                    .multipart_upload(completed)
                    .send(),
            )
            .map_err(io::Error::other)?;
        Ok(())
    }

    fn abort_upload(&mut self) -> io::Result<()> {
        let Some(upload_id) = self.upload_id.take() else {
            return Ok(());
        };
        let object = &self.object;
        trace_io!(key = %object.key, upload_id = %upload_id, "aborting multipart upload");
        object
            .runtime
            .block_on(
                object
                    .client
                    .abort_multipart_upload()
                    .bucket(&object.bucket)
                    .key(&object.key)
                    .upload_id(upload_id)
                    .send(),
            )
            .map_err(io::Error::other)?;
        Ok(())
    }
}

impl Write for S3Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = PART_SIZE - self.buffer.len();
        let n = buf.len().min(room);
        self.buffer.extend_from_slice(&buf[..n]);
        self.written += n as u64;
        if self.buffer.len() == PART_SIZE {
            let uploaded = self.upload_part();
            if uploaded.is_err() {
                let _ = self.abort_upload();
            }
            uploaded?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ObjectWrite for S3Writer {
    fn finish(mut self: Box<Self>) -> io::Result<u64> {
        if let Err(error) = self.complete() {
            let _ = self.abort_upload();
            return Err(error);
        }
        trace_io!(key = %self.object.key, written = self.written, "published s3 object");
        Ok(self.written)
    }

    fn abort(mut self: Box<Self>) -> io::Result<()> {
        self.abort_upload()
    }
}
