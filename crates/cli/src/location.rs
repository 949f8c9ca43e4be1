//! crates/cli/src/location.rs
//! Operand parsing and store construction.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use remote_io::{LocalFile, RangeReadable, WritableStore};
use thiserror::Error;

/// Operand value meaning standard input or output.
pub const STDIO: &str = "-";

/// Where an operand's bytes live.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Location {
    /// Standard input or output, written `-`.
    Stdio,
    /// A local file.
    Local(PathBuf),
    /// An S3 object, written `s3://bucket/key`.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },
    /// A Cloud Storage object, written `gs://bucket/name`.
    Gcs {
        /// Bucket name.
        bucket: String,
        /// Object name.
        name: String,
    },
}

/// Rejected operand.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum LocationError {
    /// The operand was empty.
    #[error("empty location")]
    Empty,
    /// An `s3://` operand without bucket or key.
    #[error("invalid S3 location '{0}', expected s3://bucket/key")]
    InvalidS3(String),
    /// S3 support was not compiled in.
    #[error("'{0}' requires S3 support; rebuild with the `s3` feature")]
    S3Disabled(String),
    /// A `gs://` operand without bucket or object name.
    #[error("invalid Cloud Storage location '{0}', expected gs://bucket/name")]
    InvalidGcs(String),
    /// Cloud Storage support was not compiled in.
    #[error("'{0}' requires Cloud Storage support; rebuild with the `gcs` feature")]
    GcsDisabled(String),
    /// The operand cannot be used in this position.
    #[error("{role} cannot be {location}")]
    Unsupported {
        /// Operand role, such as "baseline".
        role: &'static str,
        /// Offending location.
        location: String,
    },
}

impl Location {
    /// Parses an operand.
    pub fn parse(text: &str) -> Result<Self, LocationError> {
        if text.is_empty() {
            return Err(LocationError::Empty);
        }
        if text == STDIO {
            return Ok(Self::Stdio);
        }
        if let Some(rest) = text.strip_prefix("s3://") {
            let (bucket, key) =
                bucket_and_object(rest).ok_or_else(|| LocationError::InvalidS3(text.to_owned()))?;
            if !cfg!(feature = "s3") {
                return Err(LocationError::S3Disabled(text.to_owned()));
            }
            return Ok(Self::S3 { bucket, key });
        }
        if let Some(rest) = text.strip_prefix("gs://") {
            let (bucket, name) =
                bucket_and_object(rest).ok_or_else(|| LocationError::InvalidGcs(text.to_owned()))?;
            if !cfg!(feature = "gcs") {
                return Err(LocationError::GcsDisabled(text.to_owned()));
            }
            return Ok(Self::Gcs { bucket, name });
        }
        Ok(Self::Local(PathBuf::from(text)))
    }

    /// Reports whether this is `-`.
    #[must_use]
    pub const fn is_stdio(&self) -> bool {
        matches!(self, Self::Stdio)
    }

    /// Store supporting ranged reads, for baselines.
    pub(crate) fn range_store(&self, role: &'static str) -> Result<Arc<dyn RangeReadable>, StoreError> {
        match self {
            Self::Stdio => Err(self.unsupported(role).into()),
            Self::Local(path) => Ok(Arc::new(LocalFile::new(path.clone()))),
            Self::S3 { bucket, key } => s3_object(bucket, key).map(|object| object as Arc<dyn RangeReadable>),
            Self::Gcs { bucket, name } => gcs_object(bucket, name).map(|object| object as Arc<dyn RangeReadable>),
        }
    }

    /// Store accepting atomic writes, for reconstructed outputs.
    pub(crate) fn writable_store(&self, role: &'static str) -> Result<Arc<dyn WritableStore>, StoreError> {
        match self {
            Self::Stdio => Err(self.unsupported(role).into()),
            Self::Local(path) => Ok(Arc::new(LocalFile::new(path.clone()))),
            Self::S3 { bucket, key } => s3_object(bucket, key).map(|object| object as Arc<dyn WritableStore>),
            Self::Gcs { bucket, name } => gcs_object(bucket, name).map(|object| object as Arc<dyn WritableStore>),
        }
    }

    /// Sequential reader over the whole object. `-` reads standard input.
    pub(crate) fn open_reader(&self) -> Result<Box<dyn Read>, StoreError> {
        match self {
            Self::Stdio => Ok(Box::new(io::stdin().lock())),
            Self::Local(path) => Ok(Box::new(File::open(path)?)),
            Self::S3 { bucket, key } => Ok(Box::new(s3_object(bucket, key)?.open_at(0, None)?)),
            Self::Gcs { bucket, name } => Ok(Box::new(gcs_object(bucket, name)?.open_at(0, None)?)),
        }
    }

    fn unsupported(&self, role: &'static str) -> LocationError {
        LocationError::Unsupported {
            role,
            location: self.to_string(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => f.write_str("standard input/output"),
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
            Self::Gcs { bucket, name } => write!(f, "gs://{bucket}/{name}"),
        }
    }
}

/// Failure to turn a [`Location`] into a store.
#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Splits `bucket/object`; both parts must be non-empty.
fn bucket_and_object(rest: &str) -> Option<(String, String)> {
    let (bucket, object) = rest.split_once('/')?;
    if bucket.is_empty() || object.is_empty() {
        return None;
    }
    Some((bucket.to_owned(), object.to_owned()))
}

#[cfg(feature = "s3")]
fn s3_object(bucket: &str, key: &str) -> Result<Arc<remote_io::S3Object>, StoreError> {
    Ok(Arc::new(remote_io::S3Object::from_env(bucket, key)?))
}

#[cfg(not(feature = "s3"))]
fn s3_object(bucket: &str, key: &str) -> Result<Arc<LocalFile>, StoreError> {
    Err(LocationError::S3Disabled(format!("s3://{bucket}/{key}")).into())
}

#[cfg(feature = "gcs")]
fn gcs_object(bucket: &str, name: &str) -> Result<Arc<remote_io::GcsObject>, StoreError> {
    Ok(Arc::new(remote_io::GcsObject::from_env(bucket, name)?))
}

#[cfg(not(feature = "gcs"))]
fn gcs_object(bucket: &str, name: &str) -> Result<Arc<LocalFile>, StoreError> {
    Err(LocationError::GcsDisabled(format!("gs://{bucket}/{name}")).into())
}
