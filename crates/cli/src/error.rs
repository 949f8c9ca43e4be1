//! crates/cli/src/error.rs
//! Front-end failures and their exit codes.

use std::io;

use engine::{EngineError, ErrorKind};
use protocol::WireError;
use thiserror::Error;

use crate::location::{LocationError, StoreError};

/// Errors reported by [`run`](crate::run).
#[derive(Debug, Error)]
pub enum CliError {
    /// An operand cannot be used where it was given.
    #[error(transparent)]
    Location(#[from] LocationError),
    /// `--log-filter` or `DBSYNC_LOG` did not parse.
    #[error("invalid log filter: {0}")]
    LogFilter(String),
    /// The synchronisation itself failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CliError {
    /// Category of the failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Location(_) | Self::LogFilter(_) => ErrorKind::Configuration,
            Self::Engine(error) => error.kind(),
        }
    }

    /// Process exit status: 1 configuration, 2 integrity, 3 I/O.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.kind().exit_code())
    }
}

impl From<io::Error> for CliError {
    fn from(error: io::Error) -> Self {
        Self::Engine(EngineError::Io(error))
    }
}

impl From<WireError> for CliError {
    fn from(error: WireError) -> Self {
        Self::Engine(EngineError::Wire(error))
    }
}

impl From<StoreError> for CliError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Location(error) => Self::Location(error),
            StoreError::Io(error) => error.into(),
        }
    }
}
