#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `cli` implements the `dbsync` command-line front end. It parses arguments
//! with `clap`, installs the tracing subscriber from the `logging` crate and
//! drives an [`engine::SyncSession`] through one of four subcommands:
//!
//! - `signature BASELINE -o SIG` writes the checksum set of a baseline.
//! - `delta SIG TARGET -o DELTA` writes the instruction stream for a target,
//!   using the block size and strong hash recorded in `SIG`.
//! - `patch BASELINE DELTA -o OUT` applies an instruction stream.
//! - `sync BASELINE TARGET -o OUT` runs all three in one process.
//!
//! Operands are local paths, `s3://bucket/key` objects when built with the
//! `s3` feature, `gs://bucket/name` objects when built with the `gcs`
//! feature, or `-` for standard input/output where a stream is read or
//! written sequentially. Baselines always need ranged reads and therefore
//! cannot be `-`.
//!
//! # Design
//!
//! [`run`] never touches the process's real standard streams except through
//! the writers it is handed, which keeps it testable in-process. Failures
//! map to exit codes by category: `1` for usage and configuration errors,
//! `2` for integrity failures, and `3` for I/O failures.
//!
//! # Examples
//!
//! ```
//! let mut stdout = Vec::new();
//! let mut stderr = Vec::new();
//! let status = cli::run(["dbsync", "--version"], &mut stdout, &mut stderr);
//! assert_eq!(status, 0);
//! assert!(String::from_utf8(stdout).unwrap().starts_with("dbsync "));
//! ```

use std::ffi::OsString;
use std::io::{IsTerminal, Write};
use std::process::ExitCode;

use clap::error::ErrorKind as ClapErrorKind;
use logging::{LogConfig, init_tracing};

mod arguments;
mod commands;
mod error;
mod location;
mod report;

pub use arguments::{Action, PROGRAM_NAME, ParsedArgs, clap_command, parse_args};
pub use error::CliError;
pub use location::{Location, LocationError, STDIO};

/// Exit status for usage and configuration errors.
pub const EXIT_USAGE: i32 = 1;

/// Runs the front end with `arguments`, writing to the supplied streams.
///
/// Returns the process exit status.
pub fn run<I, S, Out, Err>(arguments: I, stdout: &mut Out, stderr: &mut Err) -> i32
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
    Out: Write,
    Err: Write,
{
    let parsed = match parse_args(arguments) {
        Ok(parsed) => parsed,
        Err(error) => return report_parse_error(&error, stdout, stderr),
    };

    let mut log_config = LogConfig::from_verbosity(parsed.verbosity)
        .with_filter(parsed.log_filter.clone())
        .with_env_fallback()
        .with_ansi(std::io::stderr().is_terminal());
    for subsystem in &parsed.traced {
        log_config = log_config.trace_subsystem(*subsystem);
    }
    if let Err(error) = init_tracing(&log_config) {
        return report_failure(&CliError::LogFilter(error.to_string()), stderr);
    }

    match commands::execute(&parsed, stdout) {
        Ok(Some(summary)) => {
            let _ = stderr.write_all(summary.as_bytes());
            0
        }
        Ok(None) => 0,
        Err(error) => report_failure(&error, stderr),
    }
}

/// Converts a status returned by [`run`] into an [`ExitCode`].
#[must_use]
pub fn exit_code_from(status: i32) -> ExitCode {
    let clamped = status.clamp(0, i32::from(u8::MAX));
    ExitCode::from(u8::try_from(clamped).unwrap_or(u8::MAX))
}

fn report_parse_error<Out: Write, Err: Write>(
    error: &clap::Error,
    stdout: &mut Out,
    stderr: &mut Err,
) -> i32 {
    match error.kind() {
        ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
            let _ = write!(stdout, "{}", error.render());
            let _ = stdout.flush();
            0
        }
        _ => {
            let _ = write!(stderr, "{}", error.render());
            EXIT_USAGE
        }
    }
}

fn report_failure<Err: Write>(error: &CliError, stderr: &mut Err) -> i32 {
    tracing::debug!(?error, "command failed");
    let _ = writeln!(stderr, "{PROGRAM_NAME}: error: {error}");
    error.exit_code()
}
