//! crates/cli/src/commands.rs
//! Execution of parsed subcommands.

use std::io::{BufReader, Write};

use engine::SyncSession;
use protocol::{InstructionReader, read_checksum_set, write_checksum_set};
use tracing::{info, warn};

use crate::arguments::{Action, ParsedArgs};
use crate::error::CliError;
use crate::location::{Location, LocationError};
use crate::report;

/// Runs the requested action. Returns the `--stats` text when asked for.
pub(crate) fn execute<Out>(parsed: &ParsedArgs, stdout: &mut Out) -> Result<Option<String>, CliError>
where
    Out: Write,
{
    let session = SyncSession::new(parsed.config)?;
    let summary = match &parsed.action {
        Action::Signature { baseline, output } => signature(&session, baseline, output, stdout)?,
        Action::Delta {
            signature,
            target,
            output,
        } => delta(parsed, signature, target, output, stdout)?,
        Action::Patch {
            baseline,
            delta,
            output,
        } => patch(&session, baseline, delta, output)?,
        Action::Sync {
            baseline,
            target,
            output,
        } => sync(&session, baseline, target, output)?,
    };
    Ok(parsed.stats.then_some(summary))
}

fn signature<Out: Write>(
    session: &SyncSession,
    baseline: &Location,
    output: &Location,
    stdout: &mut Out,
) -> Result<String, CliError> {
    let source = session.source(baseline.range_store("baseline")?);
    let set = session.checksum_baseline(&source)?;
    with_stream_output(output, stdout, |writer| {
        write_checksum_set(writer, &set)?;
        Ok(())
    })?;
    info!(
        baseline = %baseline,
        blocks = set.layout().block_count(),
        "checksums written"
    );
    Ok(report::checksums(&set))
}

/// Writes the instruction stream. The block size and strong hash come from
/// the checksum stream unless given on the command line, in which case a
/// disagreeing stream is a configuration error.
fn delta<Out: Write>(
    parsed: &ParsedArgs,
    signature: &Location,
    target: &Location,
    output: &Location,
    stdout: &mut Out,
) -> Result<String, CliError> {
    if signature.is_stdio() && target.is_stdio() {
        return Err(LocationError::Unsupported {
            role: "target",
            location: format!("{target} when the checksums are read from it"),
        }
        .into());
    }
    let set = read_checksum_set(BufReader::new(signature.open_reader()?))?;
    let config = parsed
        .config
        .with_block_size(parsed.explicit_block_size.unwrap_or(set.layout().block_len()))
        .with_strong_hash(parsed.explicit_hash.unwrap_or(set.algorithm()));
    let session = SyncSession::new(config)?;
    let target_reader = target.open_reader()?;
    let summary = with_stream_output(output, stdout, |writer| {
        let (_, summary) = session.write_delta(target_reader, &set, writer)?;
        Ok(summary)
    })?;
    info!(
        target = %target,
        copies = summary.stats.copies,
        literals = summary.stats.literals,
        "instructions written"
    );
    Ok(report::delta(&summary))
}

fn patch(
    session: &SyncSession,
    baseline: &Location,
    delta: &Location,
    output: &Location,
) -> Result<String, CliError> {
    let source = session.source(baseline.range_store("baseline")?);
    let store = output.writable_store("patch output")?;
    let reader = InstructionReader::new(BufReader::new(delta.open_reader()?))?;
    let summary = session.reconstruct_from(&source, reader, store.create_writer()?)?;
    info!(output = %output, bytes = summary.output_len, "patch applied");
    Ok(report::patch(&summary))
}

fn sync(
    session: &SyncSession,
    baseline: &Location,
    target: &Location,
    output: &Location,
) -> Result<String, CliError> {
    let source = session.source(baseline.range_store("baseline")?);
    let store = output.writable_store("sync output")?;
    let report = session.synchronize(&source, target.open_reader()?, &*store)?;
    info!(output = %output, bytes = report.output_len, "synchronized");
    Ok(report::sync(&report))
}

/// Streams to standard output for `-`, otherwise to an object that is only
/// committed when `body` succeeds.
fn with_stream_output<Out, T>(
    location: &Location,
    stdout: &mut Out,
    body: impl FnOnce(&mut dyn Write) -> Result<T, CliError>,
) -> Result<T, CliError>
where
    Out: Write,
{
    if location.is_stdio() {
        let value = body(&mut *stdout)?;
        stdout.flush()?;
        return Ok(value);
    }
    let store = location.writable_store("stream output")?;
    let mut writer = store.create_writer()?;
    match body(&mut writer) {
        Ok(value) => {
            writer.finish()?;
            Ok(value)
        }
        Err(error) => {
            if let Err(abort) = writer.abort() {
                warn!(output = %location, error = %abort, "failed to discard partial output");
            }
            Err(error)
        }
    }
}
