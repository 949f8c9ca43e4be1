//! crates/cli/src/arguments.rs
//! Command definition and argument parsing.

use std::ffi::OsString;
use std::num::{NonZeroU32, NonZeroUsize};
use std::str::FromStr;

use checksums::StrongHashAlgorithm;
use clap::{Arg, ArgAction, ArgMatches, Command};
use engine::SyncConfig;
use logging::Subsystem;

use crate::location::Location;

/// Program name used when the argument list is empty.
pub const PROGRAM_NAME: &str = "dbsync";

/// Operation requested on the command line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// Write the checksum set of `baseline` to `output`.
    Signature {
        /// Baseline object.
        baseline: Location,
        /// Checksum stream destination.
        output: Location,
    },
    /// Write the instruction stream turning the signed baseline into `target`.
    Delta {
        /// Checksum stream produced by `signature`.
        signature: Location,
        /// Target object.
        target: Location,
        /// Instruction stream destination.
        output: Location,
    },
    /// Apply an instruction stream to `baseline`.
    Patch {
        /// Baseline object.
        baseline: Location,
        /// Instruction stream produced by `delta`.
        delta: Location,
        /// Reconstructed object.
        output: Location,
    },
    /// Run all phases in one process.
    Sync {
        /// Baseline object.
        baseline: Location,
        /// Target object.
        target: Location,
        /// Reconstructed object.
        output: Location,
    },
}

/// Parsed command line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedArgs {
    /// Number of `-v` flags.
    pub verbosity: u8,
    /// Explicit tracing filter.
    pub log_filter: Option<String>,
    /// Subsystems traced at `trace` level.
    pub traced: Vec<Subsystem>,
    /// Print a summary to standard error.
    pub stats: bool,
    /// Session settings.
    pub config: SyncConfig,
    /// Block size given with `-b`, if any. `delta` otherwise adopts the
    /// block size recorded in the checksum stream.
    pub explicit_block_size: Option<NonZeroU32>,
    /// Strong hash given with `--hash`, if any. `delta` otherwise adopts the
    /// algorithm recorded in the checksum stream.
    pub explicit_hash: Option<StrongHashAlgorithm>,
    /// Requested operation.
    pub action: Action,
}

fn parse_block_size(value: &str) -> Result<NonZeroU32, String> {
    u32::from_str(value)
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or_else(|| format!("invalid --block-size value '{value}': expected a positive integer"))
}

fn parse_max_literal(value: &str) -> Result<NonZeroUsize, String> {
    usize::from_str(value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| format!("invalid --max-literal value '{value}': expected a positive integer"))
}

fn parse_hash(value: &str) -> Result<StrongHashAlgorithm, String> {
    StrongHashAlgorithm::from_str(value).map_err(|error| format!("invalid --hash value: {error}"))
}

fn parse_location(value: &str) -> Result<Location, String> {
    Location::parse(value).map_err(|error| error.to_string())
}

fn parse_subsystem(value: &str) -> Result<Subsystem, String> {
    Subsystem::from_str(value).map_err(|error| error.to_string())
}

fn operand(name: &'static str, value_name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .value_name(value_name)
        .help(help)
        .required(true)
        .value_parser(parse_location)
}

fn output_arg(help: &'static str) -> Arg {
    Arg::new("output")
        .long("output")
        .short('o')
        .value_name("OUTPUT")
        .help(help)
        .required(true)
        .value_parser(parse_location)
}

/// Builds the `clap` command used for parsing.
pub fn clap_command() -> Command {
    Command::new(PROGRAM_NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .about("Block-level delta synchronisation of large local and remote objects")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Increase log verbosity (repeatable).")
                .action(ArgAction::Count)
                .global(true),
        )
        .arg(
            Arg::new("log-filter")
                .long("log-filter")
                .value_name("DIRECTIVES")
                .help("Tracing filter directives; overrides -v and DBSYNC_LOG.")
                .action(ArgAction::Set)
                .global(true),
        )
        .arg(
            Arg::new("trace")
                .long("trace")
                .value_name("SUBSYSTEM")
                .help("Trace one subsystem: checksum, delta, receiver, io, slice or session.")
                .action(ArgAction::Append)
                .value_parser(parse_subsystem)
                .global(true),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .help("Print transfer statistics to standard error.")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("block-size")
                .long("block-size")
                .short('b')
                .value_name("BYTES")
                .help("Baseline block size in bytes [default: 4096].")
                .action(ArgAction::Set)
                .value_parser(parse_block_size)
                .global(true),
        )
        .arg(
            Arg::new("hash")
                .long("hash")
                .value_name("ALGORITHM")
                .help("Strong hash: sha256, sha1, md5 or xxh3-128 [default: sha256].")
                .action(ArgAction::Set)
                .value_parser(parse_hash)
                .global(true),
        )
        .arg(
            Arg::new("max-literal")
                .long("max-literal")
                .value_name("BYTES")
                .help("Largest literal emitted as one instruction [default: 4096].")
                .action(ArgAction::Set)
                .value_parser(parse_max_literal)
                .global(true),
        )
        .arg(
            Arg::new("max-forward-skip")
                .long("max-forward-skip")
                .value_name("BYTES")
                .help("Largest gap read and discarded on an open baseline stream before reopening.")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(u64))
                .global(true),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .help("Hash baseline blocks on all cores.")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("no-verify")
                .long("no-verify")
                .help("Skip the end-to-end digest check of the output.")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("signature")
                .about("Write the checksum set of a baseline.")
                .arg(operand("baseline", "BASELINE", "Baseline object."))
                .arg(output_arg("Checksum stream destination, or - for standard output.")),
        )
        .subcommand(
            Command::new("delta")
                .about("Write the instructions that turn a signed baseline into a target.")
                .arg(operand("signature", "SIGNATURE", "Checksum stream, or - for standard input."))
                .arg(operand("target", "TARGET", "Target object, or - for standard input."))
                .arg(output_arg("Instruction stream destination, or - for standard output.")),
        )
        .subcommand(
            Command::new("patch")
                .about("Apply an instruction stream to a baseline.")
                .arg(operand("baseline", "BASELINE", "Baseline object."))
                .arg(operand("delta", "DELTA", "Instruction stream, or - for standard input."))
                .arg(output_arg("Reconstructed object; may be the baseline itself.")),
        )
        .subcommand(
            Command::new("sync")
                .about("Reconstruct a target from a baseline in one pass.")
                .arg(operand("baseline", "BASELINE", "Baseline object."))
                .arg(operand("target", "TARGET", "Target object, or - for standard input."))
                .arg(output_arg("Reconstructed object; may be the baseline itself.")),
        )
}

/// Parses command-line arguments into a [`ParsedArgs`] structure.
pub fn parse_args<I, S>(arguments: I) -> Result<ParsedArgs, clap::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut args: Vec<OsString> = arguments.into_iter().map(Into::into).collect();
    if args.is_empty() {
        args.push(OsString::from(PROGRAM_NAME));
    }

    let mut matches = clap_command().try_get_matches_from(args)?;
    let Some((name, mut sub)) = matches.remove_subcommand() else {
        return Err(clap_command().error(
            clap::error::ErrorKind::MissingSubcommand,
            "a subcommand is required",
        ));
    };

    // Global flags land on the subcommand's matches.
    let verbosity = sub.get_count("verbose");
    let log_filter = sub.remove_one::<String>("log-filter");
    let traced = sub
        .remove_many::<Subsystem>("trace")
        .map(|values| values.collect())
        .unwrap_or_default();
    let stats = sub.get_flag("stats");
    let explicit_block_size = sub.remove_one::<NonZeroU32>("block-size");
    let explicit_hash = sub.remove_one::<StrongHashAlgorithm>("hash");
    let config = sync_config(&mut sub, explicit_block_size, explicit_hash);

    let action = match name.as_str() {
        "signature" => Action::Signature {
            baseline: take_location(&mut sub, "baseline")?,
            output: take_location(&mut sub, "output")?,
        },
        "delta" => Action::Delta {
            signature: take_location(&mut sub, "signature")?,
            target: take_location(&mut sub, "target")?,
            output: take_location(&mut sub, "output")?,
        },
        "patch" => Action::Patch {
            baseline: take_location(&mut sub, "baseline")?,
            delta: take_location(&mut sub, "delta")?,
            output: take_location(&mut sub, "output")?,
        },
        "sync" => Action::Sync {
            baseline: take_location(&mut sub, "baseline")?,
            target: take_location(&mut sub, "target")?,
            output: take_location(&mut sub, "output")?,
        },
        other => {
            return Err(clap_command().error(
                clap::error::ErrorKind::InvalidSubcommand,
                format!("unrecognised subcommand '{other}'"),
            ));
        }
    };

    Ok(ParsedArgs {
        verbosity,
        log_filter,
        traced,
        stats,
        config,
        explicit_block_size,
        explicit_hash,
        action,
    })
}

fn sync_config(
    matches: &mut ArgMatches,
    block_size: Option<NonZeroU32>,
    algorithm: Option<StrongHashAlgorithm>,
) -> SyncConfig {
    let mut config = SyncConfig::default()
        .with_parallel_checksums(matches.get_flag("parallel"))
        .with_verify(!matches.get_flag("no-verify"));
    if let Some(block_size) = block_size {
        config = config.with_block_size(block_size);
    }
    if let Some(algorithm) = algorithm {
        config = config.with_strong_hash(algorithm);
    }
    if let Some(len) = matches.remove_one::<NonZeroUsize>("max-literal") {
        config = config.with_max_literal_len(len);
    }
    if let Some(bytes) = matches.remove_one::<u64>("max-forward-skip") {
        config = config.with_max_forward_skip(bytes);
    }
    config
}

fn take_location(matches: &mut ArgMatches, name: &str) -> Result<Location, clap::Error> {
    matches.remove_one::<Location>(name).ok_or_else(|| {
        clap_command().error(
            clap::error::ErrorKind::MissingRequiredArgument,
            format!("missing <{}>", name.to_ascii_uppercase()),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn local(path: &str) -> Location {
        Location::Local(PathBuf::from(path))
    }

    #[test]
    fn command_definition_is_consistent() {
        clap_command().debug_assert();
    }

    #[test]
    fn parses_sync_with_defaults() {
        let parsed = parse_args(["dbsync", "sync", "old.db", "new.db", "-o", "out.db"]).unwrap();
        assert_eq!(parsed.config, SyncConfig::default());
        assert_eq!(parsed.explicit_block_size, None);
        assert_eq!(parsed.explicit_hash, None);
        assert_eq!(parsed.verbosity, 0);
        assert!(!parsed.stats);
        assert_eq!(
            parsed.action,
            Action::Sync {
                baseline: local("old.db"),
                target: local("new.db"),
                output: local("out.db"),
            }
        );
    }

    #[test]
    fn global_flags_may_follow_the_subcommand() {
        let parsed = parse_args([
            "dbsync",
            "-v",
            "delta",
            "sig",
            "-",
            "--output=-",
            "--block-size=1024",
            "--hash",
            "xxh3-128",
            "--max-literal",
            "64",
            "--no-verify",
            "--parallel",
            "--trace",
            "slice",
        ])
        .unwrap();
        assert_eq!(parsed.verbosity, 1);
        assert_eq!(parsed.traced, vec![Subsystem::Slice]);
        assert_eq!(parsed.config.block_size.get(), 1024);
        assert_eq!(parsed.config.strong_hash, StrongHashAlgorithm::Xxh3_128);
        assert_eq!(parsed.explicit_block_size, NonZeroU32::new(1024));
        assert_eq!(parsed.explicit_hash, Some(StrongHashAlgorithm::Xxh3_128));
        assert_eq!(parsed.config.max_literal_len.get(), 64);
        assert!(!parsed.config.verify);
        assert!(parsed.config.parallel_checksums);
        assert_eq!(
            parsed.action,
            Action::Delta {
                signature: local("sig"),
                target: Location::Stdio,
                output: Location::Stdio,
            }
        );
    }

    #[test]
    fn rejects_non_numeric_block_size() {
        let error = parse_args(["dbsync", "signature", "b", "-o", "s", "--block-size=abc"]).unwrap_err();
        assert_eq!(error.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(error.to_string().contains("invalid --block-size value 'abc'"));
    }

    #[test]
    fn rejects_zero_block_size() {
        let error = parse_args(["dbsync", "signature", "b", "-o", "s", "-b", "0"]).unwrap_err();
        assert_eq!(error.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn rejects_unknown_hash() {
        let error = parse_args(["dbsync", "signature", "b", "-o", "s", "--hash", "crc32"]).unwrap_err();
        assert_eq!(error.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn output_is_required() {
        let error = parse_args(["dbsync", "patch", "base", "delta"]).unwrap_err();
        assert_eq!(error.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn subcommand_is_required() {
        let error = parse_args(["dbsync", "--stats"]).unwrap_err();
        assert!(matches!(
            error.kind(),
            clap::error::ErrorKind::MissingSubcommand
                | clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        ));
    }
}
