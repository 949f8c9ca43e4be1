#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logging` owns the tracing conventions shared by every dbsync crate: one
//! `dbsync::*` target per subsystem, a macro per target, and the mapping from
//! the command line `-v` count to filter directives.
//!
//! # Design
//!
//! Library crates never install a subscriber. They emit through the macros in
//! this crate (`trace_delta!`, `trace_recv!`, ...), which expand to plain
//! `tracing` calls with a fixed target. The binary builds a [`LogConfig`] and
//! calls [`init_tracing`] once.
//!
//! An explicit filter (`--log-filter` or the [`FILTER_ENV`] variable) replaces
//! the verbosity mapping entirely, so operators can use any `EnvFilter`
//! directive syntax.
//!
//! # Examples
//!
//! ```
//! use logging::{LogConfig, Subsystem};
//!
//! let config = LogConfig::from_verbosity(1).trace_subsystem(Subsystem::Slice);
//! assert_eq!(config.directives(), "info,dbsync::slice=trace");
//! ```

mod config;
mod tracing_bridge;
mod tracing_macros;

pub use config::{FILTER_ENV, LogConfig, Subsystem, UnknownSubsystem};
pub use tracing_bridge::{build_filter, init_tracing};
