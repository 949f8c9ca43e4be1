//! crates/logging/src/tracing_bridge.rs
//! Subscriber installation for the `dbsync` binary.
//!
//! Library crates only emit events; the binary calls [`init_tracing`] once
//! with the [`LogConfig`] derived from its flags. Events go to stderr so that
//! stdout stays usable for piped wire streams.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

use super::config::LogConfig;

/// Builds the filter described by `config`.
///
/// # Errors
///
/// Returns the parse error when an explicit filter string is malformed.
pub fn build_filter(config: &LogConfig) -> Result<EnvFilter, ParseError> {
    EnvFilter::try_new(config.directives())
}

/// Installs a formatted stderr subscriber for `config`.
///
/// Returns `Ok(false)` when a global subscriber is already installed; the
/// existing subscriber is kept, so repeated calls are harmless.
///
/// # Errors
///
/// Returns the parse error when an explicit filter string is malformed.
///
/// # Example
///
/// ```rust,ignore
/// use logging::{LogConfig, init_tracing};
///
/// init_tracing(&LogConfig::from_verbosity(2))?;
/// tracing::debug!(target: "dbsync::delta", "scanning target");
/// ```
pub fn init_tracing(config: &LogConfig) -> Result<bool, ParseError> {
    let filter = build_filter(config)?;
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi)
        .with_target(true)
        .try_init()
        .is_ok();
    Ok(installed)
}
