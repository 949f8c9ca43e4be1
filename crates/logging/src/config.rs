//! crates/logging/src/config.rs
//! Verbosity configuration mapped onto tracing filter directives.

use std::fmt;
use std::str::FromStr;

/// Environment variable holding an explicit filter that overrides `-v`.
pub const FILTER_ENV: &str = "DBSYNC_LOG";

/// Subsystems that emit events under their own `dbsync::*` target.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Subsystem {
    /// Baseline checksum generation.
    Checksum,
    /// Instruction generation (block matching).
    Delta,
    /// Instruction replay.
    Receiver,
    /// Storage backends and sinks.
    Io,
    /// Slice cursor bookkeeping.
    Slice,
    /// Session lifecycle.
    Session,
}

impl Subsystem {
    /// All subsystems, in pipeline order.
    pub const ALL: [Self; 6] = [
        Self::Checksum,
        Self::Delta,
        Self::Receiver,
        Self::Io,
        Self::Slice,
        Self::Session,
    ];

    /// The tracing target used by this subsystem's macros.
    #[must_use]
    pub const fn target(self) -> &'static str {
        match self {
            Self::Checksum => "dbsync::checksum",
            Self::Delta => "dbsync::delta",
            Self::Receiver => "dbsync::receiver",
            Self::Io => "dbsync::io",
            Self::Slice => "dbsync::slice",
            Self::Session => "dbsync::session",
        }
    }

    /// Short name accepted on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Checksum => "checksum",
            Self::Delta => "delta",
            Self::Receiver => "receiver",
            Self::Io => "io",
            Self::Slice => "slice",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned for an unknown subsystem name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownSubsystem(String);

impl fmt::Display for UnknownSubsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log subsystem '{}'", self.0)
    }
}

impl std::error::Error for UnknownSubsystem {}

impl FromStr for Subsystem {
    type Err = UnknownSubsystem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checksum" => Ok(Self::Checksum),
            "delta" => Ok(Self::Delta),
            "receiver" | "recv" => Ok(Self::Receiver),
            "io" => Ok(Self::Io),
            "slice" => Ok(Self::Slice),
            "session" => Ok(Self::Session),
            other => Err(UnknownSubsystem(other.to_owned())),
        }
    }
}

/// Logging configuration assembled by the command line front end.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogConfig {
    /// Number of `-v` flags.
    pub verbosity: u8,
    /// Explicit filter directives; replaces the verbosity mapping when set.
    pub filter: Option<String>,
    /// Subsystems traced at `trace` level regardless of verbosity.
    pub traced: Vec<Subsystem>,
    /// Emit ANSI colour codes.
    pub ansi: bool,
}

impl LogConfig {
    /// Creates a configuration from a `-v` count.
    ///
    /// | count | directives       |
    /// |-------|------------------|
    /// | 0     | `warn`           |
    /// | 1     | `info`           |
    /// | 2     | `dbsync=debug`   |
    /// | 3+    | `dbsync=trace`   |
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        Self {
            verbosity,
            ..Self::default()
        }
    }

    /// Sets an explicit filter. `None` keeps the verbosity mapping.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter.filter(|value| !value.trim().is_empty());
        self
    }

    /// Fills the filter from [`FILTER_ENV`] when none was given explicitly.
    #[must_use]
    pub fn with_env_fallback(self) -> Self {
        if self.filter.is_some() {
            return self;
        }
        let from_env = std::env::var(FILTER_ENV).ok();
        self.with_filter(from_env)
    }

    /// Traces `subsystem` at `trace` level.
    #[must_use]
    pub fn trace_subsystem(mut self, subsystem: Subsystem) -> Self {
        if !self.traced.contains(&subsystem) {
            self.traced.push(subsystem);
        }
        self
    }

    /// Enables or disables ANSI colour codes.
    #[must_use]
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Renders the `EnvFilter` directive string.
    #[must_use]
    pub fn directives(&self) -> String {
        let mut directives = match &self.filter {
            Some(filter) => filter.clone(),
            None => match self.verbosity {
                0 => "warn".to_owned(),
                1 => "info".to_owned(),
                2 => "warn,dbsync=debug".to_owned(),
                _ => "warn,dbsync=trace".to_owned(),
            },
        };
        for subsystem in &self.traced {
            directives.push(',');
            directives.push_str(subsystem.target());
            directives.push_str("=trace");
        }
        directives
    }
}
