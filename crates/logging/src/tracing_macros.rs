//! crates/logging/src/tracing_macros.rs
//! Convenience macros for dbsync-specific tracing.
//!
//! These macros wrap the standard tracing macros with the target of one
//! subsystem, so filters such as `dbsync::delta=trace` select exactly the
//! events of that subsystem. Callers must depend on `tracing` themselves.

/// Emit a checksum generation trace.
///
/// # Example
/// ```ignore
/// trace_checksum!(blocks = count, "checksummed baseline");
/// ```
#[macro_export]
macro_rules! trace_checksum {
    ($($arg:tt)*) => {
        ::tracing::debug!(target: "dbsync::checksum", $($arg)*);
    };
}

/// Emit an instruction generation trace.
///
/// # Example
/// ```ignore
/// trace_delta!("matched block {}", index);
/// ```
#[macro_export]
macro_rules! trace_delta {
    ($($arg:tt)*) => {
        ::tracing::debug!(target: "dbsync::delta", $($arg)*);
    };
}

/// Emit a receiver trace.
///
/// # Example
/// ```ignore
/// trace_recv!(offset, len, "copying baseline range");
/// ```
#[macro_export]
macro_rules! trace_recv {
    ($($arg:tt)*) => {
        ::tracing::debug!(target: "dbsync::receiver", $($arg)*);
    };
}

/// Emit a storage I/O trace.
///
/// # Example
/// ```ignore
/// trace_io!("opened stream at {}", offset);
/// ```
#[macro_export]
macro_rules! trace_io {
    ($($arg:tt)*) => {
        ::tracing::trace!(target: "dbsync::io", $($arg)*);
    };
}

/// Emit a slice cursor trace.
///
/// # Example
/// ```ignore
/// trace_slice!(skipped = gap, "reused open stream");
/// ```
#[macro_export]
macro_rules! trace_slice {
    ($($arg:tt)*) => {
        ::tracing::trace!(target: "dbsync::slice", $($arg)*);
    };
}

/// Emit a session lifecycle trace.
///
/// # Example
/// ```ignore
/// trace_session!("synchronisation finished in {:?}", elapsed);
/// ```
#[macro_export]
macro_rules! trace_session {
    ($($arg:tt)*) => {
        ::tracing::info!(target: "dbsync::session", $($arg)*);
    };
}
