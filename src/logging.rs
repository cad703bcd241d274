//! Logging configuration for odbc-relay.
//!
//! Logs go to stderr so that result output on stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

/// Builds the filter from `RUST_LOG`, falling back to `default_directive`.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initializes logging to stderr.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_stderr_logging(default_directive: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive))
        .with_writer(std::io::stderr)
        .try_init();
}
