//! Structured logging using **tracing**.
//!
//! - Non-blocking: tracing macros push events to the subscriber, not directly to I/O
//! - Works from Rayon workers; each event carries the thread ID
//!
//! The JSON subscriber writes to stderr so stdout stays reserved for the
//! report.

use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn";

/// Initializes the global tracing collector (subscriber).
///
/// Call once at startup. A second call is a no-op instead of a panic.
///
/// # Environment Variables
/// - `RUST_LOG`: Controls log filtering (e.g., `RUST_LOG=deadcss_core=debug`)
pub fn init_structured_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_level(true)
        .with_target(true)
        .with_thread_ids(true)
        .with_current_span(true)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Logs a skipped group or stylesheet with its reason.
pub fn log_skipped(path: &std::path::Path, reason: &str) {
    warn!(path = %path.display(), reason = %reason, "skipped");
}

/// Logs an error event.
pub fn log_error(message: &str) {
    error!(detail = %message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init_structured_logging();
        init_structured_logging();
        log_skipped(std::path::Path::new("a.css"), "test");
        log_error("test");
    }
}
