//! Logging setup
//!
//! The pipeline narrates a run through `tracing` events: the reducer emits
//! a throttled chunk count while halving, the analyzer logs each section
//! probe verdict, and the verifier logs every run it performs. This module
//! installs a subscriber for binaries and test harnesses that want to see
//! that narration; library consumers with their own subscriber can skip it.
//!
//! ```rust
//! sigsift::logging::init();
//! ```
//!
//! Levels are selected at runtime through `RUST_LOG`:
//! ```bash
//! RUST_LOG=sigsift=info                  # run-level progress
//! RUST_LOG=sigsift::reducer=debug        # every abandoned range
//! RUST_LOG=sigsift::scanner=trace        # individual oracle verdicts
//! ```

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// Without `RUST_LOG`, debug builds log this crate at debug level and
/// release builds at info. Calling it again is harmless; the first
/// subscriber stays installed.
pub fn init() {
    let fallback = if cfg!(debug_assertions) {
        "sigsift=debug"
    } else {
        "sigsift=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}
