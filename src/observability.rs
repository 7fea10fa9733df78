//! Logging initialization.
//!
//! The library itself only emits `tracing` events and `metrics` counters;
//! installing a subscriber is the binary's job. `RUST_LOG` overrides the
//! default filter as usual.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: OnceLock<()> = OnceLock::new();

/// Initializes the global tracing subscriber.
///
/// Idempotent; repeated calls are no-ops, so tests and embedding binaries
/// can call it freely.
pub fn init_logging(verbose: bool) {
    INIT.get_or_init(|| {
        let default_filter = if verbose {
            "chronograph=debug"
        } else {
            "chronograph=info"
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
