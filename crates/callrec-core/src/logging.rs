//! Structured logging for callrec
//!
//! One-shot `tracing` initialization. The level comes from the caller but
//! can always be overridden through `RUST_LOG`.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static LOGGING_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// Initialize the global subscriber once. Later calls are no-ops.
pub fn init_logging(level: &str) {
    LOGGING_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok()
    });
}
