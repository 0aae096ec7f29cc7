//! Diagnostic logging.
//!
//! Structured `tracing` output on stderr, filtered by `RUST_LOG`
//! (default `info`). Stdout is left for command output.

use tracing_subscriber::EnvFilter;

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
