//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Installing twice is a no-op, so
/// tests and embedders can call this freely.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
