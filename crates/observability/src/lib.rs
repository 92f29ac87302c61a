//! Process-wide tracing/logging setup.

use tracing_subscriber::EnvFilter;

/// Initialize structured logging for the process.
///
/// JSON output, filter configurable via `RUST_LOG` (defaults to `info`).
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    init_with_default_filter("info");
}

/// Initialize with an explicit fallback filter for when `RUST_LOG` is
/// not set. Daemons use `init`; tests can pick a noisier default.
pub fn init_with_default_filter(fallback: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
