//! Tracing setup for binaries and examples embedding the engine.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initializes logging with debug level for our crate, honoring `RUST_LOG`
/// when set. Panics if a global subscriber is already installed, so call it
/// once at startup (libraries embedding the engine should install their own
/// subscriber instead).
pub fn init() {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("encore=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();
}
