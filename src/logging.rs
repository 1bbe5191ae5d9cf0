//! Logging setup for the filemutex binary.
//!
//! The library only emits `tracing` events: wait/acquire notifications at
//! `info`, lock file and state diagnostics at `debug`. Installing a subscriber
//! is left to the application; this module is the one the CLI uses.

use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber honoring `RUST_LOG`.
///
/// Without `RUST_LOG` the level is `info`, or `debug` when `verbose` is set.
/// Calling it twice is harmless: the second installation is ignored.
pub fn init(verbose: bool) {
    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
