//! Logging setup for binaries embedding the task service.
//!
//! The library itself only emits `tracing` events. Call [`init_logging`]
//! once at startup to print them.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs a formatted subscriber filtered by `RUST_LOG`.
///
/// `default_directive` applies when `RUST_LOG` is unset or invalid, e.g.
/// `"info"` or `"orion_tasks=debug"`. Returns `false` if a global subscriber
/// was already installed, in which case nothing changes.
pub fn init_logging(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
