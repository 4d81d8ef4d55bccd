//! Opt-in log output for host applications.
//!
//! The engine itself only emits `tracing` events. Hosts that have no
//! subscriber of their own can install this one.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding filter directives, e.g. `carry_store=debug`.
pub const LOG_ENV: &str = "CARRY_LOG";

pub const DEFAULT_FILTER: &str = "carry_store=info";

/// Install a fmt subscriber filtered by `CARRY_LOG`, falling back to
/// `fallback` (or [`DEFAULT_FILTER`]).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(fallback: Option<&str>) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(fallback.unwrap_or(DEFAULT_FILTER)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
