//! Telemetry initialization for the Planforce harness.
//!
//! Installs a `tracing` subscriber with an environment-driven filter.
//! Hint mismatches and plan invariant violations are surfaced through
//! `tracing::warn!`, so a subscriber must be installed before any
//! dispatch loop starts or those signals are lost.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// The filter is taken from `RUST_LOG`, falling back to `default_level`
/// (e.g. `"planforce=info"`). Safe to call more than once; later calls
/// are no-ops.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing("planforce=info");
        init_tracing("planforce=debug");
    }
}
