//! Tracing bootstrap
//!
//! The dispatcher instruments itself with `tracing` spans/events and the
//! `metrics` facade; this module wires a default subscriber for embedders
//! that do not bring their own. Attaching a metrics recorder (Prometheus
//! or otherwise) is left to the embedding process.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber driven by `RUST_LOG` (default level: info).
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
