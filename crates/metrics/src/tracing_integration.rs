//! Tracing subscriber setup.
//!
//! Hosts embedding the engine can call [`init_tracing`] once at startup to get
//! env-filtered fmt output. With the `tracing` feature the subscriber also
//! carries span fields into metric labels.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "tracing")]
use metrics_tracing_context::MetricsLayer;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global tracing subscriber.
///
/// Returns `false` if a global subscriber was already installed (for example
/// by the host), in which case nothing changes.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    #[cfg(feature = "tracing")]
    let registry = registry.with(MetricsLayer::new());

    registry.try_init().is_ok()
}

/// Install a JSON-formatted subscriber, for hosts shipping logs to a collector.
pub fn init_json_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .is_ok()
}
