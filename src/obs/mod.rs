//! Observability: tracing subscriber setup shared by the server and CLI binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "loan_compass_api=debug,tower_http=debug";

/// Installs the global subscriber: `RUST_LOG` filter (or [`DEFAULT_FILTER`]) plus
/// the fmt layer.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
