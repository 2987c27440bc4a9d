//! # Structured Logging Module
//!
//! Environment-aware structured logging for debugging queue consumers and
//! the purge scheduler across replicas.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
///
/// Log level comes from `RUST_LOG` when set, otherwise from the deployment
/// environment (`CAMPUS_ENV`): debug in development, info elsewhere.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment =
            std::env::var("CAMPUS_ENV").unwrap_or_else(|_| "development".to_string());
        let default_level = if environment == "development" {
            "campus_core=debug,info"
        } else {
            "info"
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(filter),
        );

        // A global subscriber may already be installed by an embedding
        // process; that is not an error.
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            "Structured logging initialized"
        );
    });
}
