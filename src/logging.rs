//! # Structured Logging Module
//!
//! Environment-aware structured logging for debugging async orchestration
//! flows. Initialization is idempotent so embedding processes and test
//! harnesses can call it freely.

use std::sync::OnceLock;

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-driven filtering.
///
/// The filter is taken from `WORKFLOW_LOG`, falling back to `RUST_LOG`, then
/// to the environment default. Safe to call repeatedly; only the first call
/// installs a subscriber, and an already-installed global subscriber (e.g.
/// from a host application) is left in place.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = std::env::var("WORKFLOW_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| default_log_level(&get_environment()));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(EnvFilter::new(filter)),
        );

        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized - continuing");
        }
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("WORKFLOW_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn default_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
