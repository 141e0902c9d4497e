//! # Structured Logging Module
//!
//! Environment-aware structured logging for queues and worker trackers.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the environment
//! (`TASKER_ENV`). Output is human readable unless `TASKER_LOG_FORMAT=json`.

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let json = wants_json_output();
        let filter = || {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)))
        };

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(filter())
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter())
                .boxed()
        };

        // Another subscriber (an embedding application, a test harness) may already own
        // the global slot.
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json,
            started_at = %Utc::now().to_rfc3339(),
            "Structured logging initialized"
        );
    });
}

/// Current environment from `TASKER_ENV`
pub fn get_environment() -> String {
    std::env::var("TASKER_ENV")
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase()
}

/// Default log level for an environment
pub fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        "test" => "warn",
        _ => "debug",
    }
}

fn wants_json_output() -> bool {
    std::env::var("TASKER_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels_by_environment() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("test"), "warn");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("staging"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
    }
}
