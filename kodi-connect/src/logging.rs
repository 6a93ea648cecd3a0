//! Logging setup for the kodi-connect server.
//!
//! Every crate in the workspace logs through `tracing`; this module installs the
//! subscriber that decides where those events go.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Environment variable that overrides the log filter.
pub const LOG_LEVEL_ENV: &str = "KODI_CONNECT_LOG_LEVEL";

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LoggingMode {
    /// No subscriber; events are dropped
    Silent,
    /// Compact single-line output on stderr
    #[default]
    Development,
    /// Verbose output with thread IDs and source locations
    Debug,
    /// One JSON object per event, for log shippers
    Json,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },
}

/// Install the global subscriber.
///
/// The filter comes from `level` when given (the CLI flag, or
/// `KODI_CONNECT_LOG_LEVEL`), then `RUST_LOG`, then the mode's default.
pub fn init_logging(mode: LoggingMode, level: Option<&str>) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter(level, "info")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter(level, "debug")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Json => {
            let filter = create_env_filter(level, "info")?;

            Registry::default()
                .with(fmt::layer().json().with_current_span(true).flatten_event(true))
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

fn create_env_filter(level: Option<&str>, default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = match level {
        Some(level) => level.to_string(),
        None => std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string()),
    };

    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives,
        reason: e.to_string(),
    })
}

/// Check if a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_mode() {
        assert!(init_logging(LoggingMode::Silent, None).is_ok());
    }

    #[test]
    fn test_explicit_level_wins() {
        let filter = create_env_filter(Some("tunnel=trace,warn"), "info").unwrap();
        assert!(filter.to_string().contains("tunnel=trace"));
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        assert!(matches!(
            create_env_filter(Some("tunnel=loud"), "info"),
            Err(LoggingError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_default_mode() {
        assert_eq!(LoggingMode::default(), LoggingMode::Development);
    }
}
