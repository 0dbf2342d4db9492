//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from config and `RUST_LOG`
//! - Optionally mirror output into a daily-rolling log file
//!
//! # Design Decisions
//! - `RUST_LOG` wins over `observability.log_level` when set
//! - Denials and blacklisting are emitted on [`SECURITY_TARGET`]

use std::path::Path;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::ObservabilityConfig;

/// Target for events about blocked or blacklisted traffic.
pub const SECURITY_TARGET: &str = "flood_guard::security";

const LOG_FILE_PREFIX: &str = "flood-guard.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("cannot create log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("subscriber already installed: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when file logging is enabled; it must be
/// held for the life of the process or buffered lines are lost.
pub fn init_logging(config: &ObservabilityConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)?,
    };

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let dir = Path::new(dir);
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = ObservabilityConfig {
            log_level: "flood_guard=loud".to_string(),
            ..Default::default()
        };
        assert!(matches!(init_logging(&config), Err(LoggingError::Filter(_))));
    }
}
