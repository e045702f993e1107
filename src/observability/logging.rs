//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Route output to stderr or an append-only log file
//! - Honor `RUST_LOG`, falling back to the configured level

use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Error type for logging setup.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("cannot open log file: {0}")]
    Io(#[from] std::io::Error),
    #[error("logging already initialized: {0}")]
    Init(#[from] TryInitError),
}

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), LoggingError> {
    let filter = env_filter(&config.log_level);

    match &config.log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()?;
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
        }
    }
    Ok(())
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("caching_proxy={level}").into())
}

fn open_log_file(path: &std::path::Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn log_file_is_appended() {
        let path = std::env::temp_dir().join(format!("caching-proxy-log-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unwritable_log_file_is_an_error() {
        let config = ObservabilityConfig {
            log_file: Some("/nonexistent-dir/proxy.log".into()),
            ..ObservabilityConfig::default()
        };
        assert!(matches!(init_logging(&config), Err(LoggingError::Io(_))));
    }
}
