// Tracing log adapter - Subscriber installation for structured logging

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::adapters::toml_config::LoggingSettings;
use crate::error::{CircleNoteError, CircleNoteResult};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Installs the global tracing subscriber
pub struct TracingLogAdapter;

impl TracingLogAdapter {
    /// Build the filter: `RUST_LOG` wins, otherwise the configured level
    pub fn filter(level: &str) -> CircleNoteResult<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(level).map_err(|e| CircleNoteError::LoggingError {
                message: format!("invalid log level '{}': {}", level, e),
            }),
        }
    }

    /// Install the subscriber. Returns `false` if one was already installed.
    ///
    /// Logs go to stderr so that stdout stays free for reports.
    pub fn init(settings: &LoggingSettings) -> CircleNoteResult<bool> {
        let filter = Self::filter(&settings.level)?;

        let installed = match settings.format {
            LogFormat::Pretty => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init(),
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(false)
                .try_init(),
        };

        Ok(installed.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_level_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(TracingLogAdapter::filter("circlenote=loud").is_err());
        assert!(TracingLogAdapter::filter("circlenote=debug").is_ok());
    }

    #[test]
    fn test_init_is_idempotent() {
        let settings = LoggingSettings::default();
        let first = TracingLogAdapter::init(&settings).unwrap();
        let second = TracingLogAdapter::init(&settings).unwrap();
        assert!(!second || !first);
    }

    #[test]
    fn test_format_names() {
        let parsed: LoggingSettings = toml::from_str("format = \"json\"").unwrap();
        assert_eq!(parsed.format, LogFormat::Json);
    }
}
