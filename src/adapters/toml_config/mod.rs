// TOML config adapter - Service settings from circlenote.toml

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::adapters::tracing_log::LogFormat;
use crate::domain::model::Limits;
use crate::error::{CircleNoteError, CircleNoteResult};

/// Looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "circlenote.toml";

/// Restart policy for long-running services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    pub max_restarts: u32,
    pub backoff_secs: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            backoff_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when RUST_LOG is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Effective service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Jobs allowed to run at once
    pub workers: usize,
    /// Where jobs keep scratch files; system temp dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
    pub limits: Limits,
    pub supervisor: SupervisorSettings,
    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            scratch_dir: None,
            limits: Limits::default(),
            supervisor: SupervisorSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> CircleNoteResult<()> {
        self.limits
            .validate()
            .map_err(|message| CircleNoteError::InvalidLimits { message })?;
        if self.workers == 0 {
            return Err(CircleNoteError::ConfigError {
                message: "workers must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Scratch directory to use, falling back to the system temp dir
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("circlenote"))
    }
}

/// Reads and writes `Settings` as TOML
pub struct TomlConfigAdapter;

impl TomlConfigAdapter {
    /// Load settings from `explicit`, else from `circlenote.toml` if present, else defaults.
    ///
    /// Returns the settings together with the file they came from.
    pub fn load(explicit: Option<&Path>) -> CircleNoteResult<(Settings, Option<PathBuf>)> {
        let candidate = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(CircleNoteError::ConfigError {
                        message: format!("config file does not exist: {}", path.display()),
                    });
                }
                Some(path.to_path_buf())
            }
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            }
        };

        match candidate {
            Some(path) => {
                info!(path = %path.display(), "loading configuration");
                let content = std::fs::read_to_string(&path)?;
                let settings = Self::parse(&content)?;
                Ok((settings, Some(path)))
            }
            None => {
                debug!("no configuration file, using defaults");
                Ok((Settings::default(), None))
            }
        }
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn parse(content: &str) -> CircleNoteResult<Settings> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings)
    }

    pub fn render(settings: &Settings) -> CircleNoteResult<String> {
        toml::to_string_pretty(settings).map_err(|e| CircleNoteError::ConfigError {
            message: format!("failed to serialize settings: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MIB;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = TomlConfigAdapter::parse(
            r#"
workers = 2

[limits]
max_bytes = 10485760
target_square_size = 480

[logging]
format = "json"
"#,
        )
        .unwrap();

        assert_eq!(settings.workers, 2);
        assert_eq!(settings.limits.max_bytes, 10 * MIB);
        assert_eq!(settings.limits.target_square_size, 480);
        assert_eq!(settings.limits.target_fps, 30);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.supervisor, SupervisorSettings::default());
    }

    #[test]
    fn test_render_round_trips() {
        let mut settings = Settings::default();
        settings.scratch_dir = Some(PathBuf::from("/var/tmp/notes"));
        let rendered = TomlConfigAdapter::render(&settings).unwrap();
        assert_eq!(TomlConfigAdapter::parse(&rendered).unwrap(), settings);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = TomlConfigAdapter::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(CircleNoteError::ConfigError { .. })));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("service.toml");
        std::fs::write(&path, "[supervisor]\nmax_restarts = 7\n").unwrap();

        let (settings, source) = TomlConfigAdapter::load(Some(&path)).unwrap();
        assert_eq!(settings.supervisor.max_restarts, 7);
        assert_eq!(settings.supervisor.backoff_secs, 5);
        assert_eq!(source, Some(path));
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let result = TomlConfigAdapter::parse("workers = [");
        assert!(matches!(result, Err(CircleNoteError::TomlError(_))));
    }

    #[test]
    fn test_validate_rejects_odd_size_and_zero_workers() {
        let mut settings = Settings::default();
        settings.limits.target_square_size = 321;
        assert!(matches!(
            settings.validate(),
            Err(CircleNoteError::InvalidLimits { .. })
        ));

        let mut settings = Settings::default();
        settings.workers = 0;
        assert!(settings.validate().is_err());
    }
}
