//! Error handling module for CircleNote infrastructure

use thiserror::Error;

/// Errors outside a single job: configuration, startup, filesystem setup
#[derive(Error, Debug)]
pub enum CircleNoteError {
    /// Configuration file could not be read or parsed
    #[error("Invalid configuration: {message}")]
    ConfigError { message: String },

    /// Configuration parsed but describes an unusable profile
    #[error("Invalid limits: {message}")]
    InvalidLimits { message: String },

    /// FFmpeg initialization error
    #[error("Failed to initialize FFmpeg: {message}")]
    FFmpegInitError { message: String },

    /// Scratch storage could not be prepared
    #[error("Scratch storage error: {message}")]
    ScratchError { message: String },

    /// Logging subscriber could not be installed
    #[error("Failed to initialize logging: {message}")]
    LoggingError { message: String },

    /// A job task panicked or was aborted
    #[error("Job task failed: {message}")]
    JobTaskFailed { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl CircleNoteError {
    /// Whether a supervised service may be restarted after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CircleNoteError::ScratchError { .. }
                | CircleNoteError::JobTaskFailed { .. }
                | CircleNoteError::IoError(_)
        )
    }
}

/// Result type alias for CircleNote infrastructure operations
pub type CircleNoteResult<T> = std::result::Result<T, CircleNoteError>;
