//! CircleNote Library
//!
//! Turns arbitrary videos into short, square, circle-masked H.264/AAC clips
//! ("video notes"), with typed failures and guaranteed cleanup of every
//! scratch file a job creates.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use app::{JobOutcome, JobReport, PipelineInteractor};
pub use domain::errors::FailureKind;
pub use domain::model::{CropPlan, Job, JobStatus, Limits};
pub use error::{CircleNoteError, CircleNoteResult};

/// Initialize CircleNote library
pub fn init() -> CircleNoteResult<()> {
    ffmpeg_next::init().map_err(|e| CircleNoteError::FFmpegInitError {
        message: e.to_string(),
    })?;
    // Keep libav from interleaving its own output with ours
    ffmpeg_next::util::log::set_level(ffmpeg_next::util::log::Level::Error);

    Ok(())
}
