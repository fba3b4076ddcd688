// Domain models - Core types and data structures

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::FailureKind;

/// Bytes in one mebibyte
pub const MIB: u64 = 1024 * 1024;

/// Per-job limits and output profile. Immutable for the lifetime of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Hard reject threshold for declared and on-disk size
    pub max_bytes: u64,
    /// Declared durations above this produce an advisory, never a rejection
    pub max_duration_seconds: f64,
    /// Output is truncated to this many seconds
    pub clamp_duration_seconds: f64,
    /// Output frames are `target_square_size` x `target_square_size`
    pub target_square_size: u32,
    /// Output frame rate, independent of the source
    pub target_fps: u32,
    /// Video encoder name
    pub video_codec: String,
    /// Audio encoder name
    pub audio_codec: String,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_bytes: 50 * MIB,
            max_duration_seconds: 20.0,
            clamp_duration_seconds: 20.0,
            target_square_size: 320,
            target_fps: 30,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
        }
    }
}

impl Limits {
    /// Check that the limits describe an encodable profile
    pub fn validate(&self) -> Result<(), String> {
        if self.max_bytes == 0 {
            return Err("max_bytes must be greater than zero".to_string());
        }
        if !(self.clamp_duration_seconds > 0.0) || !self.clamp_duration_seconds.is_finite() {
            return Err("clamp_duration_seconds must be a positive number".to_string());
        }
        if !(self.max_duration_seconds > 0.0) || !self.max_duration_seconds.is_finite() {
            return Err("max_duration_seconds must be a positive number".to_string());
        }
        if self.target_square_size == 0 {
            return Err("target_square_size must be greater than zero".to_string());
        }
        // 4:2:0 chroma subsampling needs even dimensions
        if self.target_square_size % 2 != 0 {
            return Err(format!(
                "target_square_size must be even, got {}",
                self.target_square_size
            ));
        }
        if self.target_fps == 0 {
            return Err("target_fps must be greater than zero".to_string());
        }
        if self.video_codec.trim().is_empty() || self.audio_codec.trim().is_empty() {
            return Err("codec names cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Metadata reported by the upstream collaborator before any bytes move
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub declared_byte_size: Option<u64>,
    pub declared_duration_seconds: Option<f64>,
}

impl SourceMetadata {
    pub fn new(declared_byte_size: Option<u64>, declared_duration_seconds: Option<f64>) -> Self {
        Self {
            declared_byte_size,
            declared_duration_seconds,
        }
    }
}

/// Properties of the materialized source, read from its container
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Container or stream duration, when the container reports one
    pub duration_seconds: Option<f64>,
    /// Average source frame rate, when known
    pub frame_rate: Option<f64>,
    pub has_audio: bool,
}

/// Centered square crop rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropPlan {
    pub x0: u32,
    pub y0: u32,
    pub side: u32,
}

impl CropPlan {
    /// True when the rectangle lies inside a `width` x `height` frame
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.side > 0
            && self.x0 as u64 + self.side as u64 <= width as u64
            && self.y0 as u64 + self.side as u64 <= height as u64
    }
}

/// One decoded image (packed RGB, 8 bits per channel) plus its timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Presentation timestamp in seconds
    pub pts: f64,
    /// Row-major RGB24, `width * 3` bytes per row, no padding
    pub data: Vec<u8>,
}

impl Frame {
    /// Bytes per pixel
    pub const CHANNELS: usize = 3;

    /// All-black frame
    pub fn black(width: u32, height: u32, pts: f64) -> Self {
        Self {
            width,
            height,
            pts,
            data: vec![0; width as usize * height as usize * Self::CHANNELS],
        }
    }

    /// Wrap an existing RGB24 buffer; `None` if its length does not match
    pub fn from_rgb(width: u32, height: u32, pts: f64, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * Self::CHANNELS {
            return None;
        }
        Some(Self {
            width,
            height,
            pts,
            data,
        })
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    /// Bytes in one row
    pub fn row_len(&self) -> usize {
        self.width as usize * Self::CHANNELS
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.row_len() + x as usize * Self::CHANNELS
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let i = self.offset(x, y);
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// Copy out the square region described by `plan`.
    ///
    /// The plan must fit inside this frame; the Geometry Planner guarantees
    /// that for plans computed from the same dimensions.
    pub fn crop(&self, plan: &CropPlan) -> Frame {
        debug_assert!(plan.fits_within(self.width, self.height));
        let side = plan.side as usize;
        let row_bytes = side * Self::CHANNELS;
        let mut data = Vec::with_capacity(row_bytes * side);
        for row in 0..side {
            let start = self.offset(plan.x0, plan.y0 + row as u32);
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Frame {
            width: plan.side,
            height: plan.side,
            pts: self.pts,
            data,
        }
    }
}

/// Non-fatal observation recorded while validating a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// Declared duration is over the limit; output will be truncated
    DurationClamped { declared_seconds: f64, clamp_seconds: f64 },
    /// Collaborator did not declare a size; only the on-disk check applies
    SizeNotDeclared,
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::DurationClamped {
                declared_seconds,
                clamp_seconds,
            } => write!(
                f,
                "declared duration {:.1}s exceeds limit, output truncated to {:.1}s",
                declared_seconds, clamp_seconds
            ),
            Advisory::SizeNotDeclared => write!(f, "source size was not declared in advance"),
        }
    }
}

/// Process-unique job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl JobId {
    /// Allocate the next identifier
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        JobId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Lifecycle of a job. Forward-only; `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Validating,
    Decoding,
    Transforming,
    Encoding,
    Succeeded,
    Failed(FailureKind),
}

impl JobStatus {
    fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Validating => 1,
            JobStatus::Decoding => 2,
            JobStatus::Transforming => 3,
            JobStatus::Encoding => 4,
            JobStatus::Succeeded | JobStatus::Failed(_) => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed(_))
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_advance_to(&self, next: &JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            JobStatus::Failed(_) => true,
            JobStatus::Pending => false,
            _ => next.rank() == self.rank() + 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Validating => "validating",
            JobStatus::Decoding => "decoding",
            JobStatus::Transforming => "transforming",
            JobStatus::Encoding => "encoding",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Failed(reason) => write!(f, "failed ({})", reason.code()),
            other => f.write_str(other.label()),
        }
    }
}

/// Rejected status change
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal job transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// One transformation request
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub limits: Arc<Limits>,
    pub metadata: SourceMetadata,
    pub advisories: Vec<Advisory>,
    pub created_at: DateTime<Utc>,
    status: JobStatus,
}

impl Job {
    pub fn new(limits: Arc<Limits>, metadata: SourceMetadata) -> Self {
        Self {
            id: JobId::next(),
            limits,
            metadata,
            advisories: Vec::new(),
            created_at: Utc::now(),
            status: JobStatus::Pending,
        }
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    /// Move to `next`, refusing backward moves and moves out of terminal states
    pub fn advance(&mut self, next: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_advance_to(&next) {
            return Err(InvalidTransition {
                from: self.status.clone(),
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Failure reason, if the job ended in `Failed`
    pub fn failure(&self) -> Option<&FailureKind> {
        match &self.status {
            JobStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests;
