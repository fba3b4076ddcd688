// Ports - Interface definitions (contracts)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::*;
use crate::domain::model::*;

/// Upstream collaborator that owns the source bytes
#[async_trait]
pub trait SourcePort: Send + Sync {
    /// Human-readable name of the source, for logs and reports
    fn describe(&self) -> String;

    /// Size and duration the collaborator can declare before any bytes move
    async fn metadata(&self) -> SourceMetadata;

    /// Write the source bytes into `dest` and return how many were written.
    ///
    /// This is a suspension point; callers race it against cancellation.
    async fn materialize(&self, dest: &Path) -> Result<u64, FailureKind>;
}

/// Everything the transcoder needs for one job
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    pub info: SourceInfo,
    pub crop: CropPlan,
    pub limits: Arc<Limits>,
}

impl TranscodeRequest {
    /// Seconds of source that end up in the output
    pub fn effective_duration(&self) -> f64 {
        match self.info.duration_seconds {
            Some(d) if d.is_finite() && d > 0.0 => d.min(self.limits.clamp_duration_seconds),
            _ => self.limits.clamp_duration_seconds,
        }
    }
}

/// Progress notifications from a running transcode
#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeEvent {
    /// Output container and encoders are open; frames follow
    EncoderOpened,
    /// Output frames written so far
    Progress { frames: u64 },
}

/// What a finished transcode produced
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeSummary {
    pub frames: u64,
    pub duration_seconds: f64,
    /// Whether source audio was carried (false means a silent track)
    pub source_audio: bool,
}

/// Blocking media backend; run it off the async runtime
pub trait TranscodePort: Send + Sync {
    /// Read frame dimensions and stream layout of a materialized source
    fn probe(&self, source: &Path) -> Result<SourceInfo, FailureKind>;

    /// Produce the video note described by `request`.
    ///
    /// Must return `FailureKind::Cancelled` promptly once `cancel` fires.
    fn transcode(
        &self,
        request: &TranscodeRequest,
        cancel: &CancellationToken,
        events: &mut dyn FnMut(TranscodeEvent),
    ) -> Result<TranscodeSummary, FailureKind>;
}
