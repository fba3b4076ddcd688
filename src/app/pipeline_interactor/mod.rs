// Pipeline interactor - Runs one video-note job from admission to artifact

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::*;
use crate::ports::*;
use crate::utils::scratch::{OutputArtifact, ScratchRole, ScratchScope};

/// Serializable summary of a finished job
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub source: String,
    /// Terminal status label, `succeeded` or `failed`
    pub status: String,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub failure_detail: Option<String>,
    pub advisories: Vec<Advisory>,
    pub source_width: Option<u32>,
    pub source_height: Option<u32>,
    pub crop: Option<CropPlan>,
    pub output_bytes: Option<u64>,
    pub output_frames: Option<u64>,
    pub output_duration_seconds: Option<f64>,
    pub source_audio: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.failure_code.is_none()
    }
}

/// Everything a caller gets back from a job
#[derive(Debug)]
pub struct JobOutcome {
    pub job: Job,
    pub report: JobReport,
    /// Present only when the job succeeded
    pub artifact: Option<OutputArtifact>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.job.status(), JobStatus::Succeeded)
    }

    pub fn failure(&self) -> Option<&FailureKind> {
        self.job.failure()
    }
}

/// Facts gathered while the job runs, for the report
#[derive(Default)]
struct RunFacts {
    info: Option<SourceInfo>,
    crop: Option<CropPlan>,
    summary: Option<TranscodeSummary>,
}

/// Status change notification for observers such as the CLI
pub type StatusUpdate = (JobId, JobStatus);

/// Orchestrates validation, scratch handling, probing and transcoding
pub struct PipelineInteractor {
    transcode_port: Arc<dyn TranscodePort>,
    limits: Arc<Limits>,
    scratch_root: PathBuf,
    status_tx: Option<mpsc::UnboundedSender<StatusUpdate>>,
}

impl PipelineInteractor {
    pub fn new(
        transcode_port: Arc<dyn TranscodePort>,
        limits: Arc<Limits>,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transcode_port,
            limits,
            scratch_root: scratch_root.into(),
            status_tx: None,
        }
    }

    /// Send every status change of every job to `tx`
    pub fn with_status_listener(mut self, tx: mpsc::UnboundedSender<StatusUpdate>) -> Self {
        self.status_tx = Some(tx);
        self
    }

    pub fn limits(&self) -> &Arc<Limits> {
        &self.limits
    }

    /// Run one job to a terminal state.
    ///
    /// Never returns an error: every failure ends as `Failed(kind)` in the
    /// outcome, and all scratch paths except a successful output are gone
    /// by the time this returns.
    pub async fn run(&self, source: &dyn SourcePort, cancel: CancellationToken) -> JobOutcome {
        let mut job = Job::new(Arc::clone(&self.limits), SourceMetadata::default());
        let started_at = Utc::now();
        let mut facts = RunFacts::default();
        info!(job_id = %job.id, source = %source.describe(), "job accepted");

        let artifact = match self.drive(&mut job, source, &cancel, &mut facts).await {
            Ok(artifact) => {
                self.transition(&mut job, JobStatus::Succeeded);
                info!(job_id = %job.id, bytes = artifact.bytes(), "job succeeded");
                Some(artifact)
            }
            Err(kind) => {
                if kind.is_rejection() {
                    warn!(job_id = %job.id, code = kind.code(), "job rejected: {}", kind);
                } else if kind == FailureKind::Cancelled {
                    info!(job_id = %job.id, "job cancelled");
                } else {
                    error!(job_id = %job.id, code = kind.code(), "job failed: {}", kind);
                }
                self.transition(&mut job, JobStatus::Failed(kind));
                None
            }
        };

        let report = Self::report(&job, source, &facts, artifact.as_ref(), started_at);
        JobOutcome {
            job,
            report,
            artifact,
        }
    }

    async fn drive(
        &self,
        job: &mut Job,
        source: &dyn SourcePort,
        cancel: &CancellationToken,
        facts: &mut RunFacts,
    ) -> Result<OutputArtifact, FailureKind> {
        self.transition(job, JobStatus::Validating);
        job.metadata = source.metadata().await;
        job.advisories = InputValidator::preflight(&job.metadata, &self.limits)?;
        for advisory in &job.advisories {
            warn!(job_id = %job.id, advisory = %advisory, "pre-flight advisory");
        }
        ensure_active(cancel)?;

        let mut scope = ScratchScope::new(&self.scratch_root, job.id);
        let source_path = scope.acquire(ScratchRole::Source).map_err(|e| {
            FailureKind::DecodeFailed(format!("scratch storage unavailable: {}", e))
        })?;

        let reported = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FailureKind::Cancelled),
            result = source.materialize(&source_path) => result?,
        };
        let on_disk = tokio::fs::metadata(&source_path)
            .await
            .map_err(|e| FailureKind::DecodeFailed(format!("materialized source missing: {}", e)))?
            .len();
        if on_disk != reported {
            debug!(job_id = %job.id, reported, on_disk, "source size differs from reported copy size");
        }
        InputValidator::verify_materialized(on_disk, &self.limits)?;
        ensure_active(cancel)?;

        self.transition(job, JobStatus::Decoding);
        let info = {
            let port = Arc::clone(&self.transcode_port);
            let path = source_path.clone();
            tokio::task::spawn_blocking(move || port.probe(&path))
                .await
                .map_err(|e| FailureKind::DecodeFailed(format!("probe task failed: {}", e)))??
        };
        facts.info = Some(info.clone());
        let crop = GeometryPlanner::plan(info.width, info.height)?;
        facts.crop = Some(crop);
        debug!(
            job_id = %job.id,
            width = info.width,
            height = info.height,
            x0 = crop.x0,
            y0 = crop.y0,
            side = crop.side,
            "crop planned"
        );
        ensure_active(cancel)?;

        self.transition(job, JobStatus::Transforming);
        let output_path = scope.acquire(ScratchRole::Output).map_err(|e| {
            FailureKind::EncodeFailed(format!("scratch storage unavailable: {}", e))
        })?;

        let request = TranscodeRequest {
            source: source_path,
            output: output_path,
            info,
            crop,
            limits: Arc::clone(&self.limits),
        };
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let port = Arc::clone(&self.transcode_port);
        let token = cancel.clone();
        let task = tokio::task::spawn_blocking(move || {
            let mut emit = |event: TranscodeEvent| {
                let _ = event_tx.send(event);
            };
            port.transcode(&request, &token, &mut emit)
        });

        // Sender is dropped when the blocking task returns
        while let Some(event) = event_rx.recv().await {
            match event {
                TranscodeEvent::EncoderOpened => self.transition(job, JobStatus::Encoding),
                TranscodeEvent::Progress { frames } => {
                    debug!(job_id = %job.id, frames, "encoding progress");
                }
            }
        }
        let summary = task
            .await
            .map_err(|e| FailureKind::EncodeFailed(format!("encode task failed: {}", e)))??;
        facts.summary = Some(summary);
        if *job.status() == JobStatus::Transforming {
            self.transition(job, JobStatus::Encoding);
        }

        let artifact = scope
            .take_output()
            .ok_or_else(|| FailureKind::EncodeFailed("output path was not acquired".to_string()))?;
        if artifact.bytes() == 0 {
            return Err(FailureKind::EncodeFailed("encoder wrote an empty file".to_string()));
        }
        scope.release();
        Ok(artifact)
    }

    fn transition(&self, job: &mut Job, next: JobStatus) {
        let from = job.status().clone();
        match job.advance(next) {
            Ok(()) => {
                info!(job_id = %job.id, from = %from, to = %job.status(), "job status changed");
                if let Some(tx) = &self.status_tx {
                    let _ = tx.send((job.id, job.status().clone()));
                }
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "rejected job transition");
                debug_assert!(false, "{}", e);
            }
        }
    }

    fn report(
        job: &Job,
        source: &dyn SourcePort,
        facts: &RunFacts,
        artifact: Option<&OutputArtifact>,
        started_at: DateTime<Utc>,
    ) -> JobReport {
        let failure = job.failure();
        JobReport {
            job_id: job.id,
            source: source.describe(),
            status: job.status().label().to_string(),
            failure_code: failure.map(|k| k.code().to_string()),
            failure_message: failure.map(|k| k.user_message().to_string()),
            failure_detail: failure.map(|k| k.to_string()),
            advisories: job.advisories.clone(),
            source_width: facts.info.as_ref().map(|i| i.width),
            source_height: facts.info.as_ref().map(|i| i.height),
            crop: facts.crop,
            output_bytes: artifact.map(|a| a.bytes()),
            output_frames: facts.summary.as_ref().map(|s| s.frames),
            output_duration_seconds: facts.summary.as_ref().map(|s| s.duration_seconds),
            source_audio: facts.summary.as_ref().map(|s| s.source_audio),
            started_at,
            finished_at: Utc::now(),
        }
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), FailureKind> {
    if cancel.is_cancelled() {
        Err(FailureKind::Cancelled)
    } else {
        Ok(())
    }
}
