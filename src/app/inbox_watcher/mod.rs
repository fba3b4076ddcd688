// Inbox watcher - Polls a directory and turns new videos into notes

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::LocalFileSource;
use crate::app::pipeline_interactor::JobOutcome;
use crate::app::replies;
use crate::app::worker_pool::WorkerPool;
use crate::domain::errors::FailureKind;
use crate::error::{CircleNoteError, CircleNoteResult};
use crate::ports::SourcePort;
use crate::utils::path::{
    discover_inputs, note_file_name, report_file_name, REJECTED_DIR, REJECTED_NOTE_SUFFIX,
};

/// Counts from one pass over the inbox
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub converted: usize,
    pub rejected: usize,
    /// Cancelled jobs; their inputs stay in the inbox
    pub deferred: usize,
}

impl ScanSummary {
    pub fn total(&self) -> usize {
        self.converted + self.rejected + self.deferred
    }
}

pub struct InboxWatcher {
    pool: Arc<WorkerPool>,
    inbox: PathBuf,
    outbox: PathBuf,
    poll_interval: Duration,
    min_age: Duration,
    seen: HashSet<PathBuf>,
}

impl InboxWatcher {
    pub fn new(pool: Arc<WorkerPool>, inbox: impl Into<PathBuf>, outbox: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            inbox: inbox.into(),
            outbox: outbox.into(),
            poll_interval: Duration::from_secs(2),
            min_age: Duration::from_secs(1),
            seen: HashSet::new(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Ignore files modified more recently than `age`, which may still be uploading
    pub fn with_min_age(mut self, age: Duration) -> Self {
        self.min_age = age;
        self
    }

    pub fn rejected_dir(&self) -> PathBuf {
        self.inbox.join(REJECTED_DIR)
    }

    /// Poll until the shutdown token fires
    pub async fn run(&mut self, shutdown: &CancellationToken) -> CircleNoteResult<()> {
        std::fs::create_dir_all(&self.outbox)?;
        info!(
            inbox = %self.inbox.display(),
            outbox = %self.outbox.display(),
            poll_ms = self.poll_interval.as_millis() as u64,
            "watching inbox"
        );
        loop {
            let summary = self.scan_once().await?;
            if summary.total() > 0 {
                info!(
                    converted = summary.converted,
                    rejected = summary.rejected,
                    deferred = summary.deferred,
                    "inbox pass finished"
                );
            }
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("inbox watcher stopping");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Convert every new, settled input currently in the inbox
    pub async fn scan_once(&mut self) -> CircleNoteResult<ScanSummary> {
        if !self.inbox.is_dir() {
            return Err(CircleNoteError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("inbox does not exist: {}", self.inbox.display()),
            )));
        }
        let fresh: Vec<PathBuf> = discover_inputs(
            std::slice::from_ref(&self.inbox),
            std::slice::from_ref(&self.outbox),
        )?
            .into_iter()
            .filter(|p| !self.seen.contains(p) && self.is_settled(p))
            .collect();
        let mut summary = ScanSummary::default();
        if fresh.is_empty() {
            return Ok(summary);
        }
        info!(count = fresh.len(), "{}", replies::status_text(fresh.len()));

        let sources: Vec<Arc<dyn SourcePort>> = fresh
            .iter()
            .map(|p| Arc::new(LocalFileSource::new(p)) as Arc<dyn SourcePort>)
            .collect();
        let outcomes = self.pool.run_all(sources).await?;

        for (input, outcome) in fresh.into_iter().zip(outcomes) {
            match outcome.failure().cloned() {
                None => {
                    self.seen.insert(input.clone());
                    match self.deliver(&input, outcome) {
                        Ok(dest) => {
                            summary.converted += 1;
                            info!(input = %input.display(), note = %dest.display(), "note delivered");
                        }
                        Err(e) => warn!(input = %input.display(), error = %e, "failed to deliver note"),
                    }
                }
                Some(FailureKind::Cancelled) => summary.deferred += 1,
                Some(kind) => {
                    self.seen.insert(input.clone());
                    summary.rejected += 1;
                    if let Err(e) = self.reject(&input, &kind) {
                        warn!(input = %input.display(), error = %e, "failed to move rejected input");
                    }
                }
            }
        }
        Ok(summary)
    }

    fn is_settled(&self, path: &Path) -> bool {
        if self.min_age.is_zero() {
            return true;
        }
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| SystemTime::now().duration_since(t).ok())
            .map_or(false, |age| age >= self.min_age)
    }

    fn deliver(&self, input: &Path, outcome: JobOutcome) -> CircleNoteResult<PathBuf> {
        let JobOutcome { report, artifact, .. } = outcome;
        let artifact = artifact.ok_or_else(|| CircleNoteError::ScratchError {
            message: "succeeded job carried no artifact".to_string(),
        })?;
        let dest = artifact.persist(&self.outbox.join(note_file_name(input)))?;

        let json = serde_json::to_vec_pretty(&report).map_err(|e| CircleNoteError::ConfigError {
            message: format!("failed to serialize report: {}", e),
        })?;
        std::fs::write(self.outbox.join(report_file_name(input)), json)?;
        std::fs::remove_file(input)?;
        Ok(dest)
    }

    fn reject(&self, input: &Path, kind: &FailureKind) -> CircleNoteResult<()> {
        let dir = self.rejected_dir();
        std::fs::create_dir_all(&dir)?;
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        let moved = dir.join(&name);
        std::fs::rename(input, &moved)?;

        let note = format!("{}\n\ncode: {}\ndetail: {}\n", replies::failure_text(kind), kind.code(), kind);
        std::fs::write(dir.join(format!("{}{}", name, REJECTED_NOTE_SUFFIX)), note)?;
        info!(input = %input.display(), code = kind.code(), "input rejected");
        Ok(())
    }
}
