// Worker pool - Bounded concurrent job execution

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::app::pipeline_interactor::{JobOutcome, PipelineInteractor};
use crate::error::{CircleNoteError, CircleNoteResult};
use crate::ports::SourcePort;

/// Runs jobs on the tokio runtime, at most `workers` at a time.
///
/// Every job gets a child of the pool's shutdown token, so cancelling the
/// pool cancels queued and running jobs alike.
pub struct WorkerPool {
    interactor: Arc<PipelineInteractor>,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    workers: usize,
}

impl WorkerPool {
    pub fn new(interactor: Arc<PipelineInteractor>, workers: usize, shutdown: CancellationToken) -> Self {
        let workers = workers.max(1);
        Self {
            interactor,
            permits: Arc::new(Semaphore::new(workers)),
            shutdown,
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Queue one job. The returned handle resolves once the job is terminal.
    pub fn submit(&self, source: Arc<dyn SourcePort>) -> JoinHandle<JobOutcome> {
        let interactor = Arc::clone(&self.interactor);
        let permits = Arc::clone(&self.permits);
        let token = self.shutdown.child_token();

        tokio::spawn(async move {
            // A cancelled job still runs so that it ends as Failed(Cancelled)
            let _permit = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };
            debug!(source = %source.describe(), "worker slot acquired");
            interactor.run(source.as_ref(), token).await
        })
    }

    /// Submit all sources and wait for every outcome, in submission order
    pub async fn run_all(&self, sources: Vec<Arc<dyn SourcePort>>) -> CircleNoteResult<Vec<JobOutcome>> {
        let handles: Vec<_> = sources.into_iter().map(|s| self.submit(s)).collect();
        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(error = %e, "job task did not complete");
                    return Err(CircleNoteError::JobTaskFailed {
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(outcomes)
    }
}
