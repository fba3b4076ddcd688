use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adapters::{LibavTranscoder, Settings};
use crate::app::pipeline_interactor::{PipelineInteractor, StatusUpdate};
use crate::app::supervisor::Supervisor;
use crate::app::worker_pool::WorkerPool;
use crate::ports::TranscodePort;

pub trait AppContainer: Send + Sync {
    fn pipeline_interactor(&self) -> Arc<PipelineInteractor>;
    fn worker_pool(&self) -> Arc<WorkerPool>;
    fn supervisor(&self) -> Supervisor;
}

/// Wires the libav transcoder into the interactor and worker pool
pub struct DefaultAppContainer {
    settings: Settings,
    shutdown: CancellationToken,
    pipeline_interactor: Arc<PipelineInteractor>,
    worker_pool: Arc<WorkerPool>,
}

impl DefaultAppContainer {
    pub fn new(settings: Settings, shutdown: CancellationToken) -> Self {
        Self::build(settings, shutdown, Arc::new(LibavTranscoder::new()), None)
    }

    /// Same as `new`, but every job status change is sent to `tx`
    pub fn with_status_listener(
        settings: Settings,
        shutdown: CancellationToken,
        tx: mpsc::UnboundedSender<StatusUpdate>,
    ) -> Self {
        Self::build(settings, shutdown, Arc::new(LibavTranscoder::new()), Some(tx))
    }

    /// Build around any transcoder
    pub fn build(
        settings: Settings,
        shutdown: CancellationToken,
        transcode_port: Arc<dyn TranscodePort>,
        status_tx: Option<mpsc::UnboundedSender<StatusUpdate>>,
    ) -> Self {
        let mut interactor = PipelineInteractor::new(
            transcode_port,
            Arc::new(settings.limits.clone()),
            settings.scratch_root(),
        );
        if let Some(tx) = status_tx {
            interactor = interactor.with_status_listener(tx);
        }
        let pipeline_interactor = Arc::new(interactor);
        let worker_pool = Arc::new(WorkerPool::new(
            Arc::clone(&pipeline_interactor),
            settings.workers,
            shutdown.clone(),
        ));

        Self {
            settings,
            shutdown,
            pipeline_interactor,
            worker_pool,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }
}

impl AppContainer for DefaultAppContainer {
    fn pipeline_interactor(&self) -> Arc<PipelineInteractor> {
        Arc::clone(&self.pipeline_interactor)
    }

    fn worker_pool(&self) -> Arc<WorkerPool> {
        Arc::clone(&self.worker_pool)
    }

    fn supervisor(&self) -> Supervisor {
        Supervisor::from_settings(&self.settings.supervisor, self.shutdown.clone())
    }
}
