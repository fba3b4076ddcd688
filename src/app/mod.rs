// Application layer - Use case interactors and service host

pub mod container;
pub mod inbox_watcher;
pub mod pipeline_interactor;
pub mod replies;
pub mod supervisor;
pub mod worker_pool;

// Re-export interactors
pub use container::{AppContainer, DefaultAppContainer};
pub use inbox_watcher::{InboxWatcher, ScanSummary};
pub use pipeline_interactor::{JobOutcome, JobReport, PipelineInteractor, StatusUpdate};
pub use supervisor::{ServiceError, Supervisor};
pub use worker_pool::WorkerPool;
