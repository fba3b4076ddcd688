// Supervisor - Restart policy for long-running services

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::adapters::toml_config::SupervisorSettings;
use crate::error::CircleNoteError;

/// How a service run ended
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("fatal: {0}")]
    Fatal(CircleNoteError),

    #[error("recoverable: {0}")]
    Recoverable(CircleNoteError),

    #[error("gave up after {restarts} restarts: {source}")]
    Exhausted {
        restarts: u32,
        #[source]
        source: CircleNoteError,
    },
}

impl From<CircleNoteError> for ServiceError {
    fn from(err: CircleNoteError) -> Self {
        if err.is_recoverable() {
            ServiceError::Recoverable(err)
        } else {
            ServiceError::Fatal(err)
        }
    }
}

/// Reruns a service after recoverable failures, with a fixed backoff
pub struct Supervisor {
    max_restarts: u32,
    backoff: Duration,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(max_restarts: u32, backoff: Duration, shutdown: CancellationToken) -> Self {
        Self {
            max_restarts,
            backoff,
            shutdown,
        }
    }

    pub fn from_settings(settings: &SupervisorSettings, shutdown: CancellationToken) -> Self {
        Self::new(
            settings.max_restarts,
            Duration::from_secs(settings.backoff_secs),
            shutdown,
        )
    }

    /// Run `service` until it returns `Ok`, fails fatally, or exhausts its restarts.
    ///
    /// `service` receives the attempt number, starting at 0. A shutdown during
    /// backoff ends supervision with `Ok`.
    pub async fn run<F, Fut>(&self, name: &str, mut service: F) -> Result<(), ServiceError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), ServiceError>>,
    {
        let mut restarts = 0;
        loop {
            info!(service = name, attempt = restarts, "service starting");
            let err = match service(restarts).await {
                Ok(()) => {
                    info!(service = name, "service stopped");
                    return Ok(());
                }
                Err(ServiceError::Recoverable(err)) => err,
                Err(other) => {
                    error!(service = name, error = %other, "service failed");
                    return Err(other);
                }
            };

            if restarts >= self.max_restarts {
                error!(service = name, restarts, error = %err, "restart budget exhausted");
                return Err(ServiceError::Exhausted { restarts, source: err });
            }
            restarts += 1;
            warn!(
                service = name,
                restarts,
                backoff_ms = self.backoff.as_millis() as u64,
                error = %err,
                "service failed, restarting"
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(service = name, "shutdown during backoff");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }
}
