//! External task polling.
//!
//! A submitted task moves `submitted -> polling -> {completed, failed, timed out}`.
//! The ceiling is a number of status checks, not a wall-clock deadline.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use vmix_models::ExternalTask;

use crate::client::LipSyncConfig;
use crate::error::{LipSyncError, LipSyncResult};
use crate::types::{SubmitRequest, TaskStatus};

/// A provider that accepts tasks and reports their status.
#[async_trait]
pub trait TaskProvider: Send + Sync {
    /// Submit a task, returning the provider task id.
    async fn submit(&self, request: &SubmitRequest) -> LipSyncResult<String>;

    /// Current normalized status of a task.
    async fn status(&self, task_id: &str) -> LipSyncResult<TaskStatus>;
}

/// Receives task progress while the poller runs.
#[async_trait]
pub trait StatusObserver: Send + Sync {
    /// The provider accepted the task.
    async fn on_submitted(&self, _task: &ExternalTask) {}

    /// A successful status check did not end the task. This includes a
    /// completion that still lacks a result URL.
    async fn on_status(&self, task: &ExternalTask);
}

/// Observer that ignores every event.
pub struct NoopObserver;

#[async_trait]
impl StatusObserver for NoopObserver {
    async fn on_status(&self, _task: &ExternalTask) {}
}

/// Poll timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub max_attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        PollerConfig::from(&LipSyncConfig::default())
    }
}

impl From<&LipSyncConfig> for PollerConfig {
    fn from(config: &LipSyncConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            error_backoff: config.error_backoff,
            max_attempts: config.max_attempts,
        }
    }
}

/// Drives an external task to a terminal state.
pub struct ExternalTaskPoller<P> {
    provider: P,
    config: PollerConfig,
}

impl<P: TaskProvider> ExternalTaskPoller<P> {
    pub fn new(provider: P, config: PollerConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Submit `request` and poll until the task finishes.
    pub async fn submit_and_wait(
        &self,
        request: &SubmitRequest,
        observer: &dyn StatusObserver,
    ) -> LipSyncResult<ExternalTask> {
        let task_id = self.provider.submit(request).await?;
        let mut task = ExternalTask::new(task_id);
        observer.on_submitted(&task).await;
        self.run(&mut task, observer).await?;
        Ok(task)
    }

    /// Poll `task` until it completes, fails or exhausts its attempts.
    ///
    /// Returns the result URL. `task.attempts` counts every status check,
    /// including ones that failed in transport.
    pub async fn run(
        &self,
        task: &mut ExternalTask,
        observer: &dyn StatusObserver,
    ) -> LipSyncResult<String> {
        let mut delay = self.config.poll_interval;

        loop {
            if task.attempts >= self.config.max_attempts {
                warn!(
                    task_id = %task.provider_task_id,
                    attempts = task.attempts,
                    "Lip-sync task timed out"
                );
                metrics::counter!("vmix_lipsync_polls_total", "outcome" => "timeout").increment(1);
                return Err(LipSyncError::ExternalTaskTimeout {
                    attempts: task.attempts,
                });
            }

            tokio::time::sleep(delay).await;
            task.attempts += 1;

            let status = match self.provider.status(&task.provider_task_id).await {
                Ok(status) => status,
                Err(e) if e.is_transient() => {
                    warn!(
                        task_id = %task.provider_task_id,
                        attempt = task.attempts,
                        error = %e,
                        "Status check failed, backing off"
                    );
                    metrics::counter!("vmix_lipsync_polls_total", "outcome" => "error").increment(1);
                    delay = self.config.error_backoff;
                    continue;
                }
                Err(e) => return Err(e),
            };

            metrics::counter!("vmix_lipsync_polls_total", "outcome" => status.as_str()).increment(1);
            task.last_status = status.as_str().to_string();
            delay = self.config.poll_interval;

            match status {
                TaskStatus::Completed {
                    result_url: Some(url),
                } => {
                    info!(
                        task_id = %task.provider_task_id,
                        attempts = task.attempts,
                        "Lip-sync task completed"
                    );
                    task.result_url = Some(url.clone());
                    return Ok(url);
                }
                TaskStatus::Completed { result_url: None } => {
                    debug!(
                        task_id = %task.provider_task_id,
                        "Provider reports completion without a result URL yet"
                    );
                    observer.on_status(task).await;
                }
                TaskStatus::Failed { reason } => {
                    warn!(task_id = %task.provider_task_id, reason = %reason, "Lip-sync task failed");
                    return Err(LipSyncError::ExternalTaskFailed(reason));
                }
                TaskStatus::Pending | TaskStatus::Processing => {
                    observer.on_status(task).await;
                }
            }
        }
    }
}
