//! In-memory registry of jobs owned by this process.
//!
//! The task running a job is the only writer of that job; status queries read
//! cloned snapshots.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use vmix_models::{CompositionJob, JobId, JobKind, JobRecord};

use crate::error::{WorkerError, WorkerResult};

/// Point-in-time view of a job, as returned by status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lipsync_task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&CompositionJob> for JobSnapshot {
    fn from(job: &CompositionJob) -> Self {
        Self {
            job_id: job.id.clone(),
            kind: job.kind,
            status: job.status(),
            result_url: job.result_url.clone(),
            lipsync_task_id: job
                .external_task
                .as_ref()
                .map(|t| t.provider_task_id.clone()),
            error: job.error_message.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

impl From<JobRecord> for JobSnapshot {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.id,
            kind: record.kind,
            status: record.status,
            result_url: record.result_url,
            lipsync_task_id: record.lipsync_task_id,
            error: record.error_message,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, CompositionJob>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job about to start.
    ///
    /// Fails with a conflict while a job with the same id is still running;
    /// a finished job with that id is replaced.
    pub async fn try_register(&self, job: CompositionJob) -> WorkerResult<()> {
        let mut jobs = self.jobs.write().await;
        if let Some(existing) = jobs.get(&job.id) {
            if !existing.is_terminal() {
                return Err(WorkerError::Conflict(job.id.to_string()));
            }
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    /// Mutate a registered job. Returns `None` if the id is unknown.
    pub async fn update<F, R>(&self, id: &JobId, f: F) -> Option<R>
    where
        F: FnOnce(&mut CompositionJob) -> R,
    {
        self.jobs.write().await.get_mut(id).map(f)
    }

    pub async fn get(&self, id: &JobId) -> Option<CompositionJob> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn snapshot(&self, id: &JobId) -> Option<JobSnapshot> {
        self.jobs.read().await.get(id).map(JobSnapshot::from)
    }

    /// Jobs not yet done or failed.
    pub async fn active_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| !j.is_terminal())
            .count()
    }

    /// Drop finished jobs last touched more than `older_than` ago.
    pub async fn prune_finished(&self, older_than: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !(job.is_terminal() && job.updated_at <= cutoff));
        before - jobs.len()
    }
}
