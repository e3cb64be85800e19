//! Lip-sync progress written back to the registry and the record store.

use std::sync::Arc;

use async_trait::async_trait;
use vmix_lipsync::StatusObserver;
use vmix_models::{ExternalTask, JobId, JobStage, RecordStatus};
use vmix_store::{JobStore, RecordUpdate};

use crate::pipeline::write_record;
use crate::registry::JobRegistry;

/// Mirrors external task progress onto one job.
pub struct RecordObserver {
    job_id: JobId,
    registry: JobRegistry,
    store: Arc<dyn JobStore>,
}

impl RecordObserver {
    pub fn new(job_id: JobId, registry: JobRegistry, store: Arc<dyn JobStore>) -> Self {
        Self {
            job_id,
            registry,
            store,
        }
    }
}

#[async_trait]
impl StatusObserver for RecordObserver {
    async fn on_submitted(&self, task: &ExternalTask) {
        self.registry
            .update(&self.job_id, |job| {
                job.advance(JobStage::PollingExternal);
                job.external_task = Some(task.clone());
            })
            .await;

        let update = RecordUpdate::status(RecordStatus::LipSyncSubmitted.as_str())
            .with_lipsync_task(&task.provider_task_id);
        write_record(self.store.as_ref(), &self.job_id, update).await;
    }

    async fn on_status(&self, task: &ExternalTask) {
        self.registry
            .update(&self.job_id, |job| job.external_task = Some(task.clone()))
            .await;

        let status = format!("lipsync_{}", task.last_status);
        write_record(self.store.as_ref(), &self.job_id, RecordUpdate::status(status)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmix_models::{CompositionJob, JobKind, JobRecord, RecordStatus};
    use vmix_store::MemoryJobStore;

    #[tokio::test]
    async fn test_observer_mirrors_task_progress() {
        let id = JobId::from("ls-1");
        let registry = JobRegistry::new();
        let store = Arc::new(MemoryJobStore::new());
        registry
            .try_register(CompositionJob::new(id.clone(), JobKind::Compose, None))
            .await
            .unwrap();
        store
            .upsert(&JobRecord::started(id.clone(), JobKind::Compose))
            .await
            .unwrap();

        let observer = RecordObserver::new(id.clone(), registry.clone(), store.clone());
        let mut task = ExternalTask::new("prov-7");
        observer.on_submitted(&task).await;

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, "lipsync_submitted");
        assert_eq!(record.lipsync_task_id.as_deref(), Some("prov-7"));

        task.attempts = 2;
        task.last_status = "processing".to_string();
        observer.on_status(&task).await;

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, "lipsync_processing");
        let snapshot = registry.snapshot(&id).await.unwrap();
        assert_eq!(snapshot.status, "lipsync_processing");
        assert_eq!(snapshot.lipsync_task_id.as_deref(), Some("prov-7"));

        task.attempts = 3;
        task.last_status = "completed".to_string();
        observer.on_status(&task).await;

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::LipSyncCompleted.as_str());
    }
}
