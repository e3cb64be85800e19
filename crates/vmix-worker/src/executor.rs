//! Job executor.
//!
//! Each accepted job runs on its own Tokio task; submission returns as soon
//! as the job is registered.

use std::sync::Arc;

use tracing::info;

use vmix_lipsync::LipSyncError;
use vmix_models::{CompositionJob, JobId};

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{JobRequest, Pipeline};
use crate::registry::{JobRegistry, JobSnapshot};

#[derive(Clone)]
pub struct JobExecutor {
    pipeline: Arc<Pipeline>,
}

impl JobExecutor {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn registry(&self) -> &JobRegistry {
        self.pipeline.registry()
    }

    /// Register `request` and start it in the background.
    ///
    /// Rejected when the id is already in flight, or when lip-sync is
    /// requested but no provider is configured.
    pub async fn submit(&self, request: JobRequest) -> WorkerResult<JobId> {
        if request.wants_lipsync() && !self.pipeline.lipsync_enabled() {
            return Err(LipSyncError::NotConfigured.into());
        }

        let id = request.job_id();
        let kind = request.kind();
        self.registry()
            .try_register(CompositionJob::new(id.clone(), kind, request.overlay_spec()))
            .await?;

        info!(job_id = %id, kind = kind.as_str(), "Job accepted");

        let pipeline = Arc::clone(&self.pipeline);
        let job_id = id.clone();
        tokio::spawn(async move {
            pipeline.run(job_id, request).await;
        });

        Ok(id)
    }

    /// Status of a job: the live registry first, then the record store.
    pub async fn status(&self, id: &JobId) -> WorkerResult<Option<JobSnapshot>> {
        if let Some(snapshot) = self.registry().snapshot(id).await {
            return Ok(Some(snapshot));
        }
        let record = self.pipeline.store().get(id).await.map_err(WorkerError::from)?;
        Ok(record.map(JobSnapshot::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vmix_models::{ComposeRequest, JobKind, JobRecord, LipSyncRequest};
    use vmix_store::{JobStore, MemoryJobStore};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::WorkerConfig;

    fn executor(work: &std::path::Path, store: Arc<MemoryJobStore>) -> JobExecutor {
        let config = WorkerConfig {
            work_dir: work.to_path_buf(),
            public_dir: work.join("public"),
            ..WorkerConfig::default()
        };
        JobExecutor::new(Pipeline::new(config, store, JobRegistry::new()).unwrap())
    }

    fn compose(id: &str, urls: Vec<String>) -> JobRequest {
        JobRequest::Compose(ComposeRequest {
            job_id: Some(id.to_string()),
            video_urls: urls,
            music_url: None,
            overlay: None,
            lipsync: None,
            encoding: None,
        })
    }

    #[tokio::test]
    async fn test_submit_returns_immediately_and_job_fails_in_background() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let work = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryJobStore::new());
        let executor = executor(work.path(), store.clone());
        let url = format!("{}/v.mp4", server.uri());

        let id = executor
            .submit(compose("bg-1", vec![url.clone(), url]))
            .await
            .unwrap();
        assert_eq!(id.as_str(), "bg-1");

        let mut snapshot = None;
        for _ in 0..100 {
            let current = executor.status(&id).await.unwrap().unwrap();
            if current.status == "failed" {
                snapshot = Some(current);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let snapshot = snapshot.expect("job never reached failed");
        assert!(snapshot.error.unwrap().contains("HTTP 403"));
    }

    #[tokio::test]
    async fn test_in_flight_duplicate_is_rejected() {
        let work = tempfile::tempdir().unwrap();
        let executor = executor(work.path(), Arc::new(MemoryJobStore::new()));
        executor
            .registry()
            .try_register(CompositionJob::new(JobId::from("dup"), JobKind::Compose, None))
            .await
            .unwrap();

        let err = executor
            .submit(compose("dup", vec!["https://a/1.mp4".into(), "https://a/2.mp4".into()]))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_lipsync_request_without_provider_is_rejected() {
        let work = tempfile::tempdir().unwrap();
        let executor = executor(work.path(), Arc::new(MemoryJobStore::new()));
        let request = JobRequest::Compose(ComposeRequest {
            job_id: Some("ls".into()),
            video_urls: vec!["https://a/1.mp4".into()],
            music_url: Some("https://a/voice.mp3".into()),
            overlay: None,
            lipsync: Some(LipSyncRequest::default()),
            encoding: None,
        });

        let err = executor.submit(request).await.unwrap_err();
        assert!(matches!(err, WorkerError::LipSync(LipSyncError::NotConfigured)));
        assert!(executor.registry().get(&JobId::from("ls")).await.is_none());
    }

    #[tokio::test]
    async fn test_status_falls_back_to_record_store() {
        let work = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryJobStore::new());
        let mut record = JobRecord::started(JobId::from("old"), JobKind::AudioReplace);
        record.status = "completed".to_string();
        record.result_url = Some("https://x/out.mp4".to_string());
        store.upsert(&record).await.unwrap();

        let executor = executor(work.path(), store);
        let snapshot = executor.status(&JobId::from("old")).await.unwrap().unwrap();
        assert_eq!(snapshot.status, "completed");
        assert_eq!(snapshot.result_url.as_deref(), Some("https://x/out.mp4"));

        assert!(executor.status(&JobId::from("unknown")).await.unwrap().is_none());
    }
}
