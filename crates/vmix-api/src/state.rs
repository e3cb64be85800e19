//! Application state.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use vmix_lipsync::{ExternalTaskPoller, LipSyncClient, LipSyncConfig, PollerConfig};
use vmix_store::{JobStore, MemoryJobStore, StoreConfig, SupabaseClient, SupabaseJobStore};
use vmix_worker::{JobExecutor, JobRegistry, Pipeline, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub executor: JobExecutor,
    /// Directory served under `/outputs`
    pub public_dir: PathBuf,
}

impl AppState {
    /// Create new application state from the environment.
    pub async fn new(
        config: ApiConfig,
        worker_config: WorkerConfig,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        tokio::fs::create_dir_all(&worker_config.public_dir).await?;
        tokio::fs::create_dir_all(&worker_config.work_dir).await?;

        let store = job_store_from_env()?;
        let mut pipeline = Pipeline::new(worker_config.clone(), store, JobRegistry::new())?;

        let lipsync = LipSyncConfig::from_env();
        if lipsync.is_configured() {
            let poller = ExternalTaskPoller::new(
                LipSyncClient::new(lipsync.clone())?,
                PollerConfig::from(&lipsync),
            );
            pipeline = pipeline.with_lipsync(poller);
            info!(base_url = %lipsync.base_url, "Lip-sync provider enabled");
        } else {
            info!("Lip-sync provider not configured; lip-sync requests will be rejected");
        }

        Ok(Self::with_executor(
            config,
            JobExecutor::new(pipeline),
            worker_config.public_dir,
        ))
    }

    pub fn with_executor(config: ApiConfig, executor: JobExecutor, public_dir: PathBuf) -> Self {
        Self {
            config,
            executor,
            public_dir,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        self.executor.pipeline().store()
    }
}

/// Supabase when `SUPABASE_URL` is set, otherwise a process-local store.
fn job_store_from_env() -> Result<Arc<dyn JobStore>, Box<dyn std::error::Error + Send + Sync>> {
    if std::env::var("SUPABASE_URL").is_ok() {
        let config = StoreConfig::from_env()?;
        info!(table = %config.table, "Using Supabase job record store");
        Ok(Arc::new(SupabaseJobStore::new(SupabaseClient::new(config)?)))
    } else {
        warn!("SUPABASE_URL not set; job records are kept in memory only");
        Ok(Arc::new(MemoryJobStore::new()))
    }
}
