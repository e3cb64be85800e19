//! Per-job temporary working directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use vmix_models::JobId;

use crate::error::WorkerResult;

/// A directory owned by one job, removed when dropped.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: TempDir,
}

impl JobWorkspace {
    /// Create a fresh directory under `base` named after the job.
    pub async fn create(base: &Path, job_id: &JobId) -> WorkerResult<Self> {
        tokio::fs::create_dir_all(base).await?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", job_id))
            .tempdir_in(base)?;
        debug!(job_id = %job_id, path = %dir.path().display(), "Created job workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
