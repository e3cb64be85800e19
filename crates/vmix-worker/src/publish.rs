//! Output publication.
//!
//! Finished outputs are copied into the public directory as
//! `<kind>_<job id>_<unix ts>.mp4` and served under `/outputs/`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use vmix_media::publish_file;
use vmix_models::{JobId, JobKind};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

/// URL path prefix under which the public directory is served.
pub const OUTPUTS_ROUTE: &str = "/outputs";

/// A published output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedOutput {
    pub path: PathBuf,
    pub url: String,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct Publisher {
    public_dir: PathBuf,
    base_url: String,
}

impl Publisher {
    pub fn new(public_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            public_dir: public_dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(&config.public_dir, &config.public_base_url)
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Public URL of a file in the public directory.
    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}{}/{}", self.base_url, OUTPUTS_ROUTE, file_name)
    }

    /// Copy `src` into the public directory and return where it can be fetched.
    pub async fn publish(
        &self,
        src: &Path,
        kind: JobKind,
        job_id: &JobId,
    ) -> WorkerResult<PublishedOutput> {
        let file_name = output_file_name(kind, job_id, Utc::now().timestamp());
        let path = self.public_dir.join(&file_name);
        let bytes = publish_file(src, &path).await?;
        let url = self.url_for(&file_name);

        info!(job_id = %job_id, bytes, url = %url, "Published output");
        Ok(PublishedOutput { path, url, bytes })
    }
}

pub fn output_file_name(kind: JobKind, job_id: &JobId, unix_ts: i64) -> String {
    format!("{}_{}_{}.mp4", kind.as_str(), job_id, unix_ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(JobKind::AudioReplace, &JobId::from("j-1"), 1_767_225_600),
            "audio_replace_j-1_1767225600.mp4"
        );
    }

    #[test]
    fn test_url_for_trims_base() {
        let publisher = Publisher::new("/srv/public", "https://media.example.com/");
        assert_eq!(
            publisher.url_for("compose_a_1.mp4"),
            "https://media.example.com/outputs/compose_a_1.mp4"
        );
    }

    #[tokio::test]
    async fn test_publish_copies_into_public_dir() {
        let work = tempfile::tempdir().unwrap();
        let public = tempfile::tempdir().unwrap();
        let src = work.path().join("final.mp4");
        tokio::fs::write(&src, b"not really a video").await.unwrap();

        let publisher = Publisher::new(public.path(), "http://localhost:8000");
        let out = publisher
            .publish(&src, JobKind::Compose, &JobId::from("abc"))
            .await
            .unwrap();

        assert!(out.path.starts_with(public.path()));
        assert_eq!(out.bytes, 18);
        let name = out.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("compose_abc_"));
        assert!(name.ends_with(".mp4"));
        assert_eq!(out.url, format!("http://localhost:8000/outputs/{}", name));
        // source stays in the workspace
        assert!(src.exists());
    }
}
