//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job {0} is already in flight")]
    Conflict(String),

    #[error("Invalid job request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Media(#[from] vmix_media::MediaError),

    #[error(transparent)]
    LipSync(#[from] vmix_lipsync::LipSyncError),

    #[error("Record store error: {0}")]
    Store(#[from] vmix_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, WorkerError::Conflict(_))
    }

    /// Message written to the job record when this error ends a job.
    ///
    /// Transcode failures carry the FFmpeg stderr tail.
    pub fn failure_message(&self) -> String {
        match self {
            WorkerError::Media(e) => e.detailed_message(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmix_lipsync::LipSyncError;
    use vmix_media::MediaError;

    #[test]
    fn test_lower_layer_messages_are_verbatim() {
        let err: WorkerError = MediaError::download_failed("https://x/a.mp4", "HTTP 404").into();
        assert_eq!(
            err.failure_message(),
            MediaError::download_failed("https://x/a.mp4", "HTTP 404").to_string()
        );

        let err: WorkerError = LipSyncError::ExternalTaskFailed("no face".into()).into();
        assert_eq!(err.failure_message(), "Lip-sync task failed: no face");
    }

    #[test]
    fn test_transcode_failure_includes_stderr() {
        let err: WorkerError = MediaError::transcode_failed(
            "ffmpeg exited with status 1",
            Some("Invalid data found when processing input".to_string()),
            Some(1),
        )
        .into();
        assert!(err.failure_message().contains("Invalid data found"));
    }

    #[test]
    fn test_conflict() {
        assert!(WorkerError::Conflict("j1".into()).is_conflict());
        assert!(!WorkerError::invalid_request("x").is_conflict());
    }
}
