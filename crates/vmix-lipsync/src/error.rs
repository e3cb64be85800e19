//! Lip-sync error types.

use thiserror::Error;

pub type LipSyncResult<T> = Result<T, LipSyncError>;

#[derive(Debug, Error)]
pub enum LipSyncError {
    #[error("Lip-sync provider is not configured (set LIPSYNC_API_URL and LIPSYNC_API_KEY)")]
    NotConfigured,

    #[error("Lip-sync base URL is not usable: {0}")]
    InvalidBaseUrl(String),

    #[error("Provider response carried no task id: {0}")]
    NoTaskId(String),

    #[error("Lip-sync task failed: {0}")]
    ExternalTaskFailed(String),

    #[error("Lip-sync task did not finish after {attempts} status checks")]
    ExternalTaskTimeout { attempts: u32 },

    #[error("Provider returned {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl LipSyncError {
    /// Errors the poller absorbs and retries after a back-off.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LipSyncError::Network(_)
                | LipSyncError::RequestFailed { .. }
                | LipSyncError::InvalidResponse(_)
        )
    }
}
