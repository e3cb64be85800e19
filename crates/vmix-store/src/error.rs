//! Record store error types.

use thiserror::Error;

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            429 => Self::RateLimited(1000),
            500..=599 => Self::ServerError(status, message),
            _ => Self::RequestFailed(message),
        }
    }

    /// HTTP status this error corresponds to, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            StoreError::Unauthorized(_) => Some(401),
            StoreError::NotFound(_) => Some(404),
            StoreError::Conflict(_) => Some(409),
            StoreError::RateLimited(_) => Some(429),
            StoreError::ServerError(status, _) => Some(*status),
            StoreError::RequestFailed(_) => Some(400),
            StoreError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Server-requested wait before retrying.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            StoreError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Network(_) | StoreError::RateLimited(_) | StoreError::ServerError(..)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(StoreError::from_http_status(401, "x"), StoreError::Unauthorized(_)));
        assert!(matches!(StoreError::from_http_status(404, "x"), StoreError::NotFound(_)));
        assert!(matches!(StoreError::from_http_status(409, "x"), StoreError::Conflict(_)));
        assert!(matches!(StoreError::from_http_status(429, "x"), StoreError::RateLimited(_)));
        assert!(matches!(StoreError::from_http_status(503, "x"), StoreError::ServerError(503, _)));
        assert!(matches!(StoreError::from_http_status(422, "x"), StoreError::RequestFailed(_)));
    }

    #[test]
    fn test_retryable() {
        assert!(StoreError::from_http_status(500, "boom").is_retryable());
        assert!(StoreError::from_http_status(429, "slow down").is_retryable());
        assert!(!StoreError::from_http_status(400, "bad").is_retryable());
        assert!(!StoreError::from_http_status(409, "dup").is_retryable());
    }

    #[test]
    fn test_http_status_getter() {
        assert_eq!(StoreError::RateLimited(1000).http_status(), Some(429));
        assert_eq!(StoreError::ServerError(502, "bad gateway".into()).http_status(), Some(502));
        assert_eq!(StoreError::config("missing url").http_status(), None);
    }
}
