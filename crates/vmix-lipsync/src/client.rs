//! Lip-sync provider HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde_json::Value;
use tracing::{debug, info};

use crate::aliases::{find_string, TASK_ID_FIELDS};
use crate::error::{LipSyncError, LipSyncResult};
use crate::poller::TaskProvider;
use crate::types::{SubmitRequest, TaskStatus};

/// Configuration for the provider client and the poller.
#[derive(Debug, Clone)]
pub struct LipSyncConfig {
    /// Provider API root; empty when lip-sync is disabled
    pub base_url: String,
    pub api_key: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Delay between successful status checks
    pub poll_interval: Duration,
    /// Delay after a failed status check
    pub error_backoff: Duration,
    /// Status checks before giving up
    pub max_attempts: u32,
}

impl Default for LipSyncConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
            error_backoff: Duration::from_secs(10),
            max_attempts: 120,
        }
    }
}

impl LipSyncConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            base_url: std::env::var("LIPSYNC_API_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            api_key: std::env::var("LIPSYNC_API_KEY").unwrap_or_default(),
            timeout: secs("LIPSYNC_TIMEOUT_SECS", defaults.timeout),
            poll_interval: secs("LIPSYNC_POLL_INTERVAL_SECS", defaults.poll_interval),
            error_backoff: secs("LIPSYNC_ERROR_BACKOFF_SECS", defaults.error_backoff),
            max_attempts: std::env::var("LIPSYNC_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_attempts),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }
}

/// Client for the lip-sync provider.
#[derive(Debug, Clone)]
pub struct LipSyncClient {
    http: Client,
    base: Url,
    config: LipSyncConfig,
}

impl LipSyncClient {
    pub fn new(config: LipSyncConfig) -> LipSyncResult<Self> {
        if !config.is_configured() {
            return Err(LipSyncError::NotConfigured);
        }
        let base = Url::parse(&config.base_url)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| LipSyncError::InvalidBaseUrl(config.base_url.clone()))?;
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vmix-lipsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(LipSyncError::Network)?;

        Ok(Self { http, base, config })
    }

    pub fn config(&self) -> &LipSyncConfig {
        &self.config
    }

    /// Submit a task and return the provider's task id.
    pub async fn submit_task(&self, request: &SubmitRequest) -> LipSyncResult<String> {
        let url = self.endpoint(None)?;
        debug!(%url, "Submitting lip-sync task");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;
        let payload = Self::json_body(response).await?;

        let task_id = find_string(&payload, TASK_ID_FIELDS)
            .ok_or_else(|| LipSyncError::NoTaskId(truncate(&payload.to_string(), 300)))?;
        info!(task_id = %task_id, "Lip-sync task accepted");
        Ok(task_id)
    }

    /// Fetch and normalize the status of `task_id`.
    pub async fn task_status(&self, task_id: &str) -> LipSyncResult<TaskStatus> {
        let url = self.endpoint(Some(task_id))?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;
        let payload = Self::json_body(response).await?;
        Ok(TaskStatus::from_payload(&payload))
    }

    /// `{base}/lipsync`, or `{base}/lipsync/{task_id}` with the id as one
    /// percent-encoded segment.
    fn endpoint(&self, task_id: Option<&str>) -> LipSyncResult<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| LipSyncError::InvalidBaseUrl(self.config.base_url.clone()))?;
            segments.pop_if_empty().push("lipsync");
            if let Some(id) = task_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn json_body(response: Response) -> LipSyncResult<Value> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LipSyncError::RequestFailed {
                status: status.as_u16(),
                message: truncate(&body, 300),
            });
        }
        serde_json::from_str(&body)
            .map_err(|e| LipSyncError::InvalidResponse(format!("{}: {}", e, truncate(&body, 120))))
    }
}

#[async_trait]
impl TaskProvider for LipSyncClient {
    async fn submit(&self, request: &SubmitRequest) -> LipSyncResult<String> {
        self.submit_task(request).await
    }

    async fn status(&self, task_id: &str) -> LipSyncResult<TaskStatus> {
        self.task_status(task_id).await
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
