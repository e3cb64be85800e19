//! Provider request and status types.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::aliases::{
    find_string, DONE_STATUSES, FAILED_STATUSES, FAILURE_FIELDS, PENDING_STATUSES,
    RESULT_URL_FIELDS, STATUS_FIELDS,
};

/// Task submission body: `{ video_url, audio_url, ...params }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitRequest {
    pub video_url: String,
    pub audio_url: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl SubmitRequest {
    pub fn new(video_url: impl Into<String>, audio_url: impl Into<String>) -> Self {
        Self {
            video_url: video_url.into(),
            audio_url: audio_url.into(),
            params: Map::new(),
        }
    }

    /// Extra provider parameters. `video_url` and `audio_url` cannot be overridden.
    pub fn with_params(mut self, mut params: Map<String, Value>) -> Self {
        params.remove("video_url");
        params.remove("audio_url");
        self.params = params;
        self
    }
}

/// Provider status normalized into the poller's four states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Processing,
    /// Terminal only when `result_url` is present
    Completed { result_url: Option<String> },
    Failed { reason: String },
}

impl TaskStatus {
    /// Normalize a status payload.
    pub fn from_payload(payload: &Value) -> Self {
        let raw = find_string(payload, STATUS_FIELDS)
            .unwrap_or_default()
            .to_ascii_lowercase();

        if DONE_STATUSES.contains(&raw.as_str()) {
            TaskStatus::Completed {
                result_url: find_string(payload, RESULT_URL_FIELDS),
            }
        } else if FAILED_STATUSES.contains(&raw.as_str()) {
            TaskStatus::Failed {
                reason: find_string(payload, FAILURE_FIELDS)
                    .unwrap_or_else(|| format!("provider reported status '{}'", raw)),
            }
        } else if PENDING_STATUSES.contains(&raw.as_str()) {
            TaskStatus::Pending
        } else {
            TaskStatus::Processing
        }
    }

    /// Short name written into job status strings (`lipsync_<name>`).
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed { .. } => "completed",
            TaskStatus::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_done_vocabulary() {
        for status in ["completed", "Succeeded", "SUCCESS", "done", "finished", "complete"] {
            let parsed = TaskStatus::from_payload(&json!({"status": status, "output_url": "https://cdn/x.mp4"}));
            assert_eq!(
                parsed,
                TaskStatus::Completed {
                    result_url: Some("https://cdn/x.mp4".to_string())
                },
                "status {status}"
            );
        }
    }

    #[test]
    fn test_completed_without_url() {
        let parsed = TaskStatus::from_payload(&json!({"status": "completed"}));
        assert_eq!(parsed, TaskStatus::Completed { result_url: None });
    }

    #[test]
    fn test_failed_vocabulary_and_reason() {
        let parsed = TaskStatus::from_payload(&json!({"state": "errored", "errorMessage": "bad audio"}));
        assert_eq!(
            parsed,
            TaskStatus::Failed {
                reason: "bad audio".to_string()
            }
        );

        let parsed = TaskStatus::from_payload(&json!({"status": "cancelled"}));
        assert!(matches!(parsed, TaskStatus::Failed { reason } if reason.contains("cancelled")));
    }

    #[test]
    fn test_pending_and_processing() {
        assert_eq!(TaskStatus::from_payload(&json!({"taskStatus": "queued"})), TaskStatus::Pending);
        assert_eq!(
            TaskStatus::from_payload(&json!({"status": "rendering"})),
            TaskStatus::Processing
        );
        assert_eq!(TaskStatus::from_payload(&json!({})), TaskStatus::Processing);
    }

    #[test]
    fn test_enveloped_status() {
        let parsed = TaskStatus::from_payload(&json!({
            "code": 0,
            "data": {"task_status": "succeed", "video_url": "https://cdn/y.mp4"}
        }));
        // "succeed" is not in the done vocabulary
        assert_eq!(parsed, TaskStatus::Processing);

        let parsed = TaskStatus::from_payload(&json!({
            "data": {"task_status": "success", "videoUrl": "https://cdn/y.mp4"}
        }));
        assert_eq!(
            parsed,
            TaskStatus::Completed {
                result_url: Some("https://cdn/y.mp4".to_string())
            }
        );
    }

    #[test]
    fn test_submit_body_flattens_params() {
        let mut params = Map::new();
        params.insert("sync_mode".into(), json!("loop"));
        params.insert("video_url".into(), json!("https://evil/override.mp4"));
        let request = SubmitRequest::new("https://a/v.mp4", "https://a/s.mp3").with_params(params);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({"video_url": "https://a/v.mp4", "audio_url": "https://a/s.mp3", "sync_mode": "loop"})
        );
    }
}
