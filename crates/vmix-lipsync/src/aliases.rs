//! Field aliases used by lip-sync providers.
//!
//! Providers disagree on field names and sometimes wrap the payload in a
//! `data` envelope. Every lookup checks the top level first, then `data`.

use serde_json::Value;

pub const TASK_ID_FIELDS: &[&str] = &["task_id", "taskId", "id", "request_id", "requestId", "job_id"];

pub const STATUS_FIELDS: &[&str] = &["status", "state", "task_status", "taskStatus"];

pub const RESULT_URL_FIELDS: &[&str] = &[
    "result_url",
    "resultUrl",
    "output_url",
    "outputUrl",
    "video_url",
    "videoUrl",
    "url",
];

pub const FAILURE_FIELDS: &[&str] = &[
    "error",
    "error_message",
    "errorMessage",
    "failure_reason",
    "message",
    "detail",
];

pub const DONE_STATUSES: &[&str] = &["completed", "complete", "succeeded", "success", "done", "finished"];

pub const FAILED_STATUSES: &[&str] = &[
    "failed",
    "failure",
    "error",
    "errored",
    "cancelled",
    "canceled",
    "rejected",
];

pub const PENDING_STATUSES: &[&str] = &["pending", "queued", "submitted", "waiting", "created"];

/// First non-empty string-like value under any of `fields`.
///
/// Numbers are accepted and rendered as strings (some providers use numeric
/// task ids). Nested objects are searched for a `message` field.
pub fn find_string(payload: &Value, fields: &[&str]) -> Option<String> {
    let envelope = payload.get("data").filter(|d| d.is_object());
    std::iter::once(payload)
        .chain(envelope)
        .find_map(|scope| fields.iter().find_map(|f| scope.get(*f).and_then(as_text)))
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("message").and_then(as_text),
        _ => None,
    }
}
