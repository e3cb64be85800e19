//! Persisted job records.
//!
//! One row per job in the record store. Only the fields below are read or
//! written; the table may carry more columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{JobId, JobKind};

/// Status strings stored in the `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    ProcessingStarted,
    ConditioningAudio,
    MergingAudio,
    Publishing,
    #[serde(rename = "lipsync_submitted")]
    LipSyncSubmitted,
    #[serde(rename = "lipsync_pending")]
    LipSyncPending,
    #[serde(rename = "lipsync_processing")]
    LipSyncProcessing,
    /// Provider says done but has not exposed the result URL yet
    #[serde(rename = "lipsync_completed")]
    LipSyncCompleted,
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::ProcessingStarted => "processing_started",
            RecordStatus::ConditioningAudio => "conditioning_audio",
            RecordStatus::MergingAudio => "merging_audio",
            RecordStatus::Publishing => "publishing",
            RecordStatus::LipSyncSubmitted => "lipsync_submitted",
            RecordStatus::LipSyncPending => "lipsync_pending",
            RecordStatus::LipSyncProcessing => "lipsync_processing",
            RecordStatus::LipSyncCompleted => "lipsync_completed",
            RecordStatus::Completed => "completed",
            RecordStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordStatus::Completed | RecordStatus::Failed)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A job row in the record store.
///
/// Optional columns serialize as `null` so an upsert of a fresh record clears
/// whatever an earlier run left behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    /// Kept as a free string so rows written by other producers still load
    pub status: String,
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub lipsync_task_id: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Fresh record for a job that has just been accepted.
    pub fn started(id: JobId, kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            status: RecordStatus::ProcessingStarted.as_str().to_string(),
            result_url: None,
            lipsync_task_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings_match_serde() {
        for status in [
            RecordStatus::ProcessingStarted,
            RecordStatus::MergingAudio,
            RecordStatus::LipSyncPending,
            RecordStatus::LipSyncCompleted,
            RecordStatus::Completed,
            RecordStatus::Failed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_started_record() {
        let record = JobRecord::started(JobId::from("j1"), JobKind::Compose);
        assert_eq!(record.status, "processing_started");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "j1");
        assert_eq!(json["kind"], "compose");
        assert!(json["result_url"].is_null());
        assert!(json.as_object().unwrap().contains_key("error_message"));
    }

    #[test]
    fn test_record_tolerates_missing_optional_columns() {
        let record: JobRecord = serde_json::from_str(
            r#"{"id":"j2","kind":"audio_replace","status":"lipsync_processing",
                "created_at":"2026-01-01T00:00:00Z","updated_at":"2026-01-01T00:00:05Z"}"#,
        )
        .unwrap();
        assert_eq!(record.kind, JobKind::AudioReplace);
        assert!(record.error_message.is_none());
    }
}
