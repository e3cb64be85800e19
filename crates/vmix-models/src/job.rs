//! Composition job definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::{MediaAsset, OverlaySpec, RecordStatus};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Type of job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Concatenate videos, lay music under them, optionally overlay an image
    Compose,
    /// Replace a video's audio with a short faded clip of another track
    AudioReplace,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Compose => "compose",
            JobKind::AudioReplace => "audio_replace",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// Downloading and probing inputs
    #[default]
    Acquiring,
    /// Looping/trimming/fading the music track
    Conditioning,
    /// Running the filter graph
    Composing,
    /// Waiting on the lip-sync provider
    PollingExternal,
    Done,
    Failed,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Acquiring => "acquiring",
            JobStage::Conditioning => "conditioning",
            JobStage::Composing => "composing",
            JobStage::PollingExternal => "polling_external",
            JobStage::Done => "done",
            JobStage::Failed => "failed",
        }
    }

    /// Check if this is a terminal stage (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Done | JobStage::Failed)
    }

    /// Status string written to the job record when entering this stage.
    pub fn record_status(&self) -> RecordStatus {
        match self {
            JobStage::Acquiring => RecordStatus::ProcessingStarted,
            JobStage::Conditioning => RecordStatus::ConditioningAudio,
            JobStage::Composing => RecordStatus::MergingAudio,
            JobStage::PollingExternal => RecordStatus::LipSyncSubmitted,
            JobStage::Done => RecordStatus::Completed,
            JobStage::Failed => RecordStatus::Failed,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A task submitted to the third-party lip-sync processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalTask {
    pub provider_task_id: String,
    /// Status checks performed so far (successful or not)
    pub attempts: u32,
    /// Last normalized provider status
    pub last_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
}

impl ExternalTask {
    pub fn new(provider_task_id: impl Into<String>) -> Self {
        Self {
            provider_task_id: provider_task_id.into(),
            attempts: 0,
            last_status: "submitted".to_string(),
            result_url: None,
        }
    }
}

/// A composition job as owned by the task executing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionJob {
    pub id: JobId,
    pub kind: JobKind,
    pub stage: JobStage,
    /// Downloaded and probed inputs, in request order
    #[serde(default)]
    pub inputs: Vec<MediaAsset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlaySpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_task: Option<ExternalTask>,
    /// Public URL of the final asset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CompositionJob {
    /// Create a new job in the acquiring stage.
    pub fn new(id: JobId, kind: JobKind, overlay: Option<OverlaySpec>) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            stage: JobStage::Acquiring,
            inputs: Vec::new(),
            overlay,
            output_path: None,
            external_task: None,
            result_url: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to the next stage. Terminal jobs are never reopened.
    pub fn advance(&mut self, stage: JobStage) -> bool {
        if self.stage.is_terminal() {
            return false;
        }
        self.stage = stage;
        self.updated_at = Utc::now();
        true
    }

    /// Mark job as completed.
    pub fn complete(&mut self, result_url: impl Into<String>) {
        if self.advance(JobStage::Done) {
            self.result_url = Some(result_url.into());
        }
    }

    /// Mark job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.advance(JobStage::Failed) {
            self.error_message = Some(error.into());
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Status string as exposed to API callers.
    pub fn status(&self) -> String {
        match (&self.stage, &self.external_task) {
            (JobStage::PollingExternal, Some(task)) => format!("lipsync_{}", task.last_status),
            _ => self.stage.record_status().as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = CompositionJob::new(JobId::from("job-1"), JobKind::Compose, None);
        assert_eq!(job.stage, JobStage::Acquiring);
        assert_eq!(job.status(), "processing_started");
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_job_stage_transitions() {
        let mut job = CompositionJob::new(JobId::new(), JobKind::Compose, None);
        assert!(job.advance(JobStage::Conditioning));
        assert_eq!(job.status(), "conditioning_audio");
        assert!(job.advance(JobStage::Composing));
        assert_eq!(job.status(), "merging_audio");

        job.complete("https://cdn.example.com/out.mp4");
        assert_eq!(job.stage, JobStage::Done);
        assert_eq!(job.status(), "completed");
        assert_eq!(job.result_url.as_deref(), Some("https://cdn.example.com/out.mp4"));
    }

    #[test]
    fn test_terminal_job_is_not_reopened() {
        let mut job = CompositionJob::new(JobId::new(), JobKind::AudioReplace, None);
        job.fail("ffmpeg exploded");
        assert!(!job.advance(JobStage::Composing));
        job.complete("https://late.example.com");
        assert_eq!(job.stage, JobStage::Failed);
        assert_eq!(job.error_message.as_deref(), Some("ffmpeg exploded"));
        assert!(job.result_url.is_none());
    }

    #[test]
    fn test_polling_status_uses_provider_status() {
        let mut job = CompositionJob::new(JobId::new(), JobKind::Compose, None);
        job.advance(JobStage::PollingExternal);
        let mut task = ExternalTask::new("task-9");
        task.last_status = "processing".to_string();
        job.external_task = Some(task);
        assert_eq!(job.status(), "lipsync_processing");
    }

    #[test]
    fn test_job_id_serializes_transparently() {
        let id = JobId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
