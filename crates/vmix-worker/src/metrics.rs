//! Job metrics.

use vmix_models::JobKind;

pub mod names {
    pub const JOBS_STARTED: &str = "vmix_jobs_started_total";
    pub const JOBS_COMPLETED: &str = "vmix_jobs_completed_total";
    pub const JOBS_FAILED: &str = "vmix_jobs_failed_total";
    pub const JOB_DURATION: &str = "vmix_job_duration_seconds";
    pub const OUTPUTS_SWEPT: &str = "vmix_outputs_swept_total";
}

pub fn record_job_started(kind: JobKind) {
    metrics::counter!(names::JOBS_STARTED, "kind" => kind.as_str()).increment(1);
}

pub fn record_job_completed(kind: JobKind, duration_secs: f64) {
    metrics::counter!(names::JOBS_COMPLETED, "kind" => kind.as_str()).increment(1);
    metrics::histogram!(names::JOB_DURATION, "kind" => kind.as_str(), "outcome" => "completed")
        .record(duration_secs);
}

pub fn record_job_failed(kind: JobKind, duration_secs: f64) {
    metrics::counter!(names::JOBS_FAILED, "kind" => kind.as_str()).increment(1);
    metrics::histogram!(names::JOB_DURATION, "kind" => kind.as_str(), "outcome" => "failed")
        .record(duration_secs);
}

pub fn record_outputs_swept(count: usize) {
    metrics::counter!(names::OUTPUTS_SWEPT).increment(count as u64);
}
