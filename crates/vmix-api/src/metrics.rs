//! Prometheus metrics for the API server.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder and return a handle to render it.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "vmix_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vmix_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vmix_http_requests_in_flight";
    pub const JOBS_SUBMITTED_TOTAL: &str = "vmix_jobs_submitted_total";
    pub const JOBS_REJECTED_TOTAL: &str = "vmix_jobs_rejected_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an accepted job submission.
pub fn record_job_submitted(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_SUBMITTED_TOTAL, &labels).increment(1);
}

/// Record a submission rejected before the job started.
pub fn record_job_rejected(kind: &str, reason: &str) {
    let labels = [("kind", kind.to_string()), ("reason", reason.to_string())];
    counter!(names::JOBS_REJECTED_TOTAL, &labels).increment(1);
}

/// Collapse job ids and output file names so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    static JOB_ID: OnceLock<Option<Regex>> = OnceLock::new();
    static OUTPUT: OnceLock<Option<Regex>> = OnceLock::new();

    let job_id = JOB_ID.get_or_init(|| Regex::new(r"^/api/jobs/[A-Za-z0-9_-]+$").ok());
    let output = OUTPUT.get_or_init(|| Regex::new(r"^/outputs/.+$").ok());

    let submission = matches!(path, "/api/jobs/compose" | "/api/jobs/audio-replace");
    match (job_id, output) {
        (Some(re), _) if !submission && re.is_match(path) => "/api/jobs/:job_id".to_string(),
        (_, Some(re)) if re.is_match(path) => "/outputs/:file".to_string(),
        _ => path.to_string(),
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
