//! Job submission and status handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;
use validator::Validate;

use vmix_models::{AudioReplaceRequest, ComposeRequest, JobId, RecordStatus};
use vmix_worker::{JobRequest, JobSnapshot};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Response for an accepted job.
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: JobId,
    pub status: &'static str,
}

/// Start a composition job.
pub async fn create_compose_job(
    State(state): State<AppState>,
    payload: Result<Json<ComposeRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    submit(&state, JobRequest::Compose(request)).await
}

/// Start a short-form audio replacement job.
pub async fn create_audio_replace_job(
    State(state): State<AppState>,
    payload: Result<Json<AudioReplaceRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    submit(&state, JobRequest::AudioReplace(request)).await
}

async fn submit(
    state: &AppState,
    request: JobRequest,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let kind = request.kind();
    let job_id = match state.executor.submit(request).await {
        Ok(id) => id,
        Err(e) => {
            let reason = if e.is_conflict() { "conflict" } else { "rejected" };
            metrics::record_job_rejected(kind.as_str(), reason);
            return Err(e.into());
        }
    };

    metrics::record_job_submitted(kind.as_str());
    info!(job_id = %job_id, kind = kind.as_str(), "Job submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job_id,
            status: RecordStatus::ProcessingStarted.as_str(),
        }),
    ))
}

/// Current status of a job.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let id = JobId::from(job_id);
    state
        .executor
        .status(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("job {}", id)))
}
