//! Asynchronous encode job handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use innova_models::{Job, JobId};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::handlers::video::ProcessRequest;
use crate::services::CancelOutcome;
use crate::state::AppState;

/// Queue an edit and return the pending job immediately.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let spec = request.into_spec(&state.layout)?;
    let job = state.jobs.submit(spec).await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// Current state and progress of a job.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    state
        .jobs
        .get(&JobId::from_string(id))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

/// Cancel a pending or running job.
///
/// Cancelling an already-cancelled job is a no-op; jobs that completed or
/// failed cannot be cancelled.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let id = JobId::from_string(id);
    match state.jobs.cancel(&id).await {
        Some(CancelOutcome::Cancelled(job)) => {
            info!(job_id = %id, state = %job.state, "Job cancel requested");
            Ok(Json(job))
        }
        Some(CancelOutcome::AlreadyFinished(job)) => {
            Err(ApiError::Conflict(format!("Job already {}", job.state)))
        }
        None => Err(ApiError::not_found("Job not found")),
    }
}
