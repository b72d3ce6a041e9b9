use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    jobs::scheduler::TriggerResult,
    models::{
        common::ErrorResponse,
        jobs::{JobsResponse, RunJobResponse},
    },
    AppState,
};

/// Handler for GET /api/admin/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobsResponse> {
    Json(JobsResponse {
        jobs: state.scheduler.statuses(),
    })
}

/// Handler for POST /api/admin/jobs/{name}/run
pub async fn run_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RunJobResponse>, (StatusCode, Json<ErrorResponse>)> {
    tracing::info!("Manual trigger requested for job {}", name);

    match state.scheduler.trigger(&name).await {
        TriggerResult::UnknownJob => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Unknown job '{}'", name),
            }),
        )),
        result => Ok(Json(RunJobResponse { job: name, result })),
    }
}
