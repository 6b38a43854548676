//! Job API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use offerline_core::{CreateJobRequest, JobRecord, OrchestratorError, PhaseUpdate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for toggling a phase
#[derive(Debug, Deserialize)]
pub struct UpdatePhaseBody {
    /// 1-based position of the phase
    pub phase_number: usize,
    pub completed: bool,
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobRecord>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<JobErrorResponse>);

fn error_response(err: OrchestratorError) -> ApiError {
    let status = match &err {
        OrchestratorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::AlreadyExists(_) | OrchestratorError::AlreadyRunning(_) => {
            StatusCode::CONFLICT
        }
        _ => {
            error!("Job request failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(JobErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a new job; its pipeline starts in the background
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobRecord>), ApiError> {
    state
        .orchestrator()
        .create_job(body)
        .map(|record| (StatusCode::CREATED, Json(record)))
        .map_err(error_response)
}

/// List all jobs, oldest first
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let jobs = state.orchestrator().list_jobs().map_err(error_response)?;
    Ok(Json(ListJobsResponse { jobs }))
}

/// Get a job by id
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    state
        .orchestrator()
        .get_job(&id)
        .map(Json)
        .map_err(error_response)
}

/// Manually mark a phase completed or pending
pub async fn update_phase(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdatePhaseBody>,
) -> Result<Json<JobRecord>, ApiError> {
    let update = PhaseUpdate {
        id,
        phase_number: body.phase_number,
        completed: body.completed,
    };
    state
        .orchestrator()
        .update_phase(update)
        .map(Json)
        .map_err(error_response)
}

/// Requeue a job; the pipeline continues in the background
pub async fn retry_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    state
        .orchestrator()
        .retry(&id)
        .map(Json)
        .map_err(error_response)
}
