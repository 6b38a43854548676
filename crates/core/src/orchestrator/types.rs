//! Types for the job orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generator::GeneratorError;
use crate::job::JobError;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The request was rejected before touching any job.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Job not found.
    #[error("job not found: {0}")]
    NotFound(String),

    /// A job with the same id already exists.
    #[error("job already exists: {0}")]
    AlreadyExists(String),

    /// The job already has a live pipeline in this process.
    #[error("job is already running: {0}")]
    AlreadyRunning(String),

    /// The generator failed.
    #[error("external process failed: {0}")]
    ExternalProcessFailure(#[from] GeneratorError),

    /// A phase ended without its document.
    #[error("no artifact produced for phase {phase}")]
    StepArtifactMissing { phase: String },

    /// A running job stopped updating.
    #[error("Timeout > {minutes} min")]
    Timeout { minutes: u64 },

    /// Job store error.
    #[error("job store error: {0}")]
    Store(JobError),
}

impl From<JobError> for OrchestratorError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(id) => Self::NotFound(id),
            JobError::AlreadyExists(id) => Self::AlreadyExists(id),
            other => Self::Store(other),
        }
    }
}

impl OrchestratorError {
    /// Label for the `reason` dimension of the failure metric.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::AlreadyRunning(_) => "already_running",
            Self::ExternalProcessFailure(_) => "generator",
            Self::StepArtifactMissing { .. } => "artifact_missing",
            Self::Timeout { .. } => "stale",
            Self::Store(_) => "store",
        }
    }
}

/// Body of a job submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    #[serde(default)]
    pub idea_text: String,
}

/// Manual toggle of one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseUpdate {
    pub id: String,
    /// 1-based position in the pipeline.
    pub phase_number: usize,
    pub completed: bool,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Number of jobs with a live pipeline task in this process.
    pub active_jobs: usize,
    /// Ids of those jobs, sorted.
    pub active_job_ids: Vec<String>,
    /// Whether a periodic staleness sweep is configured.
    pub sweep_enabled: bool,
    /// Whether the sweep loop is currently running.
    pub sweep_running: bool,
}
