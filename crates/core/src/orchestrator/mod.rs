//! Job orchestrator for background pipeline processing.
//!
//! - **Engine**: one detached task per running job, phases strictly in order
//! - **Staleness**: running jobs that stop updating are failed on read, or by
//!   an optional periodic sweep
//! - **Retry**: manual, either restarting the pipeline or resuming it

mod config;
mod engine;
mod runner;
mod staleness;
mod types;

pub use config::{OrchestratorConfig, RetryPolicy};
pub use engine::{
    ActiveGuard, PipelineEngine, RunOutcome, COMPLETED_MESSAGE, COMPLETED_NEXT_LABEL,
    FAILED_MESSAGE, FAILED_NEXT_LABEL,
};
pub use runner::JobOrchestrator;
pub use staleness::{StalenessMonitor, STALE_MESSAGE, STALE_NEXT_LABEL};
pub use types::{CreateJobRequest, OrchestratorError, OrchestratorStatus, PhaseUpdate};
