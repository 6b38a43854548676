//! Job records: data model, phase definitions and storage backends.

mod fs_store;
mod layout;
mod pipeline;
mod sqlite_store;
mod store;
mod types;

pub use fs_store::{FsJobStore, RECORD_FILE};
pub use layout::ArtifactLayout;
pub use pipeline::{MetricRule, PhaseDefinition, STANDARD_PIPELINE};
pub use sqlite_store::SqliteJobStore;
pub use store::{update_job, JobError, JobStore, MAX_CONFLICT_RETRIES};
pub use types::{
    progress_percent, safe_name, JobRecord, JobStatus, LogEntry, PhaseEntry, PhaseState,
    MAX_LOG_ENTRIES, QUEUED_MESSAGE,
};
