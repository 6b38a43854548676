//! Job record storage trait and the shared load-mutate-save helper.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use super::JobRecord;

/// Number of times `update_job` re-applies a mutation after losing a version race.
pub const MAX_CONFLICT_RETRIES: usize = 5;

/// Error type for job store operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job not found.
    #[error("job not found: {0}")]
    NotFound(String),

    /// A job with this id already exists.
    #[error("job already exists: {0}")]
    AlreadyExists(String),

    /// The record changed since it was loaded.
    #[error("version conflict on job {id}: expected {expected}, found {found}")]
    Conflict { id: String, expected: u64, found: u64 },

    /// Database error.
    #[error("database error: {0}")]
    Database(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Trait for job record storage backends.
///
/// `save` is a compare-and-swap on `JobRecord::version`: it fails with
/// [`JobError::Conflict`] when someone else saved the record after it was loaded.
pub trait JobStore: Send + Sync {
    /// Persist a brand-new record.
    fn create(&self, record: &JobRecord) -> Result<JobRecord, JobError>;

    /// Get a record by id.
    fn get(&self, id: &str) -> Result<Option<JobRecord>, JobError>;

    /// Overwrite a record, refreshing `updated_at` and bumping `version`.
    fn save(&self, record: &JobRecord) -> Result<JobRecord, JobError>;

    /// All persisted records.
    fn list(&self) -> Result<Vec<JobRecord>, JobError>;

    /// Get a record, mapping absence to [`JobError::NotFound`].
    fn load(&self, id: &str) -> Result<JobRecord, JobError> {
        self.get(id)?.ok_or_else(|| JobError::NotFound(id.to_string()))
    }
}

/// Stamp a record for persistence: new `updated_at` (never before `created_at`) and next version.
pub(crate) fn stamp_for_save(record: &JobRecord, now: DateTime<Utc>) -> JobRecord {
    let mut saved = record.clone();
    saved.updated_at = now.max(record.created_at);
    saved.version = record.version + 1;
    saved
}

/// Load a record, apply `mutate`, and save it, re-applying on version conflicts.
///
/// `mutate` returns whether it changed the record; when it returns `false`
/// nothing is written and the freshly loaded record is returned as-is.
pub fn update_job<F>(store: &dyn JobStore, id: &str, mut mutate: F) -> Result<JobRecord, JobError>
where
    F: FnMut(&mut JobRecord) -> bool,
{
    let mut attempt = 0;
    loop {
        let mut record = store.load(id)?;
        if !mutate(&mut record) {
            return Ok(record);
        }

        match store.save(&record) {
            Err(JobError::Conflict { expected, found, .. }) if attempt < MAX_CONFLICT_RETRIES => {
                attempt += 1;
                debug!(
                    "Version conflict on job {} (expected {}, found {}), retrying ({}/{})",
                    id, expected, found, attempt, MAX_CONFLICT_RETRIES
                );
            }
            result => return result,
        }
    }
}
