//! Detection of running jobs that stopped making progress.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::types::OrchestratorError;
use crate::job::{update_job, JobError, JobRecord, JobStore};
use crate::metrics;

pub const STALE_MESSAGE: &str = "Failed by timeout";
pub const STALE_NEXT_LABEL: &str = "Reprocess project";

/// Fails running jobs whose record has not been updated within the timeout.
///
/// `updated_at` is the only progress signal, so the check is cheap enough to
/// run on every read.
#[derive(Clone)]
pub struct StalenessMonitor {
    store: Arc<dyn JobStore>,
    timeout_minutes: u64,
    /// `None` when the timeout does not fit a `Duration`; nothing is ever stale then.
    threshold: Option<Duration>,
}

impl StalenessMonitor {
    pub fn new(store: Arc<dyn JobStore>, timeout_minutes: u64) -> Self {
        let threshold = i64::try_from(timeout_minutes)
            .ok()
            .and_then(Duration::try_minutes);
        if threshold.is_none() {
            warn!(
                "Stale timeout of {} minutes is out of range, staleness detection disabled",
                timeout_minutes
            );
        }
        Self {
            store,
            timeout_minutes,
            threshold,
        }
    }

    pub fn is_stale(&self, record: &JobRecord, now: DateTime<Utc>) -> bool {
        match self.threshold {
            Some(threshold) => record.status.running && now - record.updated_at > threshold,
            None => false,
        }
    }

    /// Return the record, failing and persisting it first if it is stale.
    pub fn check_and_reconcile(&self, record: JobRecord) -> Result<JobRecord, JobError> {
        self.reconcile(record).map(|(record, _)| record)
    }

    /// Reconcile every stored record; returns how many were failed.
    pub fn sweep(&self) -> Result<usize, JobError> {
        let mut failed = 0;
        for record in self.store.list()? {
            let id = record.id.clone();
            match self.reconcile(record) {
                Ok((_, true)) => failed += 1,
                Ok((_, false)) => {}
                Err(e) => warn!("Staleness check failed for job {}: {}", id, e),
            }
        }
        Ok(failed)
    }

    fn reconcile(&self, record: JobRecord) -> Result<(JobRecord, bool), JobError> {
        if !self.is_stale(&record, Utc::now()) {
            return Ok((record, false));
        }

        let error = OrchestratorError::Timeout {
            minutes: self.timeout_minutes,
        }
        .to_string();
        let mut transitioned = false;

        // Re-checked on the fresh record so concurrent readers fail it only once.
        let updated = update_job(self.store.as_ref(), &record.id, |r| {
            transitioned = false;
            if !self.is_stale(r, Utc::now()) {
                return false;
            }
            r.mark_failed(&error, STALE_MESSAGE, STALE_NEXT_LABEL);
            r.append_log(format!(
                "No progress for more than {} minutes, marking as failed",
                self.timeout_minutes
            ));
            transitioned = true;
            true
        })?;

        if transitioned {
            warn!(
                "Job {} failed by timeout (last update {})",
                updated.id, record.updated_at
            );
            metrics::STALE_JOBS_DETECTED.inc();
            metrics::JOBS_FAILED.with_label_values(&["stale"]).inc();
        } else {
            debug!("Job {} was refreshed before it could be failed", updated.id);
        }
        Ok((updated, transitioned))
    }
}
