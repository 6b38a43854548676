//! Job orchestrator implementation.
//!
//! Entry point for every job operation: submission, listing, manual phase
//! toggles and retries. Pipelines run on detached tasks owned by the
//! [`PipelineEngine`]; an optional background loop sweeps stale jobs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, warn};

use super::config::{OrchestratorConfig, RetryPolicy};
use super::engine::PipelineEngine;
use super::staleness::StalenessMonitor;
use super::types::{CreateJobRequest, OrchestratorError, OrchestratorStatus, PhaseUpdate};
use crate::generator::StepInvoker;
use crate::job::{
    update_job, ArtifactLayout, JobError, JobRecord, JobStore, PhaseDefinition, PhaseState,
};
use crate::metrics;
use crate::notifier::CompanionNotifier;

/// The job orchestrator - owns the store, the engine and the staleness monitor.
pub struct JobOrchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn JobStore>,
    layout: ArtifactLayout,
    pipeline: &'static [PhaseDefinition],
    engine: PipelineEngine,
    staleness: StalenessMonitor,

    // Sweep loop state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl JobOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn JobStore>,
        invoker: Arc<dyn StepInvoker>,
        notifier: Arc<dyn CompanionNotifier>,
        layout: ArtifactLayout,
        pipeline: &'static [PhaseDefinition],
        product_type: impl Into<String>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let engine = PipelineEngine::new(
            config.clone(),
            Arc::clone(&store),
            invoker,
            notifier,
            layout.clone(),
            pipeline,
            product_type,
        );
        let staleness = StalenessMonitor::new(Arc::clone(&store), config.stale_timeout_minutes);

        Self {
            config,
            store,
            layout,
            pipeline,
            engine,
            staleness,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Submit a new job and start its pipeline in the background.
    pub fn create_job(&self, request: CreateJobRequest) -> Result<JobRecord, OrchestratorError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "name is required".to_string(),
            ));
        }

        let record = JobRecord::new(name, &request.idea_text, self.pipeline);
        if self.store.get(&record.id)?.is_some() {
            return Err(OrchestratorError::AlreadyExists(record.id));
        }

        self.layout
            .prepare(&record.id, self.pipeline)
            .map_err(|e| OrchestratorError::Store(e.into()))?;
        let record = self.store.create(&record)?;
        metrics::JOBS_CREATED.inc();
        info!("Created job {} ({})", record.id, record.name);

        let guard = self.engine.claim(&record.id)?;
        self.engine.spawn(guard);
        Ok(record)
    }

    /// All jobs, oldest first, with stale ones reconciled.
    ///
    /// A record that fails to reconcile is listed as read, or left out if it
    /// disappeared in the meantime.
    pub fn list_jobs(&self) -> Result<Vec<JobRecord>, OrchestratorError> {
        let mut records = Vec::new();
        for record in self.store.list()? {
            let id = record.id.clone();
            match self.staleness.check_and_reconcile(record.clone()) {
                Ok(reconciled) => records.push(reconciled),
                Err(JobError::NotFound(_)) => {
                    warn!("Job {} disappeared while listing, skipping", id);
                }
                Err(e) => {
                    warn!("Staleness check failed for job {}: {}", id, e);
                    records.push(record);
                }
            }
        }
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    /// One job, reconciled if stale.
    pub fn get_job(&self, id: &str) -> Result<JobRecord, OrchestratorError> {
        let record = self
            .store
            .get(id)?
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))?;
        Ok(self.staleness.check_and_reconcile(record)?)
    }

    /// Mark one phase completed or pending without running anything.
    pub fn update_phase(&self, update: PhaseUpdate) -> Result<JobRecord, OrchestratorError> {
        let total = self.pipeline.len();
        if update.phase_number == 0 || update.phase_number > total {
            return Err(OrchestratorError::InvalidRequest(format!(
                "phase_number must be between 1 and {}, got {}",
                total, update.phase_number
            )));
        }
        let index = update.phase_number - 1;
        let key = self.pipeline[index].key;
        let state = if update.completed {
            PhaseState::Completed
        } else {
            PhaseState::Pending
        };

        let record = update_job(self.store.as_ref(), &update.id, |r| {
            r.set_phase_completed(index, update.completed);
            r.append_log(format!("Phase {} manually set to {}", key, state.as_str()));
            true
        })?;
        info!("Job {}: phase {} set to {}", record.id, key, state.as_str());
        Ok(record)
    }

    /// Re-queue a job and relaunch its pipeline.
    ///
    /// Refused while this process still runs a pipeline for the job.
    pub fn retry(&self, id: &str) -> Result<JobRecord, OrchestratorError> {
        let record = self.get_job(id)?;
        let guard = self.engine.claim(&record.id)?;

        let restart = self.config.retry_policy == RetryPolicy::Restart;
        let pipeline = self.pipeline;
        let first_label = pipeline.first().map(|p| p.label).unwrap_or_default();

        let record = update_job(self.store.as_ref(), &record.id, |r| {
            let label = if restart {
                first_label
            } else {
                r.phases
                    .iter()
                    .position(|p| p.state != PhaseState::Completed)
                    .and_then(|i| pipeline.get(i))
                    .map(|p| p.label)
                    .unwrap_or(first_label)
            };
            r.requeue(label, restart);
            r.append_log("Manual retry requested");
            true
        })?;

        metrics::JOB_RETRIES.inc();
        info!(
            "Retrying job {} ({})",
            record.id,
            if restart { "restart" } else { "resume" }
        );
        self.engine.spawn(guard);
        Ok(record)
    }

    /// Start the background staleness sweep, if configured.
    pub async fn start(&self) {
        let Some(interval_secs) = self.config.stale_sweep_interval_secs else {
            info!("Staleness sweep disabled; stale jobs are detected on read");
            return;
        };
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        info!("Starting staleness sweep every {}s", interval_secs);
        self.spawn_sweep_loop(interval_secs);
    }

    /// Stop the background sweep.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping job orchestrator");
        let _ = self.shutdown_tx.send(());
    }

    /// Get current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let active_job_ids = self.engine.active_ids();
        OrchestratorStatus {
            active_jobs: active_job_ids.len(),
            active_job_ids,
            sweep_enabled: self.config.stale_sweep_interval_secs.is_some(),
            sweep_running: self.running.load(Ordering::Relaxed),
        }
    }

    fn spawn_sweep_loop(&self, interval_secs: u64) {
        let running = Arc::clone(&self.running);
        let staleness = self.staleness.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Staleness sweep loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Staleness sweep loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(interval_secs)) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        match staleness.sweep() {
                            Ok(0) => {}
                            Ok(n) => info!("Staleness sweep failed {} job(s)", n),
                            Err(e) => warn!("Staleness sweep error: {}", e),
                        }
                    }
                }
            }
            info!("Staleness sweep loop stopped");
        });
    }
}
