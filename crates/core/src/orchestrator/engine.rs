//! Runs the phases of one job in the background.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::{OrchestratorConfig, RetryPolicy};
use super::types::OrchestratorError;
use crate::generator::{GenerationOutput, GenerationRequest, StepInvoker};
use crate::job::{update_job, ArtifactLayout, JobStore, PhaseDefinition, PhaseState};
use crate::metrics;
use crate::notifier::CompanionNotifier;

pub const COMPLETED_MESSAGE: &str = "Pipeline completed";
pub const COMPLETED_NEXT_LABEL: &str = "Ready for review";
pub const FAILED_MESSAGE: &str = "Pipeline failed";
pub const FAILED_NEXT_LABEL: &str = "Reprocess";
const FINISHING_LABEL: &str = "Finishing";

/// How a pipeline run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// The job stopped running while its pipeline was in flight.
    Stopped,
}

/// Marks a job as having a live pipeline task; released on drop.
pub struct ActiveGuard {
    id: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl ActiveGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        lock_set(&self.active).remove(&self.id);
    }
}

fn lock_set(set: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drives jobs through the pipeline, one detached task per job.
#[derive(Clone)]
pub struct PipelineEngine {
    config: OrchestratorConfig,
    store: Arc<dyn JobStore>,
    invoker: Arc<dyn StepInvoker>,
    notifier: Arc<dyn CompanionNotifier>,
    layout: ArtifactLayout,
    pipeline: &'static [PhaseDefinition],
    product_type: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl PipelineEngine {
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn JobStore>,
        invoker: Arc<dyn StepInvoker>,
        notifier: Arc<dyn CompanionNotifier>,
        layout: ArtifactLayout,
        pipeline: &'static [PhaseDefinition],
        product_type: impl Into<String>,
    ) -> Self {
        Self {
            config,
            store,
            invoker,
            notifier,
            layout,
            pipeline,
            product_type: product_type.into(),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Reserve `id` for a new run. Fails if a run is already in flight.
    pub fn claim(&self, id: &str) -> Result<ActiveGuard, OrchestratorError> {
        let mut active = lock_set(&self.active);
        if !active.insert(id.to_string()) {
            return Err(OrchestratorError::AlreadyRunning(id.to_string()));
        }
        Ok(ActiveGuard {
            id: id.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    /// Whether `id` has a live run in this process.
    pub fn is_active(&self, id: &str) -> bool {
        lock_set(&self.active).contains(id)
    }

    /// Ids with a live run, sorted.
    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = lock_set(&self.active).iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Spawn the pipeline of a claimed job.
    pub fn spawn(&self, guard: ActiveGuard) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let id = guard.id().to_string();
            engine.run(&id).await;
            drop(guard);
        })
    }

    /// Claim and spawn in one step.
    pub fn launch(&self, id: &str) -> Result<JoinHandle<()>, OrchestratorError> {
        let guard = self.claim(id)?;
        Ok(self.spawn(guard))
    }

    /// Run the pipeline of `id` and record the outcome in its record.
    pub async fn run(&self, id: &str) {
        tokio::time::sleep(Duration::from_millis(self.config.start_delay_ms)).await;
        info!("Pipeline started for job {}", id);

        match self.run_phases(id).await {
            Ok(RunOutcome::Completed) => {
                info!("Pipeline completed for job {}", id);
                metrics::JOBS_COMPLETED.inc();
            }
            Ok(RunOutcome::Stopped) => {
                info!("Pipeline for job {} stopped before completion", id);
            }
            Err(e) => self.record_failure(id, &e),
        }
    }

    async fn run_phases(&self, id: &str) -> Result<RunOutcome, OrchestratorError> {
        let store = self.store.as_ref();
        let resume = self.config.retry_policy == RetryPolicy::Resume;
        let mut generated: Option<GenerationOutput> = None;

        for (index, phase) in self.pipeline.iter().enumerate() {
            let next_label = self
                .pipeline
                .get(index + 1)
                .map(|p| p.label)
                .unwrap_or(FINISHING_LABEL);

            let mut stopped = false;
            let mut skipped = false;
            let record = update_job(store, id, |r| {
                stopped = !r.status.running;
                skipped = resume
                    && r.phases.get(index).map(|p| p.state) == Some(PhaseState::Completed);
                if stopped || skipped {
                    return false;
                }
                r.activate_phase(index, phase.running_message, next_label);
                r.append_log(format!("Phase {} started", phase.key));
                true
            })?;
            if stopped {
                return Ok(RunOutcome::Stopped);
            }
            if skipped {
                debug!("Job {}: phase {} already completed, skipping", id, phase.key);
                continue;
            }

            if generated.is_none() {
                let output = match self.generate(id, record.topic()).await {
                    Ok(output) => output,
                    Err(e) if !self.still_running(id) => {
                        debug!("Job {}: generator error after stop ignored: {}", id, e);
                        return Ok(RunOutcome::Stopped);
                    }
                    Err(e) => return Err(e),
                };
                let mut stopped = false;
                update_job(store, id, |r| {
                    stopped = !r.status.running;
                    if stopped {
                        return false;
                    }
                    r.append_log(format!("Generator output: {}", output.output_dir.display()));
                    for (name, value) in &output.metrics {
                        r.metrics.insert(name.clone(), *value);
                    }
                    true
                })?;
                if stopped {
                    return Ok(RunOutcome::Stopped);
                }
                generated = Some(output);
            }

            let missing = || OrchestratorError::StepArtifactMissing {
                phase: phase.key.to_string(),
            };
            let artifact = generated
                .as_ref()
                .and_then(|g| g.artifacts.get(phase.key))
                .cloned()
                .ok_or_else(missing)?;
            if !artifact_exists(&artifact).await {
                return Err(missing());
            }
            let artifact = artifact.to_string_lossy().into_owned();

            let mut stopped = false;
            update_job(store, id, |r| {
                stopped = !r.status.running;
                if stopped {
                    return false;
                }
                r.complete_phase(index, &artifact);
                r.append_log(format!("Phase {} completed: {}", phase.key, artifact));
                true
            })?;
            if stopped {
                return Ok(RunOutcome::Stopped);
            }
            debug!("Job {}: phase {} completed", id, phase.key);
        }

        let record = store.load(id)?;
        if !record.status.running {
            return Ok(RunOutcome::Stopped);
        }
        self.notifier.notify(&record);

        let mut stopped = false;
        update_job(store, id, |r| {
            stopped = !r.status.running;
            if stopped {
                return false;
            }
            r.append_log("Companion notified");
            r.mark_completed(COMPLETED_MESSAGE, COMPLETED_NEXT_LABEL);
            r.append_log(COMPLETED_MESSAGE);
            true
        })?;

        Ok(if stopped {
            RunOutcome::Stopped
        } else {
            RunOutcome::Completed
        })
    }

    async fn generate(&self, id: &str, topic: &str) -> Result<GenerationOutput, OrchestratorError> {
        let request = GenerationRequest {
            job_id: id.to_string(),
            topic: topic.to_string(),
            product_type: self.product_type.clone(),
            project_dir: self.layout.project_dir(id),
        };

        let start = Instant::now();
        let result = self.invoker.invoke(&request).await;
        let label = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::GENERATOR_DURATION
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());

        let output = result?;
        info!(
            "Generator ({}) produced {} artifacts for job {}",
            self.invoker.name(),
            output.artifacts.len(),
            id
        );
        Ok(output)
    }

    /// Whether the record of `id` still says running; store errors count as running.
    fn still_running(&self, id: &str) -> bool {
        self.store
            .load(id)
            .map(|r| r.status.running)
            .unwrap_or(true)
    }

    fn record_failure(&self, id: &str, err: &OrchestratorError) {
        let message = err.to_string();
        let mut recorded = false;

        let result = update_job(self.store.as_ref(), id, |r| {
            recorded = r.status.running;
            if !recorded {
                return false;
            }
            r.mark_failed(&message, FAILED_MESSAGE, FAILED_NEXT_LABEL);
            r.append_log(format!("Pipeline error: {}", message));
            true
        });
        match result {
            Ok(_) if recorded => {
                warn!("Pipeline for job {} failed: {}", id, message);
                metrics::JOBS_FAILED.with_label_values(&[err.reason()]).inc();
            }
            Ok(_) => debug!("Job {} already stopped, error not recorded: {}", id, message),
            Err(e) => error!("Failed to persist failure of job {}: {}", id, e),
        }
    }
}

async fn artifact_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
