//! Pipeline lifecycle integration tests.
//!
//! These tests run jobs end to end through the orchestrator with a mock
//! step invoker (and, for the generator contract, a real shell process):
//! - Submission and the initial queued state
//! - Successful completion of every phase
//! - Generator failures and missing artifacts
//! - Companion notification on completion

use std::sync::Arc;

use tempfile::TempDir;

use offerline_core::{
    generator::GeneratorConfig,
    job::{update_job, JobRecord, PhaseState},
    orchestrator::{COMPLETED_MESSAGE, COMPLETED_NEXT_LABEL, FAILED_MESSAGE, FAILED_NEXT_LABEL},
    testing::{fixtures, MockStepInvoker, RecordingNotifier},
    ArtifactLayout, CreateJobRequest, FsJobStore, GeneratorError, JobOrchestrator, JobStore,
    OrchestratorConfig, ProcessStepInvoker, StepInvoker, STANDARD_PIPELINE,
};

/// Test helper to create an orchestrator over a temporary output directory.
struct TestHarness {
    orchestrator: JobOrchestrator,
    store: Arc<dyn JobStore>,
    notifier: RecordingNotifier,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new(invoker: Arc<dyn StepInvoker>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let output_dir = temp_dir.path().join("outputs");
        let store: Arc<dyn JobStore> =
            Arc::new(FsJobStore::new(&output_dir).expect("Failed to create job store"));
        let notifier = RecordingNotifier::new();

        let config = OrchestratorConfig {
            start_delay_ms: 10,
            ..Default::default()
        };
        let orchestrator = JobOrchestrator::new(
            config,
            Arc::clone(&store),
            invoker,
            Arc::new(notifier.clone()),
            ArtifactLayout::new(&output_dir),
            STANDARD_PIPELINE,
            "curso_online",
        );

        Self {
            orchestrator,
            store,
            notifier,
            temp_dir,
        }
    }

    fn submit(&self, name: &str, idea_text: &str) -> String {
        self.orchestrator
            .create_job(CreateJobRequest {
                name: name.to_string(),
                idea_text: idea_text.to_string(),
            })
            .expect("Failed to create job")
            .id
    }

    /// Stop a running job from outside the engine, as another writer would.
    fn cancel(&self, id: &str) -> JobRecord {
        update_job(self.store.as_ref(), id, |r| {
            r.status.running = false;
            r.append_log("Stopped by operator");
            true
        })
        .expect("Failed to stop job")
    }

    /// Submit a job, stop it while the generator is still running and
    /// return the record as it was right after the stop.
    async fn cancel_during_generation(&self) -> (String, JobRecord) {
        let id = self.submit("Teste", "curso de yoga");
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        let cancelled = self.cancel(&id);
        fixtures::wait_until_idle(&self.orchestrator, &id).await;
        (id, cancelled)
    }
}

#[tokio::test]
async fn test_new_job_is_listed_as_queued() {
    let invoker = MockStepInvoker::new().with_all_phases().with_delay(500);
    let harness = TestHarness::new(Arc::new(invoker));

    harness.submit("Teste", "curso de yoga");

    let jobs = harness.orchestrator.list_jobs().unwrap();
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.id, "Teste");
    assert!(job.status.running);
    assert_eq!(job.status.progress_percent, 0);
    assert_eq!(job.status.phase_index, 0);
    assert!(job.status.error.is_none());
}

#[tokio::test]
async fn test_pipeline_completes_all_phases() {
    let invoker = MockStepInvoker::new()
        .with_all_phases()
        .with_metric("pain_points_identified", 15);
    let harness = TestHarness::new(Arc::new(invoker.clone()));

    let id = harness.submit("Teste", "curso de yoga");
    let job = fixtures::wait_for_job(&harness.orchestrator, &id).await;

    assert!(!job.status.running);
    assert_eq!(job.status.progress_percent, 100);
    assert!(job.status.error.is_none());
    assert_eq!(job.status.phase_index, STANDARD_PIPELINE.len());
    assert_eq!(job.status.message, COMPLETED_MESSAGE);
    assert_eq!(job.status.next_label, COMPLETED_NEXT_LABEL);
    assert!(job.phases.iter().all(|p| p.state == PhaseState::Completed));
    assert!(job
        .phases
        .iter()
        .all(|p| p.artifact_path.as_deref().is_some_and(|a| std::path::Path::new(a).exists())));
    assert_eq!(job.metrics.get("pain_points_identified"), Some(&15));

    // The generator runs once, with the idea text as topic.
    let requests = invoker.recorded_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].topic, "curso de yoga");
    assert_eq!(requests[0].product_type, "curso_online");

    fixtures::wait_until_idle(&harness.orchestrator, &id).await;
    assert_eq!(harness.notifier.notified(), vec!["Teste".to_string()]);
    let job = harness.store.load(&id).unwrap();
    let messages: Vec<_> = job.status.logs.iter().map(|l| l.message.as_str()).collect();
    let notified = messages.iter().position(|m| *m == "Companion notified");
    let completed = messages.iter().position(|m| *m == COMPLETED_MESSAGE);
    assert!(notified.is_some() && notified < completed, "logs: {messages:?}");
}

#[tokio::test]
async fn test_stop_during_generation_without_artifacts() {
    let invoker = MockStepInvoker::new()
        .with_phases(&["2-avatar"])
        .with_delay(500);
    let harness = TestHarness::new(Arc::new(invoker));

    let (id, cancelled) = harness.cancel_during_generation().await;

    let after = harness.store.load(&id).unwrap();
    assert!(!after.status.running);
    assert!(after.status.error.is_none(), "error: {:?}", after.status.error);
    assert_ne!(after.status.message, FAILED_MESSAGE);
    assert_eq!(after.version, cancelled.version);
    assert_eq!(after.phases, cancelled.phases);
}

#[tokio::test]
async fn test_stop_during_generation_with_artifacts() {
    let invoker = MockStepInvoker::new().with_all_phases().with_delay(500);
    let harness = TestHarness::new(Arc::new(invoker));

    let (id, cancelled) = harness.cancel_during_generation().await;

    let after = harness.store.load(&id).unwrap();
    assert_eq!(after.version, cancelled.version);
    assert_eq!(after.phases, cancelled.phases);
    assert!(after.status.error.is_none());
    assert_eq!(after.completed_phases(), 0);
    assert!(after.metrics.is_empty());
    assert!(harness.notifier.notified().is_empty());
}

#[tokio::test]
async fn test_generator_error_after_stop_is_not_recorded() {
    let invoker = MockStepInvoker::new()
        .with_error(GeneratorError::Timeout { timeout_secs: 300 })
        .with_delay(500);
    let harness = TestHarness::new(Arc::new(invoker));

    let (id, cancelled) = harness.cancel_during_generation().await;

    let after = harness.store.load(&id).unwrap();
    assert!(after.status.error.is_none());
    assert_eq!(after.version, cancelled.version);
    assert_eq!(after.phases, cancelled.phases);
}

#[tokio::test]
async fn test_missing_artifact_fails_at_that_phase() {
    let invoker = MockStepInvoker::new().with_phases(&["1-research", "2-avatar"]);
    let harness = TestHarness::new(Arc::new(invoker));

    let id = harness.submit("Teste", "curso de yoga");
    let job = fixtures::wait_for_job(&harness.orchestrator, &id).await;

    assert!(!job.status.running);
    let error = job.status.error.as_deref().unwrap();
    assert!(error.contains("3-market"), "unexpected error: {error}");
    assert_eq!(job.status.message, FAILED_MESSAGE);
    assert_eq!(job.status.next_label, FAILED_NEXT_LABEL);

    assert_eq!(job.phases[0].state, PhaseState::Completed);
    assert_eq!(job.phases[1].state, PhaseState::Completed);
    assert!(job.phases[2..].iter().all(|p| p.state == PhaseState::Pending));
    assert_eq!(job.status.progress_percent, 29);
    assert!(job
        .status
        .logs
        .iter()
        .any(|l| l.message.starts_with("Pipeline error:")));
    assert!(harness.notifier.notified().is_empty());
}

#[tokio::test]
async fn test_generator_failure_is_recorded() {
    let invoker = MockStepInvoker::new().with_error(GeneratorError::Timeout { timeout_secs: 300 });
    let harness = TestHarness::new(Arc::new(invoker));

    let id = harness.submit("Teste", "");
    let job = fixtures::wait_for_job(&harness.orchestrator, &id).await;

    assert!(!job.status.running);
    assert!(job.status.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(job.active_phase(), None);
    assert_eq!(job.completed_phases(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_generator_without_output_line_fails_job() {
    let work_dir = TempDir::new().unwrap();
    let config = GeneratorConfig {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), "echo 'generated nothing'".to_string()],
        working_dir: work_dir.path().to_path_buf(),
        ..Default::default()
    };
    let harness = TestHarness::new(Arc::new(ProcessStepInvoker::new(config, STANDARD_PIPELINE)));

    let id = harness.submit("Teste", "curso de yoga");
    let job = fixtures::wait_for_job(&harness.orchestrator, &id).await;

    assert!(!job.status.running);
    assert!(job
        .status
        .error
        .as_deref()
        .unwrap()
        .contains("did not return an output directory"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_process_generator_end_to_end() {
    let work_dir = TempDir::new().unwrap();
    fixtures::write_generator_output(&work_dir.path().join("run-1"), STANDARD_PIPELINE).unwrap();

    let config = GeneratorConfig {
        program: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            "echo \"topic=$0 product=$1\"; echo 'Output: run-1'".to_string(),
            "{topic}".to_string(),
            "{product_type}".to_string(),
        ],
        working_dir: work_dir.path().to_path_buf(),
        ..Default::default()
    };
    let harness = TestHarness::new(Arc::new(ProcessStepInvoker::new(config, STANDARD_PIPELINE)));

    let id = harness.submit("Teste", "curso de yoga");
    let job = fixtures::wait_for_job(&harness.orchestrator, &id).await;

    assert!(job.status.error.is_none(), "error: {:?}", job.status.error);
    assert_eq!(job.status.progress_percent, 100);
    assert_eq!(job.metrics.get("pain_points_identified"), Some(&3));
    assert_eq!(job.metrics.get("headlines_created"), Some(&3));

    let document = harness
        .temp_dir
        .path()
        .join("outputs/Teste/02-avatar/avatar_problems.md");
    let content = std::fs::read_to_string(document).unwrap();
    assert!(content.starts_with("# Avatar Problems\n"));
    assert!(content.contains("```json"));
}

#[tokio::test]
async fn test_record_persists_across_store_instances() {
    let invoker = MockStepInvoker::new().with_all_phases();
    let harness = TestHarness::new(Arc::new(invoker));

    let id = harness.submit("Curso de Yoga", "");
    fixtures::wait_for_job(&harness.orchestrator, &id).await;

    let reopened = FsJobStore::new(harness.temp_dir.path().join("outputs")).unwrap();
    let record = reopened.load("Curso_de_Yoga").unwrap();
    assert_eq!(record.name, "Curso de Yoga");
    assert_eq!(record.status.progress_percent, 100);
    assert_eq!(harness.store.list().unwrap().len(), 1);
}
