//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the generator and notifier
//! traits, so pipelines can run end to end without external processes.
//!
//! # Example
//!
//! ```rust,ignore
//! use offerline_core::testing::{fixtures, MockStepInvoker, RecordingNotifier};
//!
//! let invoker = MockStepInvoker::new().with_all_phases();
//! let notifier = RecordingNotifier::new();
//!
//! // Build a JobOrchestrator with them, submit a job...
//! let record = fixtures::wait_for_job(&orchestrator, "Teste").await;
//! assert_eq!(record.status.progress_percent, 100);
//! ```

mod mock_invoker;
mod mock_notifier;

pub use mock_invoker::MockStepInvoker;
pub use mock_notifier::RecordingNotifier;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;
    use std::time::Duration;

    use chrono::Utc;

    use crate::job::{JobRecord, PhaseDefinition, STANDARD_PIPELINE};
    use crate::orchestrator::JobOrchestrator;

    /// Create a fresh job record on the standard pipeline.
    pub fn job_record(name: &str, idea_text: &str) -> JobRecord {
        JobRecord::new(name, idea_text, STANDARD_PIPELINE)
    }

    /// Create a running job record last updated `minutes` ago.
    pub fn aged_job_record(name: &str, minutes: i64) -> JobRecord {
        let mut record = job_record(name, "");
        record.created_at = Utc::now() - chrono::Duration::minutes(minutes);
        record.updated_at = record.created_at;
        record
    }

    /// Write one raw JSON artifact per phase, as the generator would.
    pub fn write_generator_output(dir: &Path, pipeline: &[PhaseDefinition]) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        for phase in pipeline {
            let mut body = serde_json::Map::new();
            body.insert("phase".to_string(), serde_json::json!(phase.key));
            if let Some(rule) = phase.metric {
                body.insert(rule.array_field.to_string(), serde_json::json!(["a", "b", "c"]));
            }
            let body = serde_json::Value::Object(body);
            std::fs::write(dir.join(phase.raw_artifact), body.to_string())?;
        }
        Ok(())
    }

    /// Poll a job until its pipeline stops running (10 s at most).
    pub async fn wait_for_job(orchestrator: &JobOrchestrator, id: &str) -> JobRecord {
        for _ in 0..200 {
            if let Ok(record) = orchestrator.get_job(id) {
                if !record.status.running {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("job {} did not finish in time", id);
    }

    /// Poll until the orchestrator has no live pipeline for `id` (10 s at most).
    pub async fn wait_until_idle(orchestrator: &JobOrchestrator, id: &str) {
        for _ in 0..200 {
            if !orchestrator.status().await.active_job_ids.iter().any(|a| a == id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("job {} still active", id);
    }
}
