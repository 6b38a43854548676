//! Mock step invoker for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::generator::{
    render_document, GenerationOutput, GenerationRequest, GeneratorError, StepInvoker,
};
use crate::job::{PhaseDefinition, STANDARD_PIPELINE};

/// Mock implementation of the StepInvoker trait.
///
/// Provides controllable behavior for testing:
/// - Choose which phases get a document
/// - Inject a one-shot failure
/// - Simulate a slow generator
/// - Track requests for assertions
///
/// Documents are written for real under the request's project directory, so
/// the engine's existence checks see them.
///
/// # Example
///
/// ```rust,ignore
/// use offerline_core::testing::MockStepInvoker;
///
/// let invoker = MockStepInvoker::new()
///     .with_phases(&["1-research", "2-avatar"])
///     .with_metric("pain_points_identified", 15);
///
/// // ... run a job ...
///
/// assert_eq!(invoker.invocation_count().await, 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockStepInvoker {
    pipeline: &'static [PhaseDefinition],
    /// Phase keys that get a document.
    phases: Arc<RwLock<Vec<String>>>,
    metrics: Arc<RwLock<BTreeMap<String, u64>>>,
    /// If set, the next invocation fails with this error.
    next_error: Arc<RwLock<Option<GeneratorError>>>,
    delay_ms: Arc<RwLock<u64>>,
    requests: Arc<RwLock<Vec<GenerationRequest>>>,
}

impl Default for MockStepInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStepInvoker {
    /// Create a mock that produces no documents.
    pub fn new() -> Self {
        Self {
            pipeline: STANDARD_PIPELINE,
            phases: Arc::new(RwLock::new(Vec::new())),
            metrics: Arc::new(RwLock::new(BTreeMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay_ms: Arc::new(RwLock::new(0)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Produce a document for every phase of the pipeline.
    pub fn with_all_phases(self) -> Self {
        let keys: Vec<&str> = self.pipeline.iter().map(|p| p.key).collect();
        self.with_phases(&keys)
    }

    /// Produce documents only for these phase keys.
    pub fn with_phases(self, keys: &[&str]) -> Self {
        Self {
            phases: Arc::new(RwLock::new(keys.iter().map(|k| k.to_string()).collect())),
            ..self
        }
    }

    pub fn with_metric(self, name: &str, value: u64) -> Self {
        let mut metrics = BTreeMap::new();
        metrics.insert(name.to_string(), value);
        Self {
            metrics: Arc::new(RwLock::new(metrics)),
            ..self
        }
    }

    /// Fail the first invocation with `error`.
    pub fn with_error(self, error: GeneratorError) -> Self {
        Self {
            next_error: Arc::new(RwLock::new(Some(error))),
            ..self
        }
    }

    /// Sleep this long inside every invocation.
    pub fn with_delay(self, delay_ms: u64) -> Self {
        Self {
            delay_ms: Arc::new(RwLock::new(delay_ms)),
            ..self
        }
    }

    /// Replace the phases that get a document.
    pub async fn set_phases(&self, keys: &[&str]) {
        *self.phases.write().await = keys.iter().map(|k| k.to_string()).collect();
    }

    /// Make the next invocation fail.
    pub async fn set_next_error(&self, error: GeneratorError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn set_delay(&self, delay_ms: u64) {
        *self.delay_ms.write().await = delay_ms;
    }

    /// Get all recorded requests.
    pub async fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.requests.read().await.clone()
    }

    /// Get the number of invocations performed.
    pub async fn invocation_count(&self) -> usize {
        self.requests.read().await.len()
    }
}

#[async_trait]
impl StepInvoker for MockStepInvoker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<GenerationOutput, GeneratorError> {
        self.requests.write().await.push(request.clone());

        let delay = *self.delay_ms.read().await;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let phases = self.phases.read().await.clone();
        let mut artifacts = HashMap::new();
        for phase in self.pipeline.iter().filter(|p| phases.iter().any(|k| k == p.key)) {
            let dir = request.project_dir.join(phase.dir);
            tokio::fs::create_dir_all(&dir).await?;
            let path = dir.join(phase.document);
            let body = serde_json::json!({ "phase": phase.key, "topic": request.topic });
            tokio::fs::write(&path, render_document(phase.title, &body, chrono::Utc::now())).await?;
            artifacts.insert(phase.key.to_string(), path);
        }

        Ok(GenerationOutput {
            output_dir: request.project_dir.join("generator-output"),
            artifacts,
            metrics: self.metrics.read().await.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(dir: &TempDir) -> GenerationRequest {
        GenerationRequest {
            job_id: "job".to_string(),
            topic: "yoga".to_string(),
            product_type: "curso_online".to_string(),
            project_dir: dir.path().to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_writes_selected_documents() {
        let dir = TempDir::new().unwrap();
        let invoker = MockStepInvoker::new()
            .with_phases(&["1-research", "6-copy"])
            .with_metric("headlines_created", 4);

        let output = invoker.invoke(&request(&dir)).await.unwrap();
        assert_eq!(output.artifacts.len(), 2);
        assert!(output.artifacts["6-copy"].exists());
        assert_eq!(output.metrics["headlines_created"], 4);
        assert_eq!(invoker.invocation_count().await, 1);
    }

    #[tokio::test]
    async fn test_error_is_one_shot() {
        let dir = TempDir::new().unwrap();
        let invoker = MockStepInvoker::new().with_error(GeneratorError::MissingOutputDir);

        assert!(invoker.invoke(&request(&dir)).await.is_err());
        assert!(invoker.invoke(&request(&dir)).await.is_ok());
        assert_eq!(invoker.recorded_requests().await.len(), 2);
    }
}
