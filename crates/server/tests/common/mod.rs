//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in process
//! with a mock step invoker, so job lifecycles run without spawning the
//! real generator.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use offerline_core::{
    testing::{MockStepInvoker, RecordingNotifier},
    ArtifactLayout, Config, FsJobStore, JobOrchestrator, JobStore, OrchestratorConfig,
    STANDARD_PIPELINE,
};
use offerline_server::state::AppState;

/// Re-export fixtures for test convenience
pub use offerline_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_job_creation() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/jobs", json!({ "name": "Teste" })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock step invoker - configure produced artifacts
    pub invoker: MockStepInvoker,
    /// Orchestrator behind the router
    pub orchestrator: Arc<JobOrchestrator>,
    /// Temporary directory holding the output tree
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture whose generator produces every phase.
    pub async fn new() -> Self {
        Self::with_invoker(MockStepInvoker::new().with_all_phases()).await
    }

    /// Create a fixture around a configured mock invoker.
    pub async fn with_invoker(invoker: MockStepInvoker) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let output_dir = temp_dir.path().join("outputs");

        let mut config = Config::default();
        config.storage.output_dir = output_dir.clone();
        config.orchestrator = OrchestratorConfig {
            start_delay_ms: 10,
            ..Default::default()
        };

        let store: Arc<dyn JobStore> =
            Arc::new(FsJobStore::new(&output_dir).expect("Failed to create job store"));
        let orchestrator = Arc::new(JobOrchestrator::new(
            config.orchestrator.clone(),
            store,
            Arc::new(invoker.clone()),
            Arc::new(RecordingNotifier::new()),
            ArtifactLayout::new(&output_dir),
            STANDARD_PIPELINE,
            config.generator.product_type.clone(),
        ));

        let state = Arc::new(AppState::new(config, Arc::clone(&orchestrator)));
        let router = offerline_server::api::create_router(state);

        Self {
            router,
            invoker,
            orchestrator,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PATCH request with JSON body.
    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request("PATCH", path, Some(body)).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&body_bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// Wait until the job's pipeline has finished and released its task.
    pub async fn wait_for_job(&self, id: &str) -> offerline_core::JobRecord {
        let record = fixtures::wait_for_job(&self.orchestrator, id).await;
        fixtures::wait_until_idle(&self.orchestrator, id).await;
        record
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
