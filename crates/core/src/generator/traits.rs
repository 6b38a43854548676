//! Trait definitions for the generator module.

use async_trait::async_trait;

use super::error::GeneratorError;
use super::types::{GenerationOutput, GenerationRequest};

/// Produces the artifacts of every phase of a job.
///
/// Called once per pipeline run, when the first phase starts.
#[async_trait]
pub trait StepInvoker: Send + Sync {
    /// Returns the name of this invoker implementation.
    fn name(&self) -> &str;

    async fn invoke(&self, request: &GenerationRequest) -> Result<GenerationOutput, GeneratorError>;
}
