pub mod config;
pub mod generator;
pub mod job;
pub mod metrics;
pub mod notifier;
pub mod orchestrator;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    StorageBackend,
};
pub use generator::{
    GenerationOutput, GenerationRequest, GeneratorConfig, GeneratorError, ProcessStepInvoker,
    StepInvoker,
};
pub use job::{
    update_job, ArtifactLayout, FsJobStore, JobError, JobRecord, JobStore, PhaseDefinition,
    PhaseState, SqliteJobStore, STANDARD_PIPELINE,
};
pub use notifier::{create_notifier, CompanionConfig, CompanionNotifier, NoopNotifier};
pub use orchestrator::{
    CreateJobRequest, JobOrchestrator, OrchestratorConfig, OrchestratorError,
    OrchestratorStatus, PhaseUpdate, RetryPolicy,
};
