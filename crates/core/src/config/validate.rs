use super::{
    types::{Config, StorageBackend},
    ConfigError,
};

/// Longest accepted stale timeout: one year.
const MAX_STALE_TIMEOUT_MINUTES: u64 = 60 * 24 * 365;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Timeouts and intervals are not 0, the stale timeout is bounded
/// - Generator and companion programs are set
/// - The sqlite backend has a database path
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    fn invalid(message: &str) -> Result<(), ConfigError> {
        Err(ConfigError::ValidationError(message.to_string()))
    }

    // Server validation
    if config.server.port == 0 {
        return invalid("server.port cannot be 0");
    }

    // Storage validation
    if config.storage.output_dir.as_os_str().is_empty() {
        return invalid("storage.output_dir cannot be empty");
    }
    if config.storage.backend == StorageBackend::Sqlite && config.storage.database_path.is_none()
    {
        return invalid("storage.database_path is required for the sqlite backend");
    }

    // Orchestrator validation
    if config.orchestrator.stale_timeout_minutes == 0 {
        return invalid("orchestrator.stale_timeout_minutes cannot be 0");
    }
    if config.orchestrator.stale_timeout_minutes > MAX_STALE_TIMEOUT_MINUTES {
        return Err(ConfigError::ValidationError(format!(
            "orchestrator.stale_timeout_minutes cannot exceed {}",
            MAX_STALE_TIMEOUT_MINUTES
        )));
    }
    if config.orchestrator.stale_sweep_interval_secs == Some(0) {
        return invalid("orchestrator.stale_sweep_interval_secs cannot be 0");
    }

    // Generator validation
    if config.generator.program.trim().is_empty() {
        return invalid("generator.program cannot be empty");
    }
    if config.generator.timeout_secs == 0 {
        return invalid("generator.timeout_secs cannot be 0");
    }

    // Companion validation
    if config.companion.enabled && config.companion.program.trim().is_empty() {
        return invalid("companion.program cannot be empty when the companion is enabled");
    }

    Ok(())
}
