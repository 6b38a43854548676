use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::generator::GeneratorConfig;
use crate::notifier::CompanionConfig;
use crate::orchestrator::{OrchestratorConfig, RetryPolicy};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub companion: CompanionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Where job records live.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// One `job.json` per job directory under `output_dir`.
    #[default]
    Fs,
    /// SQLite database at `database_path`.
    Sqlite,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root of the per-job directories (records for the `fs` backend, artifacts always).
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Database file, required by the `sqlite` backend.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            output_dir: default_output_dir(),
            database_path: None,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("projects/offers/outputs")
}

/// Sanitized config for API responses (command lines hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub orchestrator: SanitizedOrchestratorConfig,
    pub generator: SanitizedGeneratorConfig,
    pub companion: SanitizedCompanionConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedOrchestratorConfig {
    pub start_delay_ms: u64,
    pub stale_timeout_minutes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_sweep_interval_secs: Option<u64>,
    pub retry_policy: RetryPolicy,
}

/// Generator settings without its argument list, which may carry credentials.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGeneratorConfig {
    pub program: String,
    pub args_configured: usize,
    pub product_type: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCompanionConfig {
    pub enabled: bool,
    pub program: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            storage: config.storage.clone(),
            orchestrator: SanitizedOrchestratorConfig {
                start_delay_ms: config.orchestrator.start_delay_ms,
                stale_timeout_minutes: config.orchestrator.stale_timeout_minutes,
                stale_sweep_interval_secs: config.orchestrator.stale_sweep_interval_secs,
                retry_policy: config.orchestrator.retry_policy,
            },
            generator: SanitizedGeneratorConfig {
                program: config.generator.program.clone(),
                args_configured: config.generator.args.len(),
                product_type: config.generator.product_type.clone(),
                timeout_secs: config.generator.timeout_secs,
            },
            companion: SanitizedCompanionConfig {
                enabled: config.companion.enabled,
                program: config.companion.program.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_server_section() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(
            config.storage.output_dir.to_str().unwrap(),
            "projects/offers/outputs"
        );
        assert!(config.storage.database_path.is_none());
        assert!(!config.companion.enabled);
    }

    #[test]
    fn test_deserialize_sqlite_storage() {
        let toml = r#"
[storage]
backend = "sqlite"
output_dir = "/data/outputs"
database_path = "/data/offerline.db"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(
            config.storage.database_path.as_deref().unwrap().to_str().unwrap(),
            "/data/offerline.db"
        );
    }

    #[test]
    fn test_deserialize_unknown_backend_fails() {
        let toml = r#"
[storage]
backend = "redis"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitized_config_hides_args() {
        let mut config = Config::default();
        config.generator.args = vec!["--api-key=secret".to_string()];
        config.companion.enabled = true;

        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.generator.args_configured, 1);
        assert!(sanitized.companion.enabled);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
    }
}
