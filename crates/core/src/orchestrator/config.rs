//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// What a retry does with phases that already completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Discard all phase progress and run the whole pipeline again.
    #[default]
    Restart,
    /// Keep completed phases and continue from the first one that is not.
    Resume,
}

/// Configuration for the job orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Delay between accepting a job and starting its pipeline (milliseconds).
    #[serde(default = "default_start_delay")]
    pub start_delay_ms: u64,

    /// A running job whose record has not been updated for this long is failed.
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout_minutes: u64,

    /// When set, a background task reconciles stale jobs at this interval.
    /// Otherwise staleness is only detected when a job is read.
    #[serde(default)]
    pub stale_sweep_interval_secs: Option<u64>,

    #[serde(default)]
    pub retry_policy: RetryPolicy,
}

fn default_start_delay() -> u64 {
    120
}

fn default_stale_timeout() -> u64 {
    20
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: default_start_delay(),
            stale_timeout_minutes: default_stale_timeout(),
            stale_sweep_interval_secs: None,
            retry_policy: RetryPolicy::default(),
        }
    }
}
