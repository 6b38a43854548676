//! Configuration for the external generator process.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to launch the content generator.
///
/// `args` may contain the placeholders `{topic}` and `{product_type}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Directory the generator runs in; relative output paths resolve against it.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    #[serde(default = "default_product_type")]
    pub product_type: String,

    /// Wall-clock limit for one generator run, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_program() -> String {
    "node".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "scripts/copy-generator.js".to_string(),
        "--tema={topic}".to_string(),
        "--produto={product_type}".to_string(),
    ]
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_product_type() -> String {
    "curso_online".to_string()
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            working_dir: default_working_dir(),
            product_type: default_product_type(),
            timeout_secs: default_timeout(),
        }
    }
}

impl GeneratorConfig {
    /// Arguments with the placeholders filled in.
    pub fn render_args(&self, topic: &str, product_type: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{topic}", topic)
                    .replace("{product_type}", product_type)
            })
            .collect()
    }
}
