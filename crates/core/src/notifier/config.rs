//! Companion notifier configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Companion process launched once a pipeline completes.
///
/// `args` may contain the placeholder `{project}` (the job id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Script the program runs. When set and missing on disk, notifications are skipped.
    #[serde(default = "default_script")]
    pub script: Option<PathBuf>,

    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
}

fn default_program() -> String {
    "node".to_string()
}

fn default_args() -> Vec<String> {
    vec![
        "scripts/ops/mesa-mentes.js".to_string(),
        "--projeto={project}".to_string(),
    ]
}

fn default_script() -> Option<PathBuf> {
    Some(PathBuf::from("scripts/ops/mesa-mentes.js"))
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            program: default_program(),
            args: default_args(),
            script: default_script(),
            working_dir: default_working_dir(),
        }
    }
}

impl CompanionConfig {
    pub fn render_args(&self, project: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace("{project}", project))
            .collect()
    }

    /// Script path resolved against the working directory.
    pub fn script_path(&self) -> Option<PathBuf> {
        self.script.as_ref().map(|script| {
            if script.is_absolute() {
                script.clone()
            } else {
                self.working_dir.join(script)
            }
        })
    }
}
