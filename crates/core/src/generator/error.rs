//! Error types for the generator module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running the generator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The generator process could not be started.
    #[error("failed to start generator '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The generator ran past its time limit and was killed.
    #[error("generator timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The generator exited unsuccessfully.
    #[error("generator exited with code {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    /// No `Output: <dir>` line on stdout.
    #[error("generator did not return an output directory")]
    MissingOutputDir,

    /// The reported output directory does not exist.
    #[error("generator output directory not found: {path}")]
    OutputDirNotFound { path: PathBuf },

    /// A raw artifact could not be parsed.
    #[error("invalid artifact {path}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeneratorError {
    /// Short label used for the `result` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn",
            Self::Timeout { .. } => "timeout",
            Self::ExitStatus { .. } => "exit_status",
            Self::MissingOutputDir => "missing_output_dir",
            Self::OutputDirNotFound { .. } => "output_dir_not_found",
            Self::InvalidArtifact { .. } => "invalid_artifact",
            Self::Io(_) => "io",
        }
    }
}
