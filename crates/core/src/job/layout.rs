//! On-disk layout of per-job artifact directories.

use std::path::{Path, PathBuf};

use super::PhaseDefinition;

/// Owns the output root where every job gets `<root>/<id>/<phase dir>/`.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding everything produced for one job.
    pub fn project_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Directory where one phase's document lands.
    pub fn phase_dir(&self, id: &str, phase: &PhaseDefinition) -> PathBuf {
        self.project_dir(id).join(phase.dir)
    }

    /// Create the project directory and one subdirectory per phase.
    pub fn prepare(&self, id: &str, pipeline: &[PhaseDefinition]) -> std::io::Result<PathBuf> {
        let project_dir = self.project_dir(id);
        std::fs::create_dir_all(&project_dir)?;
        for phase in pipeline {
            std::fs::create_dir_all(project_dir.join(phase.dir))?;
        }
        Ok(project_dir)
    }
}
