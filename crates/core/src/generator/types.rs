//! Request and result types for the step invoker.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Input of one generator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub job_id: String,
    pub topic: String,
    pub product_type: String,
    /// Project directory prepared by `ArtifactLayout`.
    pub project_dir: PathBuf,
}

/// Result of one generator run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOutput {
    /// Directory the generator reported on stdout.
    pub output_dir: PathBuf,
    /// Rendered document per phase key. Phases without a raw artifact are absent.
    pub artifacts: HashMap<String, PathBuf>,
    /// Numeric facts extracted from the artifacts.
    pub metrics: BTreeMap<String, u64>,
}
