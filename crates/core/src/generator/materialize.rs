//! Rendering of raw generator artifacts into per-phase markdown documents.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::error::GeneratorError;
use crate::job::PhaseDefinition;

/// Render one parsed artifact as a markdown document.
pub fn render_document(title: &str, artifact: &serde_json::Value, generated_at: DateTime<Utc>) -> String {
    let body = serde_json::to_string_pretty(artifact).unwrap_or_else(|_| artifact.to_string());
    format!(
        "# {}\n\nGenerated at: {}\n\n```json\n{}\n```\n",
        title,
        generated_at.to_rfc3339(),
        body
    )
}

/// Documents and metrics produced from one output directory.
#[derive(Debug, Default)]
pub struct Materialized {
    pub artifacts: HashMap<String, PathBuf>,
    pub metrics: BTreeMap<String, u64>,
}

/// Turn the raw JSON artifacts in `output_dir` into documents under `project_dir`.
///
/// Phases whose raw artifact is missing are skipped. An artifact that is not
/// valid JSON fails the whole run.
pub async fn materialize(
    pipeline: &[PhaseDefinition],
    output_dir: &Path,
    project_dir: &Path,
    generated_at: DateTime<Utc>,
) -> Result<Materialized, GeneratorError> {
    let mut result = Materialized::default();

    for phase in pipeline {
        let raw_path = output_dir.join(phase.raw_artifact);
        let raw = match tokio::fs::read(&raw_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No raw artifact for phase {} at {:?}", phase.key, raw_path);
                continue;
            }
            Err(e) => return Err(GeneratorError::Io(e)),
        };

        let parsed: serde_json::Value =
            serde_json::from_slice(&raw).map_err(|e| GeneratorError::InvalidArtifact {
                path: raw_path.clone(),
                reason: e.to_string(),
            })?;

        let phase_dir = project_dir.join(phase.dir);
        tokio::fs::create_dir_all(&phase_dir).await?;
        let document_path = phase_dir.join(phase.document);
        tokio::fs::write(
            &document_path,
            render_document(phase.title, &parsed, generated_at),
        )
        .await?;

        if let Some(rule) = phase.metric {
            result.metrics.insert(rule.name.to_string(), rule.extract(&parsed));
        }
        result.artifacts.insert(phase.key.to_string(), document_path);
    }

    Ok(result)
}
