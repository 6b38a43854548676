//! Fixed phase definitions for the offer-generation pipeline.

use serde::Serialize;

/// Rule that turns a raw phase artifact into a named numeric fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricRule {
    /// Key stored in `JobRecord::metrics`.
    pub name: &'static str,
    /// Top-level JSON field whose array length is counted.
    pub array_field: &'static str,
}

impl MetricRule {
    /// Extract the metric from a parsed artifact. Missing or non-array fields count as zero.
    pub fn extract(&self, artifact: &serde_json::Value) -> u64 {
        artifact
            .get(self.array_field)
            .and_then(|v| v.as_array())
            .map(|items| items.len() as u64)
            .unwrap_or(0)
    }
}

/// Static description of one pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseDefinition {
    /// Stable key used in `JobRecord::phases` (e.g. "1-research").
    pub key: &'static str,
    /// Human-readable label, shown as the "next" hint.
    pub label: &'static str,
    /// Status message while the phase is active.
    pub running_message: &'static str,
    /// Subdirectory of the project directory holding the rendered document.
    pub dir: &'static str,
    /// Raw JSON file the generator writes into its output directory.
    pub raw_artifact: &'static str,
    /// File name of the rendered markdown document.
    pub document: &'static str,
    /// Title of the rendered markdown document.
    pub title: &'static str,
    /// Optional metric extracted from the raw artifact.
    pub metric: Option<MetricRule>,
}

/// The seven-phase offer pipeline.
///
/// Raw artifact names follow the generator's output contract.
pub const STANDARD_PIPELINE: &[PhaseDefinition] = &[
    PhaseDefinition {
        key: "1-research",
        label: "Research & Avatar",
        running_message: "Running step 01 (hungry crowd)...",
        dir: "01-research",
        raw_artifact: "01-multidao-faminta.json",
        document: "research_avatar.md",
        title: "Research & Avatar",
        metric: None,
    },
    PhaseDefinition {
        key: "2-avatar",
        label: "Avatar",
        running_message: "Running step 02 (avatar problems)...",
        dir: "02-avatar",
        raw_artifact: "02-problemas.json",
        document: "avatar_problems.md",
        title: "Avatar Problems",
        metric: Some(MetricRule {
            name: "pain_points_identified",
            array_field: "top15",
        }),
    },
    PhaseDefinition {
        key: "3-market",
        label: "Market",
        running_message: "Running step 03 (the lake)...",
        dir: "03-market",
        raw_artifact: "03-lago.json",
        document: "submarket_lake.md",
        title: "The Lake",
        metric: None,
    },
    PhaseDefinition {
        key: "4-mechanism",
        label: "Mechanism",
        running_message: "Running step 05 (unique mechanism)...",
        dir: "04-mechanism",
        raw_artifact: "05-mecanismo.json",
        document: "unique_mechanism.md",
        title: "Unique Mechanism",
        metric: None,
    },
    PhaseDefinition {
        key: "5-offer",
        label: "Offer",
        running_message: "Running step 06 (value ladder)...",
        dir: "05-offer",
        raw_artifact: "06-escada.json",
        document: "value_ladder.md",
        title: "Value Ladder",
        metric: None,
    },
    PhaseDefinition {
        key: "6-copy",
        label: "Copy",
        running_message: "Running step 09 (VSL copy)...",
        dir: "06-copy",
        raw_artifact: "09-vsl.json",
        document: "copy_vsl.md",
        title: "Copy (VSL)",
        metric: Some(MetricRule {
            name: "headlines_created",
            array_field: "blocos",
        }),
    },
    PhaseDefinition {
        key: "7-validation",
        label: "Validation",
        running_message: "Running step 10 (A/B page)...",
        dir: "07-validation",
        raw_artifact: "10-pagina.json",
        document: "page_ab_validation.md",
        title: "Validation (A/B Page)",
        metric: None,
    },
];
