//! Core job record data types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pipeline::PhaseDefinition;

/// Maximum number of log entries kept per job (oldest dropped first).
pub const MAX_LOG_ENTRIES: usize = 120;

/// Status message of a freshly queued (or re-queued) job.
pub const QUEUED_MESSAGE: &str = "Queue received. Starting pipeline...";

/// Derive the store key for a project name.
///
/// Every character outside `[A-Za-z0-9]` becomes `_`, so the result is safe
/// as a directory name and as a database key.
pub fn safe_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// `round(100 * completed / total)`, 0 for an empty pipeline.
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 * 100.0) / total as f64).round() as u8
}

/// One timestamped line of the job's activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// State of a single phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    Pending,
    Active,
    Completed,
}

impl PhaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseState::Pending => "pending",
            PhaseState::Active => "active",
            PhaseState::Completed => "completed",
        }
    }
}

/// Persisted progress of one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseEntry {
    pub key: String,
    pub state: PhaseState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
}

/// Live status block of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Zero-based index of the current phase; equals the phase count once finished.
    pub phase_index: usize,
    pub progress_percent: u8,
    pub running: bool,
    pub message: String,
    /// Hint for what comes next (a phase label or a remedial action).
    pub next_label: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

/// Persisted state of one generation project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Safe name derived from `name`; unique per store.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub idea_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped by every successful save.
    #[serde(default)]
    pub version: u64,
    pub status: JobStatus,
    pub phases: Vec<PhaseEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, u64>,
}

impl JobRecord {
    /// Build the initial record of a freshly submitted job.
    pub fn new(name: &str, idea_text: &str, pipeline: &[PhaseDefinition]) -> Self {
        let now = Utc::now();
        let log = |message: &str| LogEntry {
            at: now,
            message: message.to_string(),
        };

        Self {
            id: safe_name(name),
            name: name.to_string(),
            idea_text: idea_text.to_string(),
            created_at: now,
            updated_at: now,
            version: 0,
            status: JobStatus {
                phase_index: 0,
                progress_percent: 0,
                running: true,
                message: QUEUED_MESSAGE.to_string(),
                next_label: pipeline
                    .first()
                    .map(|p| p.label.to_string())
                    .unwrap_or_default(),
                error: None,
                logs: vec![
                    log("Project registered"),
                    log("Pipeline started with phase tracking"),
                ],
            },
            phases: pipeline
                .iter()
                .map(|p| PhaseEntry {
                    key: p.key.to_string(),
                    state: PhaseState::Pending,
                    artifact_path: None,
                })
                .collect(),
            metrics: BTreeMap::new(),
        }
    }

    /// Topic handed to the generator: the idea text, falling back to the name, then the id.
    pub fn topic(&self) -> &str {
        let idea = self.idea_text.trim();
        if !idea.is_empty() {
            idea
        } else if !self.name.trim().is_empty() {
            self.name.trim()
        } else {
            &self.id
        }
    }

    pub fn total_phases(&self) -> usize {
        self.phases.len()
    }

    pub fn completed_phases(&self) -> usize {
        self.phases
            .iter()
            .filter(|p| p.state == PhaseState::Completed)
            .count()
    }

    /// Index of the active phase, if any.
    pub fn active_phase(&self) -> Option<usize> {
        self.phases.iter().position(|p| p.state == PhaseState::Active)
    }

    pub fn phase(&self, key: &str) -> Option<&PhaseEntry> {
        self.phases.iter().find(|p| p.key == key)
    }

    /// Append a log line, keeping only the newest `MAX_LOG_ENTRIES`.
    pub fn append_log(&mut self, message: impl Into<String>) {
        self.status.logs.push(LogEntry {
            at: Utc::now(),
            message: message.into(),
        });
        let len = self.status.logs.len();
        if len > MAX_LOG_ENTRIES {
            self.status.logs.drain(..len - MAX_LOG_ENTRIES);
        }
    }

    pub fn recompute_progress(&mut self) {
        self.status.progress_percent = progress_percent(self.completed_phases(), self.total_phases());
    }

    /// Make `index` the single active phase.
    pub fn activate_phase(&mut self, index: usize, message: &str, next_label: &str) {
        self.demote_active();
        if let Some(phase) = self.phases.get_mut(index) {
            phase.state = PhaseState::Active;
        }
        self.status.phase_index = index;
        self.status.message = message.to_string();
        self.status.next_label = next_label.to_string();
    }

    /// Mark `index` completed with its artifact and refresh progress.
    pub fn complete_phase(&mut self, index: usize, artifact_path: &str) {
        if let Some(phase) = self.phases.get_mut(index) {
            phase.state = PhaseState::Completed;
            phase.artifact_path = Some(artifact_path.to_string());
        }
        self.recompute_progress();
    }

    /// Manual toggle of one phase without running anything.
    pub fn set_phase_completed(&mut self, index: usize, completed: bool) {
        if let Some(phase) = self.phases.get_mut(index) {
            phase.state = if completed {
                PhaseState::Completed
            } else {
                PhaseState::Pending
            };
        }
        self.status.phase_index = if completed { index + 1 } else { index };
        self.recompute_progress();
    }

    /// Terminal failure: stop, record the error, put the active phase back to pending.
    pub fn mark_failed(&mut self, error: &str, message: &str, next_label: &str) {
        self.demote_active();
        self.status.running = false;
        self.status.error = Some(error.to_string());
        self.status.message = message.to_string();
        self.status.next_label = next_label.to_string();
    }

    /// Terminal success.
    pub fn mark_completed(&mut self, message: &str, next_label: &str) {
        self.demote_active();
        self.status.running = false;
        self.status.error = None;
        self.status.message = message.to_string();
        self.status.next_label = next_label.to_string();
        self.status.phase_index = self.total_phases();
        self.status.progress_percent = 100;
    }

    /// Put the job back in the queue.
    ///
    /// With `restart` every phase is discarded; otherwise completed phases are kept
    /// and the engine resumes at the first one that is not completed.
    pub fn requeue(&mut self, first_label: &str, restart: bool) {
        self.status.running = true;
        self.status.error = None;
        self.status.message = QUEUED_MESSAGE.to_string();
        self.status.next_label = first_label.to_string();

        if restart {
            for phase in &mut self.phases {
                phase.state = PhaseState::Pending;
                phase.artifact_path = None;
            }
            self.status.phase_index = 0;
        } else {
            self.demote_active();
            self.status.phase_index = self
                .phases
                .iter()
                .position(|p| p.state != PhaseState::Completed)
                .unwrap_or(0);
        }
        self.recompute_progress();
    }

    fn demote_active(&mut self) {
        for phase in &mut self.phases {
            if phase.state == PhaseState::Active {
                phase.state = PhaseState::Pending;
            }
        }
    }
}
