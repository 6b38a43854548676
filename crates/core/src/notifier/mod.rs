//! Best-effort notification of a companion process when a pipeline completes.

mod config;

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::job::JobRecord;
use crate::metrics;

pub use config::CompanionConfig;

/// Signals an outside process that a job finished. Never fails.
pub trait CompanionNotifier: Send + Sync {
    fn notify(&self, record: &JobRecord);
}

/// Notifier used when the companion is disabled.
pub struct NoopNotifier;

impl CompanionNotifier for NoopNotifier {
    fn notify(&self, record: &JobRecord) {
        debug!("Companion disabled, not notifying for job {}", record.id);
    }
}

/// Spawns the configured companion program detached from the server.
pub struct ProcessNotifier {
    config: CompanionConfig,
}

impl ProcessNotifier {
    pub fn new(config: CompanionConfig) -> Self {
        Self { config }
    }
}

impl CompanionNotifier for ProcessNotifier {
    fn notify(&self, record: &JobRecord) {
        if let Some(script) = self.config.script_path() {
            if !script.exists() {
                debug!("Companion script {:?} not found, skipping", script);
                metrics::COMPANION_NOTIFICATIONS_TOTAL
                    .with_label_values(&["skipped"])
                    .inc();
                return;
            }
        }

        let mut command = Command::new(&self.config.program);
        command
            .args(self.config.render_args(&record.id))
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        command.process_group(0);

        match command.spawn() {
            Ok(mut child) => {
                info!("Companion notified for job {}", record.id);
                metrics::COMPANION_NOTIFICATIONS_TOTAL
                    .with_label_values(&["spawned"])
                    .inc();
                // Reap the child so it does not linger as a zombie.
                tokio::spawn(async move {
                    let _ = child.wait().await;
                });
            }
            Err(e) => {
                warn!("Failed to start companion for job {}: {}", record.id, e);
                metrics::COMPANION_NOTIFICATIONS_TOTAL
                    .with_label_values(&["failed"])
                    .inc();
            }
        }
    }
}

/// Build the notifier selected by the configuration.
pub fn create_notifier(config: &CompanionConfig) -> Box<dyn CompanionNotifier> {
    if config.enabled {
        Box::new(ProcessNotifier::new(config.clone()))
    } else {
        Box::new(NoopNotifier)
    }
}
