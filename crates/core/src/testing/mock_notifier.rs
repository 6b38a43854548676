//! Recording companion notifier for testing.

use std::sync::{Arc, Mutex};

use crate::job::JobRecord;
use crate::notifier::CompanionNotifier;

/// Records the id of every job it is notified about.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notified: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids notified so far, in order.
    pub fn notified(&self) -> Vec<String> {
        self.notified
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }
}

impl CompanionNotifier for RecordingNotifier {
    fn notify(&self, record: &JobRecord) {
        if let Ok(mut ids) = self.notified.lock() {
            ids.push(record.id.clone());
        }
    }
}
