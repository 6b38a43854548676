//! Directory-per-job JSON store.
//!
//! Layout: `<root>/<id>/job.json`, next to the per-phase artifact
//! directories created by [`ArtifactLayout`](super::ArtifactLayout).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::warn;

use super::store::stamp_for_save;
use super::{JobError, JobRecord, JobStore};

/// File name of the persisted record inside a job directory.
pub const RECORD_FILE: &str = "job.json";

/// Filesystem-backed job store.
///
/// Writes go through a temporary file and a rename so readers never see a
/// half-written record. The in-process mutex makes the version check and the
/// write a single step; other processes sharing the directory are not
/// serialized.
pub struct FsJobStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsJobStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, JobError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.root.join(id).join(RECORD_FILE)
    }

    fn read_record(path: &Path) -> Result<Option<JobRecord>, JobError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(JobError::Io(e)),
        }
    }

    fn write_record(&self, record: &JobRecord) -> Result<(), JobError> {
        let path = self.record_path(&record.id);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension(format!("json.tmp-{}", uuid::Uuid::new_v4()));
        let json = serde_json::to_vec_pretty(record)?;
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(JobError::Io(e));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, JobError> {
        self.write_lock
            .lock()
            .map_err(|_| JobError::Database("job store lock poisoned".to_string()))
    }
}

impl JobStore for FsJobStore {
    fn create(&self, record: &JobRecord) -> Result<JobRecord, JobError> {
        let _guard = self.lock()?;
        if self.record_path(&record.id).exists() {
            return Err(JobError::AlreadyExists(record.id.clone()));
        }
        self.write_record(record)?;
        Ok(record.clone())
    }

    fn get(&self, id: &str) -> Result<Option<JobRecord>, JobError> {
        Self::read_record(&self.record_path(id))
    }

    fn save(&self, record: &JobRecord) -> Result<JobRecord, JobError> {
        let _guard = self.lock()?;
        let current = Self::read_record(&self.record_path(&record.id))?
            .ok_or_else(|| JobError::NotFound(record.id.clone()))?;
        if current.version != record.version {
            return Err(JobError::Conflict {
                id: record.id.clone(),
                expected: record.version,
                found: current.version,
            });
        }

        let saved = stamp_for_save(record, Utc::now());
        self.write_record(&saved)?;
        Ok(saved)
    }

    fn list(&self) -> Result<Vec<JobRecord>, JobError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path().join(RECORD_FILE);
            match Self::read_record(&path) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable job record {:?}: {}", path, e),
            }
        }
        Ok(records)
    }
}
