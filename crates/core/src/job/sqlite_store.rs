//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::store::stamp_for_save;
use super::{JobError, JobRecord, JobStore};

/// SQLite-backed job store.
///
/// The full record is kept as JSON; `version` is mirrored into its own column
/// so saves can be made conditional on it.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = Connection::open(path).map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory().map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                record TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);
            "#,
        )
        .map_err(|e| JobError::Database(e.to_string()))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, JobError> {
        self.conn
            .lock()
            .map_err(|_| JobError::Database("connection mutex poisoned".to_string()))
    }

    fn current_version(conn: &Connection, id: &str) -> Result<Option<u64>, JobError> {
        conn.query_row(
            "SELECT version FROM jobs WHERE id = ?",
            params![id],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|v| v.map(|v| v as u64))
        .map_err(|e| JobError::Database(e.to_string()))
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, record: &JobRecord) -> Result<JobRecord, JobError> {
        let conn = self.conn()?;
        let json = serde_json::to_string(record)?;

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO jobs (id, version, created_at, updated_at, record) VALUES (?, ?, ?, ?, ?)",
                params![
                    record.id,
                    record.version as i64,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                    json,
                ],
            )
            .map_err(|e| JobError::Database(e.to_string()))?;

        if inserted == 0 {
            return Err(JobError::AlreadyExists(record.id.clone()));
        }
        Ok(record.clone())
    }

    fn get(&self, id: &str) -> Result<Option<JobRecord>, JobError> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT record FROM jobs WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| JobError::Database(e.to_string()))?;

        json.map(|j| serde_json::from_str(&j).map_err(JobError::from))
            .transpose()
    }

    fn save(&self, record: &JobRecord) -> Result<JobRecord, JobError> {
        let conn = self.conn()?;
        let saved = stamp_for_save(record, Utc::now());
        let json = serde_json::to_string(&saved)?;

        let updated = conn
            .execute(
                "UPDATE jobs SET version = ?, updated_at = ?, record = ? WHERE id = ? AND version = ?",
                params![
                    saved.version as i64,
                    saved.updated_at.to_rfc3339(),
                    json,
                    record.id,
                    record.version as i64,
                ],
            )
            .map_err(|e| JobError::Database(e.to_string()))?;

        if updated == 0 {
            return match Self::current_version(&conn, &record.id)? {
                Some(found) => Err(JobError::Conflict {
                    id: record.id.clone(),
                    expected: record.version,
                    found,
                }),
                None => Err(JobError::NotFound(record.id.clone())),
            };
        }
        Ok(saved)
    }

    fn list(&self) -> Result<Vec<JobRecord>, JobError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT record FROM jobs ORDER BY created_at, id")
            .map_err(|e| JobError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let json = row.map_err(|e| JobError::Database(e.to_string()))?;
            match serde_json::from_str(&json) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping unreadable job record: {}", e),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::STANDARD_PIPELINE;

    #[test]
    fn test_create_get_roundtrip() {
        let store = SqliteJobStore::in_memory().unwrap();
        let record = JobRecord::new("Teste", "curso de yoga", STANDARD_PIPELINE);
        store.create(&record).unwrap();

        assert_eq!(store.get("Teste").unwrap(), Some(record));
        assert!(store.get("other").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_create_fails() {
        let store = SqliteJobStore::in_memory().unwrap();
        let record = JobRecord::new("Teste", "", STANDARD_PIPELINE);
        store.create(&record).unwrap();
        assert!(matches!(
            store.create(&record),
            Err(JobError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_conditional_save() {
        let store = SqliteJobStore::in_memory().unwrap();
        store
            .create(&JobRecord::new("Teste", "", STANDARD_PIPELINE))
            .unwrap();

        let a = store.load("Teste").unwrap();
        let b = store.load("Teste").unwrap();

        let saved = store.save(&a).unwrap();
        assert_eq!(saved.version, 1);
        assert!(matches!(
            store.save(&b),
            Err(JobError::Conflict {
                expected: 0,
                found: 1,
                ..
            })
        ));

        let mut ghost = a.clone();
        ghost.id = "ghost".to_string();
        assert!(matches!(store.save(&ghost), Err(JobError::NotFound(_))));
    }

    #[test]
    fn test_list_orders_by_creation() {
        let store = SqliteJobStore::in_memory().unwrap();
        let first = JobRecord::new("first", "", STANDARD_PIPELINE);
        let mut second = JobRecord::new("second", "", STANDARD_PIPELINE);
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        second.updated_at = second.created_at;

        store.create(&second).unwrap();
        store.create(&first).unwrap();

        let ids: Vec<_> = store.list().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("jobs.db");
        {
            let store = SqliteJobStore::new(&path).unwrap();
            store
                .create(&JobRecord::new("kept", "", STANDARD_PIPELINE))
                .unwrap();
        }
        let reopened = SqliteJobStore::new(&path).unwrap();
        assert!(reopened.get("kept").unwrap().is_some());
    }
}
