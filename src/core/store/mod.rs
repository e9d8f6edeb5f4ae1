//! SQLite-backed engine state
//!
//! Holds everything the gate engine writes:
//! - Lock flags raised by passed gates, plus the audit trail of overrides
//! - First-pass timestamps per project and gate
//! - Tasks generated from gate task templates
//! - Each project's current pipeline stage
//!
//! Every write is an insert-if-absent against a natural key, so two
//! overlapping evaluations of the same project cannot duplicate a side effect.

mod queries;
mod schema;

pub use queries::{AuditAction, FirstPassWrites, LockAuditRecord, LockRecord};

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

use crate::core::workspace::Workspace;

/// Current schema version - unlike a cache this data cannot be rebuilt, so a
/// mismatch is reported instead of dropping tables
const SCHEMA_VERSION: i32 = 1;

/// How long a writer waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised by the state store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state store schema version {found} is not supported (expected {expected})")]
    SchemaMismatch { found: i32, expected: i32 },

    #[error("corrupt value in state store: {0}")]
    Corrupt(String),
}

/// The engine's persistent state
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    /// Open or create the state store of a workspace
    pub fn open(workspace: &Workspace) -> Result<Self, StoreError> {
        Self::open_path(&workspace.state_db_path())
    }

    /// Open or create a state store at an explicit path
    pub fn open_path(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL keeps readers unblocked while another process records a pass
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Self::from_connection(conn)
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self { conn };
        store.init_schema()?;

        let version = store.schema_version()?;
        if version != SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                found: version,
                expected: SCHEMA_VERSION,
            });
        }

        Ok(store)
    }

    fn schema_version(&self) -> Result<i32, StoreError> {
        let version = self.conn.query_row(
            "SELECT MAX(version) FROM schema_version",
            [],
            |row| row.get::<_, Option<i32>>(0),
        )?;
        Ok(version.unwrap_or(0))
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory_sets_version() {
        let store = StateStore::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_reopen_keeps_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".stagegate/state.db");

        StateStore::open_path(&path).unwrap();
        let store = StateStore::open_path(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_future_schema_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");
        {
            let store = StateStore::open_path(&path).unwrap();
            store
                .conn
                .execute("INSERT INTO schema_version (version) VALUES (99)", [])
                .unwrap();
        }

        let err = StateStore::open_path(&path).err().unwrap();
        assert!(matches!(err, StoreError::SchemaMismatch { found: 99, .. }));
    }
}
