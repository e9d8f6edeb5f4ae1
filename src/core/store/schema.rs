//! Database schema initialization

use rusqlite::params;

use super::{StateStore, StoreError, SCHEMA_VERSION};

impl StateStore {
    /// Create tables if missing and stamp a fresh database with the schema version
    pub(super) fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Monotonic lock flags; one row per raised lock
            CREATE TABLE IF NOT EXISTS project_locks (
                project_id TEXT NOT NULL,
                lock_kind TEXT NOT NULL,
                gate_key TEXT NOT NULL,
                locked_at TEXT NOT NULL,
                PRIMARY KEY (project_id, lock_kind)
            );

            -- First observed pass of a gate for a project
            CREATE TABLE IF NOT EXISTS gate_passes (
                project_id TEXT NOT NULL,
                gate_key TEXT NOT NULL,
                passed_at TEXT NOT NULL,
                PRIMARY KEY (project_id, gate_key)
            );

            -- Tasks materialized from gate templates; title is the natural key
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                gate_key TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created TEXT NOT NULL,
                UNIQUE (project_id, title)
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);

            -- Current pipeline stage per project (absent = discovery)
            CREATE TABLE IF NOT EXISTS project_stages (
                project_id TEXT PRIMARY KEY,
                stage TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Administrative lock releases and relocks
            CREATE TABLE IF NOT EXISTS lock_audit (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                lock_kind TEXT NOT NULL,
                action TEXT NOT NULL,
                actor TEXT NOT NULL,
                reason TEXT,
                change_order TEXT,
                at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_lock_audit_project ON lock_audit(project_id);
            "#,
        )?;

        let stamped: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))?;
        if stamped == 0 {
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
        }

        Ok(())
    }
}
