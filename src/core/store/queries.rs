//! Row-level reads and writes
//!
//! All inserts are keyed on a natural key (`INSERT OR IGNORE`), and report
//! whether this call was the one that created the row.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{format_datetime, parse_datetime, StateStore, StoreError};
use crate::core::identity::EntityId;
use crate::entities::{LockKind, Stage, Task};

/// A raised lock and the gate that raised it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockRecord {
    pub project_id: String,
    pub kind: LockKind,
    pub gate_key: String,
    pub locked_at: DateTime<Utc>,
}

/// Administrative lock operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Release,
    Relock,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Release => "release",
            AuditAction::Relock => "relock",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release" => Ok(AuditAction::Release),
            "relock" => Ok(AuditAction::Relock),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

/// One entry of the lock audit trail
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockAuditRecord {
    pub id: EntityId,
    pub project_id: String,
    pub kind: LockKind,
    pub action: AuditAction,
    pub actor: String,
    pub reason: Option<String>,
    pub change_order: Option<String>,
    pub at: DateTime<Utc>,
}

/// Rows actually written by a first-pass claim
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FirstPassWrites {
    pub locks: Vec<LockKind>,
    pub tasks: Vec<Task>,
}

fn corrupt<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Corrupt(e.to_string())
}

impl StateStore {
    // ---- gate passes -------------------------------------------------------

    /// Claim the first pass of a gate and write its locks and tasks in one transaction
    ///
    /// Returns None when the pass was claimed earlier. If any write fails the
    /// claim is rolled back with it, so a later call can retry the whole set.
    pub fn record_first_pass(
        &self,
        project_id: &str,
        gate_key: &str,
        at: DateTime<Utc>,
        locks: &[LockKind],
        tasks: Vec<Task>,
    ) -> Result<Option<FirstPassWrites>, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let claimed = tx.execute(
            "INSERT OR IGNORE INTO gate_passes (project_id, gate_key, passed_at) VALUES (?1, ?2, ?3)",
            params![project_id, gate_key, format_datetime(&at)],
        )?;
        if claimed == 0 {
            return Ok(None);
        }

        let mut writes = FirstPassWrites::default();
        for &kind in locks {
            if insert_lock_row(&tx, project_id, kind, gate_key, at)? {
                writes.locks.push(kind);
            }
        }
        for task in tasks {
            if insert_task_row(&tx, &task)? {
                writes.tasks.push(task);
            }
        }

        tx.commit()?;
        Ok(Some(writes))
    }

    /// When the gate first passed for the project, if it has
    pub fn gate_passed_at(
        &self,
        project_id: &str,
        gate_key: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT passed_at FROM gate_passes WHERE project_id = ?1 AND gate_key = ?2",
                params![project_id, gate_key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| parse_datetime(&s)).transpose()
    }

    // ---- locks -------------------------------------------------------------

    /// Insert a lock row unless the lock is already raised
    pub fn insert_lock(
        &self,
        project_id: &str,
        kind: LockKind,
        gate_key: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        insert_lock_row(&self.conn, project_id, kind, gate_key, at)
    }

    pub fn lock(&self, project_id: &str, kind: LockKind) -> Result<Option<LockRecord>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT project_id, lock_kind, gate_key, locked_at FROM project_locks WHERE project_id = ?1 AND lock_kind = ?2",
                params![project_id, kind.as_str()],
                raw_lock,
            )
            .optional()?;
        row.map(RawLock::into_record).transpose()
    }

    pub fn locks(&self, project_id: &str) -> Result<Vec<LockRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, lock_kind, gate_key, locked_at FROM project_locks WHERE project_id = ?1 ORDER BY locked_at, lock_kind",
        )?;
        let rows = stmt.query_map(params![project_id], raw_lock)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    /// Delete a lock and write its audit entry in one transaction
    pub fn release_lock(&self, audit: &LockAuditRecord) -> Result<bool, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute(
            "DELETE FROM project_locks WHERE project_id = ?1 AND lock_kind = ?2",
            params![audit.project_id, audit.kind.as_str()],
        )?;
        if removed == 1 {
            insert_audit(&tx, audit)?;
        }
        tx.commit()?;
        Ok(removed == 1)
    }

    /// Re-raise a lock and write its audit entry in one transaction
    pub fn relock(&self, audit: &LockAuditRecord, gate_key: &str) -> Result<bool, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO project_locks (project_id, lock_kind, gate_key, locked_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                audit.project_id,
                audit.kind.as_str(),
                gate_key,
                format_datetime(&audit.at)
            ],
        )?;
        if inserted == 1 {
            insert_audit(&tx, audit)?;
        }
        tx.commit()?;
        Ok(inserted == 1)
    }

    pub fn audit_trail(&self, project_id: &str) -> Result<Vec<LockAuditRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, lock_kind, action, actor, reason, change_order, at FROM lock_audit WHERE project_id = ?1 ORDER BY at, id",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, project_id, kind, action, actor, reason, change_order, at) = row?;
            records.push(LockAuditRecord {
                id: EntityId::parse(&id).map_err(corrupt)?,
                project_id,
                kind: kind.parse().map_err(corrupt)?,
                action: action.parse().map_err(corrupt)?,
                actor,
                reason,
                change_order,
                at: parse_datetime(&at)?,
            });
        }
        Ok(records)
    }

    // ---- tasks -------------------------------------------------------------

    /// Insert a task unless the project already has one with the same title
    pub fn insert_task_if_absent(&self, task: &Task) -> Result<bool, StoreError> {
        insert_task_row(&self.conn, task)
    }

    pub fn tasks(&self, project_id: &str) -> Result<Vec<Task>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, gate_key, title, description, created FROM tasks WHERE project_id = ?1 ORDER BY created, rowid",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            let (id, project_id, gate_key, title, description, created) = row?;
            tasks.push(Task {
                id: EntityId::parse(&id).map_err(corrupt)?,
                project_id,
                gate_key,
                title,
                description,
                created: parse_datetime(&created)?,
            });
        }
        Ok(tasks)
    }

    // ---- stages ------------------------------------------------------------

    /// Recorded stage of a project, if it has ever advanced
    pub fn stage(&self, project_id: &str) -> Result<Option<Stage>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT stage FROM project_stages WHERE project_id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| s.parse::<Stage>().map_err(corrupt)).transpose()
    }

    /// Move a project from `from` to `to`; returns false if the project was no longer at `from`
    pub fn transition_stage(
        &self,
        project_id: &str,
        from: Stage,
        to: Stage,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let current: Option<String> = tx
            .query_row(
                "SELECT stage FROM project_stages WHERE project_id = ?1",
                params![project_id],
                |row| row.get(0),
            )
            .optional()?;

        let current = match current {
            Some(s) => s.parse::<Stage>().map_err(corrupt)?,
            None => Stage::default(),
        };
        if current != from {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO project_stages (project_id, stage, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(project_id) DO UPDATE SET stage = excluded.stage, updated_at = excluded.updated_at",
            params![project_id, to.key(), format_datetime(&at)],
        )?;
        tx.commit()?;
        Ok(true)
    }
}

struct RawLock {
    project_id: String,
    kind: String,
    gate_key: String,
    locked_at: String,
}

impl RawLock {
    fn into_record(self) -> Result<LockRecord, StoreError> {
        Ok(LockRecord {
            project_id: self.project_id,
            kind: self.kind.parse().map_err(corrupt)?,
            gate_key: self.gate_key,
            locked_at: parse_datetime(&self.locked_at)?,
        })
    }
}

fn raw_lock(row: &Row<'_>) -> rusqlite::Result<RawLock> {
    Ok(RawLock {
        project_id: row.get(0)?,
        kind: row.get(1)?,
        gate_key: row.get(2)?,
        locked_at: row.get(3)?,
    })
}

fn insert_lock_row(
    conn: &Connection,
    project_id: &str,
    kind: LockKind,
    gate_key: &str,
    at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO project_locks (project_id, lock_kind, gate_key, locked_at) VALUES (?1, ?2, ?3, ?4)",
        params![project_id, kind.as_str(), gate_key, format_datetime(&at)],
    )?;
    Ok(inserted == 1)
}

fn insert_task_row(conn: &Connection, task: &Task) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO tasks (id, project_id, gate_key, title, description, created) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            task.id.to_string(),
            task.project_id,
            task.gate_key,
            task.title,
            task.description,
            format_datetime(&task.created)
        ],
    )?;
    Ok(inserted == 1)
}

fn insert_audit(conn: &Connection, audit: &LockAuditRecord) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO lock_audit (id, project_id, lock_kind, action, actor, reason, change_order, at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            audit.id.to_string(),
            audit.project_id,
            audit.kind.as_str(),
            audit.action.as_str(),
            audit.actor,
            audit.reason,
            audit.change_order,
            format_datetime(&audit.at)
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityPrefix;

    fn task(project_id: &str, title: &str) -> Task {
        Task {
            id: EntityId::new(EntityPrefix::Task),
            project_id: project_id.to_string(),
            gate_key: "design_lock".to_string(),
            title: title.to_string(),
            description: String::new(),
            created: Utc::now(),
        }
    }

    #[test]
    fn test_first_pass_claimed_only_once() {
        let store = StateStore::open_in_memory().unwrap();
        let locks = [LockKind::Design];

        let first = store
            .record_first_pass("P-1", "design_lock", Utc::now(), &locks, vec![task("P-1", "Generate BOM")])
            .unwrap()
            .unwrap();
        assert_eq!(first.locks, vec![LockKind::Design]);
        assert_eq!(first.tasks.len(), 1);

        let again = store
            .record_first_pass("P-1", "design_lock", Utc::now(), &locks, vec![task("P-1", "Other")])
            .unwrap();
        assert!(again.is_none());
        assert_eq!(store.tasks("P-1").unwrap().len(), 1);

        assert!(store
            .record_first_pass("P-2", "design_lock", Utc::now(), &[], Vec::new())
            .unwrap()
            .is_some());
        assert!(store.gate_passed_at("P-1", "design_lock").unwrap().is_some());
        assert!(store.gate_passed_at("P-1", "qc_passed").unwrap().is_none());
    }

    #[test]
    fn test_failed_first_pass_rolls_back_claim_and_locks() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER tasks_fail BEFORE INSERT ON tasks BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        let locks = [LockKind::Design];
        let result = store.record_first_pass(
            "P-1",
            "design_lock",
            Utc::now(),
            &locks,
            vec![task("P-1", "Generate BOM")],
        );
        assert!(result.is_err());
        assert!(store.gate_passed_at("P-1", "design_lock").unwrap().is_none());
        assert!(store.lock("P-1", LockKind::Design).unwrap().is_none());
        assert!(store.tasks("P-1").unwrap().is_empty());

        store.conn.execute_batch("DROP TRIGGER tasks_fail;").unwrap();
        let retried = store
            .record_first_pass(
                "P-1",
                "design_lock",
                Utc::now(),
                &locks,
                vec![task("P-1", "Generate BOM")],
            )
            .unwrap()
            .unwrap();
        assert_eq!(retried.locks, vec![LockKind::Design]);
        assert_eq!(retried.tasks.len(), 1);
        assert!(store.lock("P-1", LockKind::Design).unwrap().is_some());
    }

    #[test]
    fn test_task_title_is_natural_key() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.insert_task_if_absent(&task("P-1", "Generate BOM")).unwrap());
        assert!(!store.insert_task_if_absent(&task("P-1", "Generate BOM")).unwrap());
        assert!(store.insert_task_if_absent(&task("P-2", "Generate BOM")).unwrap());
        assert_eq!(store.tasks("P-1").unwrap().len(), 1);
    }

    #[test]
    fn test_stage_transition_requires_current_stage() {
        let store = StateStore::open_in_memory().unwrap();
        assert_eq!(store.stage("P-1").unwrap(), None);

        assert!(!store
            .transition_stage("P-1", Stage::Design, Stage::Sourcing, Utc::now())
            .unwrap());
        assert!(store
            .transition_stage("P-1", Stage::Discovery, Stage::Design, Utc::now())
            .unwrap());
        assert_eq!(store.stage("P-1").unwrap(), Some(Stage::Design));
    }

    #[test]
    fn test_release_writes_audit_only_when_lock_existed() {
        let store = StateStore::open_in_memory().unwrap();
        let audit = LockAuditRecord {
            id: EntityId::new(EntityPrefix::Audit),
            project_id: "P-1".to_string(),
            kind: LockKind::Design,
            action: AuditAction::Release,
            actor: "foreman".to_string(),
            reason: Some("customer change".to_string()),
            change_order: Some("CO-7".to_string()),
            at: Utc::now(),
        };

        assert!(!store.release_lock(&audit).unwrap());
        assert!(store.audit_trail("P-1").unwrap().is_empty());

        store
            .insert_lock("P-1", LockKind::Design, "design_lock", Utc::now())
            .unwrap();
        assert!(store.release_lock(&audit).unwrap());
        assert!(store.lock("P-1", LockKind::Design).unwrap().is_none());

        let trail = store.audit_trail("P-1").unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].change_order.as_deref(), Some("CO-7"));
    }
}
