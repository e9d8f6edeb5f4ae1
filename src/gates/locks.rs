//! Lock registry - per-project mutability flags raised by passed gates
//!
//! Gate evaluation only ever raises a lock. Clearing one is an administrative
//! operation (a change order reopening locked data) and always leaves an
//! audit record.

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::store::{AuditAction, LockAuditRecord, LockRecord, StateStore};
use crate::entities::LockKind;
use crate::gates::error::GateError;

/// Gate key recorded for locks raised by an administrative relock
pub const MANUAL_RELOCK: &str = "manual_relock";

/// Snapshot of a project's lock flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LockFlags {
    pub design: bool,
    pub procurement: bool,
    pub production: bool,
}

impl LockFlags {
    pub fn get(&self, kind: LockKind) -> bool {
        match kind {
            LockKind::Design => self.design,
            LockKind::Procurement => self.procurement,
            LockKind::Production => self.production,
        }
    }

    fn set(&mut self, kind: LockKind) {
        match kind {
            LockKind::Design => self.design = true,
            LockKind::Procurement => self.procurement = true,
            LockKind::Production => self.production = true,
        }
    }
}

/// Who is lifting a lock and why
#[derive(Debug, Clone)]
pub struct LockOverride {
    pub actor: String,
    pub reason: String,
    pub change_order: Option<String>,
}

pub struct LockRegistry<'a> {
    store: &'a StateStore,
}

impl<'a> LockRegistry<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        Self { store }
    }

    /// Raise a lock; returns true when it was not already raised
    pub fn apply(&self, project_id: &str, kind: LockKind, gate_key: &str) -> Result<bool, GateError> {
        let raised = self.store.insert_lock(project_id, kind, gate_key, Utc::now())?;
        if raised {
            info!(project_id, lock = %kind, gate_key, "lock applied");
        }
        Ok(raised)
    }

    pub fn is_locked(&self, project_id: &str, kind: LockKind) -> Result<bool, GateError> {
        Ok(self.store.lock(project_id, kind)?.is_some())
    }

    pub fn flags(&self, project_id: &str) -> Result<LockFlags, GateError> {
        let mut flags = LockFlags::default();
        for record in self.store.locks(project_id)? {
            flags.set(record.kind);
        }
        Ok(flags)
    }

    /// Which gate raised a lock, and when
    pub fn lock_info(&self, project_id: &str, kind: LockKind) -> Result<Option<LockRecord>, GateError> {
        Ok(self.store.lock(project_id, kind)?)
    }

    pub fn locks(&self, project_id: &str) -> Result<Vec<LockRecord>, GateError> {
        Ok(self.store.locks(project_id)?)
    }

    /// Clear a lock under a change order; a blank reason is refused before anything is written
    pub fn release(
        &self,
        project_id: &str,
        kind: LockKind,
        by: LockOverride,
    ) -> Result<LockAuditRecord, GateError> {
        let reason = by.reason.trim();
        if reason.is_empty() {
            return Err(GateError::MissingReason {
                project_id: project_id.to_string(),
                kind: kind.to_string(),
            });
        }

        let audit = LockAuditRecord {
            id: EntityId::new(EntityPrefix::Audit),
            project_id: project_id.to_string(),
            kind,
            action: AuditAction::Release,
            actor: by.actor,
            reason: Some(reason.to_string()),
            change_order: by.change_order,
            at: Utc::now(),
        };

        if !self.store.release_lock(&audit)? {
            return Err(GateError::NotLocked {
                project_id: project_id.to_string(),
                kind: kind.to_string(),
            });
        }

        info!(
            project_id,
            lock = %kind,
            actor = %audit.actor,
            change_order = audit.change_order.as_deref().unwrap_or(""),
            "lock released"
        );
        Ok(audit)
    }

    /// Re-raise a released lock
    pub fn relock(&self, project_id: &str, kind: LockKind, actor: &str) -> Result<LockAuditRecord, GateError> {
        let audit = LockAuditRecord {
            id: EntityId::new(EntityPrefix::Audit),
            project_id: project_id.to_string(),
            kind,
            action: AuditAction::Relock,
            actor: actor.to_string(),
            reason: None,
            change_order: None,
            at: Utc::now(),
        };

        if !self.store.relock(&audit, MANUAL_RELOCK)? {
            return Err(GateError::AlreadyLocked {
                project_id: project_id.to_string(),
                kind: kind.to_string(),
            });
        }

        info!(project_id, lock = %kind, actor, "lock re-applied");
        Ok(audit)
    }

    pub fn audit_trail(&self, project_id: &str) -> Result<Vec<LockAuditRecord>, GateError> {
        Ok(self.store.audit_trail(project_id)?)
    }
}
