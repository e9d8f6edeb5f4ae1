//! Core module - workspace, configuration, identity and persistent state

pub mod config;
pub mod identity;
pub mod loader;
pub mod store;
pub mod workspace;

pub use config::Config;
pub use identity::{EntityId, EntityPrefix, IdParseError};
pub use store::{AuditAction, FirstPassWrites, LockAuditRecord, LockRecord, StateStore, StoreError};
pub use workspace::{Workspace, WorkspaceError};
