//! Entity type definitions
//!
//! **Configuration** (created at setup, rarely mutated):
//! - [`Stage`] - one step of the production pipeline
//! - [`Gate`] - a checkpoint within a stage, with locks and task templates
//! - [`GateRequirement`] - one testable condition of a gate
//!
//! **Evaluated data:**
//! - [`ProjectAggregate`] - the project and its child collections
//!
//! **Produced by the engine:**
//! - [`Task`] - materialized from a gate's task templates

pub mod gate;
pub mod project;
pub mod requirement;
pub mod stage;
pub mod task;

pub use gate::{Gate, LockKind, TaskTemplate};
pub use project::{record, ModelLookup, ProjectAggregate, Record};
pub use requirement::{ComparisonOperator, GateRequirement, RemediationAction, RequirementKind};
pub use stage::Stage;
pub use task::Task;
