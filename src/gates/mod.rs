//! Gate engine - requirement evaluation, stage advancement and side effects

pub mod catalog;
pub mod checks;
pub mod defaults;
pub mod error;
pub mod evaluator;
pub mod locks;
pub mod orchestrator;
pub mod requirement;
pub mod tasks;
pub mod value;

pub use catalog::GateCatalog;
pub use checks::{CheckOutcome, CustomCheck, CustomCheckRegistry};
pub use defaults::DefaultGates;
pub use error::{CatalogError, CheckError, DuplicateCheck, GateError};
pub use evaluator::{GateEvaluationResult, GateEvaluator};
pub use locks::{LockFlags, LockOverride, LockRegistry};
pub use orchestrator::{AdvanceDecision, FirstPass, StageGateOrchestrator, StageTransition};
pub use requirement::{RequirementEvaluator, RequirementResult, ResultTag};
pub use tasks::TaskTemplateExpander;
