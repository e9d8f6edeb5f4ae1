//! Error types for the gate engine

use std::path::PathBuf;

use thiserror::Error;

use crate::core::store::StoreError;
use crate::entities::Stage;
use crate::gates::orchestrator::AdvanceDecision;

/// Failures raised to callers of the orchestrator and lock registry
///
/// A requirement that is not met is never one of these; it is reported in the
/// evaluation result.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("project aggregate has no usable id")]
    ProjectUnaddressable,

    #[error("project {project_id} is at stage '{actual}', not '{expected}'")]
    StageMismatch {
        project_id: String,
        expected: Stage,
        actual: Stage,
    },

    #[error("project {0} has already completed the pipeline")]
    PipelineComplete(String),

    #[error("stage '{}' is blocked by {}", .0.stage, .0.blocking_gate_keys().join(", "))]
    Blocked(Box<AdvanceDecision>),

    #[error("{project_id} has no {kind} lock to release")]
    NotLocked { project_id: String, kind: String },

    #[error("releasing the {kind} lock on {project_id} requires a reason")]
    MissingReason { project_id: String, kind: String },

    #[error("{project_id} already holds a {kind} lock")]
    AlreadyLocked { project_id: String, kind: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Problems in the gate configuration, found when the catalog is built
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("gate key '{0}' is defined more than once")]
    DuplicateGateKey(String),

    #[error("gates '{first}' and '{second}' share sequence {sequence} in stage '{stage}'")]
    DuplicateSequence {
        stage: Stage,
        sequence: u32,
        first: String,
        second: String,
    },

    #[error("gate '{0}' is attached to the terminal stage")]
    TerminalStage(String),

    #[error("gate '{gate}' requirement #{sequence} has no custom check identifier")]
    MissingCheckIdentifier { gate: String, sequence: u32 },

    #[error("gate '{gate}' references unregistered custom check '{check}'")]
    UnknownCustomCheck { gate: String, check: String },

    #[error("gate '{0}' has a task template with an empty title")]
    EmptyTaskTitle(String),

    #[error("gate '{gate}' has more than one task template titled '{title}'")]
    DuplicateTaskTitle { gate: String, title: String },

    #[error("failed to parse gate file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure inside a custom check; downgraded to an evaluation error result
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("missing data: {0}")]
    MissingData(String),

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
#[error("custom check '{0}' is already registered")]
pub struct DuplicateCheck(pub String);
