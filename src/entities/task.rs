//! Task entity - created from a gate's task templates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::EntityId;

/// A concrete task attached to a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,

    pub project_id: String,

    /// Gate whose template produced this task
    pub gate_key: String,

    /// Natural key within the project
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    pub created: DateTime<Utc>,
}
