//! Gate entity type

use serde::{Deserialize, Serialize};

use crate::entities::requirement::GateRequirement;
use crate::entities::stage::Stage;

/// Kind of mutability lock a passed gate can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    /// Cabinet specs, sections and components
    Design,
    /// BOM quantities
    Procurement,
    /// Production records
    Production,
}

impl LockKind {
    pub fn all() -> &'static [LockKind] {
        &[LockKind::Design, LockKind::Procurement, LockKind::Production]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockKind::Design => "design",
            LockKind::Procurement => "procurement",
            LockKind::Production => "production",
        }
    }
}

impl std::fmt::Display for LockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LockKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "design" => Ok(LockKind::Design),
            "procurement" => Ok(LockKind::Procurement),
            "production" => Ok(LockKind::Production),
            _ => Err(format!("Unknown lock kind: {}", s)),
        }
    }
}

/// Title/description pair materialized into a task when the gate first passes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl TaskTemplate {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// A named checkpoint attached to a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    /// Unique key (e.g. `discovery_complete`)
    #[serde(rename = "gate_key")]
    pub key: String,

    /// Stage this gate belongs to
    pub stage: Stage,

    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Ordering within the stage
    pub sequence: u32,

    /// Blocking gates must pass before the stage can be left
    #[serde(default = "default_true")]
    pub is_blocking: bool,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub applies_design_lock: bool,

    #[serde(default)]
    pub applies_procurement_lock: bool,

    #[serde(default)]
    pub applies_production_lock: bool,

    #[serde(default)]
    pub creates_tasks_on_pass: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_templates: Vec<TaskTemplate>,

    #[serde(default)]
    pub requirements: Vec<GateRequirement>,
}

fn default_true() -> bool {
    true
}

impl Gate {
    /// Create an active, blocking gate with no requirements
    pub fn new(key: impl Into<String>, stage: Stage, sequence: u32) -> Self {
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            stage,
            description: String::new(),
            sequence,
            is_blocking: true,
            is_active: true,
            applies_design_lock: false,
            applies_procurement_lock: false,
            applies_production_lock: false,
            creates_tasks_on_pass: false,
            task_templates: Vec::new(),
            requirements: Vec::new(),
        }
    }

    /// Lock kinds raised when this gate passes
    pub fn lock_kinds(&self) -> Vec<LockKind> {
        let mut kinds = Vec::new();
        if self.applies_design_lock {
            kinds.push(LockKind::Design);
        }
        if self.applies_procurement_lock {
            kinds.push(LockKind::Procurement);
        }
        if self.applies_production_lock {
            kinds.push(LockKind::Production);
        }
        kinds
    }

    pub fn applies_any_lock(&self) -> bool {
        !self.lock_kinds().is_empty()
    }

    /// Active requirements ordered by sequence
    pub fn active_requirements(&self) -> Vec<&GateRequirement> {
        let mut reqs: Vec<&GateRequirement> =
            self.requirements.iter().filter(|r| r.is_active).collect();
        reqs.sort_by_key(|r| r.sequence);
        reqs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::requirement::RequirementKind;

    #[test]
    fn test_lock_kinds() {
        let mut gate = Gate::new("design_lock", Stage::Design, 1);
        assert!(!gate.applies_any_lock());

        gate.applies_design_lock = true;
        gate.applies_procurement_lock = true;
        assert_eq!(gate.lock_kinds(), vec![LockKind::Design, LockKind::Procurement]);
    }

    #[test]
    fn test_active_requirements_sorted_and_filtered() {
        let mut gate = Gate::new("g", Stage::Discovery, 1);
        let mut second = GateRequirement::new(RequirementKind::FieldNotNull, "second");
        second.sequence = 2;
        let mut first = GateRequirement::new(RequirementKind::FieldNotNull, "first");
        first.sequence = 1;
        let mut off = GateRequirement::new(RequirementKind::FieldNotNull, "off");
        off.is_active = false;
        gate.requirements = vec![second, off, first];

        let msgs: Vec<&str> = gate
            .active_requirements()
            .iter()
            .map(|r| r.error_message.as_str())
            .collect();
        assert_eq!(msgs, vec!["first", "second"]);
    }

    #[test]
    fn test_gate_yaml_defaults() {
        let yaml = "gate_key: qc_passed\nstage: production\nname: QC Passed\nsequence: 3\n";
        let gate: Gate = serde_yml::from_str(yaml).unwrap();
        assert!(gate.is_blocking);
        assert!(gate.is_active);
        assert!(gate.task_templates.is_empty());
        assert_eq!(gate.stage, Stage::Production);
    }
}
