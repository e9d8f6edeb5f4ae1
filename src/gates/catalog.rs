//! Gate catalog - validated gate configuration
//!
//! Everything that can be wrong with a gate definition is caught here, when
//! the catalog is built, rather than while a project is being evaluated.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::core::loader::yaml_files;
use crate::entities::{Gate, RequirementKind, Stage};
use crate::gates::checks::{CustomCheckRegistry, ALL_CNC_PROGRAMS_COMPLETE};
use crate::gates::defaults::DefaultGates;
use crate::gates::error::CatalogError;

/// The full set of configured gates
#[derive(Debug, Clone, Default)]
pub struct GateCatalog {
    gates: Vec<Gate>,
}

impl GateCatalog {
    /// Validate a set of gates against the registered custom checks
    pub fn from_gates(gates: Vec<Gate>, checks: &CustomCheckRegistry) -> Result<Self, CatalogError> {
        let mut keys = HashSet::new();
        let mut slots: BTreeMap<(Stage, u32), &str> = BTreeMap::new();

        for gate in &gates {
            if !keys.insert(gate.key.as_str()) {
                return Err(CatalogError::DuplicateGateKey(gate.key.clone()));
            }
            if gate.stage.is_terminal() {
                return Err(CatalogError::TerminalStage(gate.key.clone()));
            }
            if let Some(first) = slots.insert((gate.stage, gate.sequence), &gate.key) {
                return Err(CatalogError::DuplicateSequence {
                    stage: gate.stage,
                    sequence: gate.sequence,
                    first: first.to_string(),
                    second: gate.key.clone(),
                });
            }
            Self::validate_gate(gate, checks)?;
        }

        let mut gates = gates;
        gates.sort_by_key(|g| (g.stage.sort_order(), g.sequence));
        debug!(gates = gates.len(), "gate catalog loaded");

        Ok(Self { gates })
    }

    fn validate_gate(gate: &Gate, checks: &CustomCheckRegistry) -> Result<(), CatalogError> {
        for req in gate.requirements.iter().filter(|r| r.is_active) {
            if req.kind == RequirementKind::AllCncComplete
                && !checks.contains(ALL_CNC_PROGRAMS_COMPLETE)
            {
                return Err(CatalogError::UnknownCustomCheck {
                    gate: gate.key.clone(),
                    check: ALL_CNC_PROGRAMS_COMPLETE.to_string(),
                });
            }
            if req.kind != RequirementKind::CustomCheck {
                continue;
            }
            let check = req
                .custom_check_identifier
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| CatalogError::MissingCheckIdentifier {
                    gate: gate.key.clone(),
                    sequence: req.sequence,
                })?;
            if !checks.contains(check) {
                return Err(CatalogError::UnknownCustomCheck {
                    gate: gate.key.clone(),
                    check: check.to_string(),
                });
            }
        }

        let mut titles = HashSet::new();
        for template in &gate.task_templates {
            let title = template.title.trim();
            if title.is_empty() {
                return Err(CatalogError::EmptyTaskTitle(gate.key.clone()));
            }
            if !titles.insert(title) {
                return Err(CatalogError::DuplicateTaskTitle {
                    gate: gate.key.clone(),
                    title: title.to_string(),
                });
            }
        }

        if gate.creates_tasks_on_pass && gate.task_templates.is_empty() {
            warn!(gate_key = %gate.key, "gate creates tasks on pass but has no task templates");
        }

        Ok(())
    }

    /// Read every gate file in `dir`; a file that does not parse is an error
    pub fn load_dir(dir: &Path, checks: &CustomCheckRegistry) -> Result<Self, CatalogError> {
        let mut gates = Vec::new();
        for path in yaml_files(dir) {
            let content = fs::read_to_string(&path)?;
            let gate: Gate = serde_yml::from_str(&content).map_err(|e| CatalogError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
            gates.push(gate);
        }
        Self::from_gates(gates, checks)
    }

    /// The built-in gate set
    pub fn defaults(checks: &CustomCheckRegistry) -> Result<Self, CatalogError> {
        Self::from_gates(DefaultGates::load()?, checks)
    }

    /// Active gates of a stage, ordered by sequence
    pub fn gates_for(&self, stage: Stage) -> Vec<&Gate> {
        self.gates
            .iter()
            .filter(|g| g.stage == stage && g.is_active)
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&Gate> {
        self.gates.iter().find(|g| g.key == key)
    }

    /// All gates, active or not, in pipeline order
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}
