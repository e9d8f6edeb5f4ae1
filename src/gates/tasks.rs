//! Task template expansion

use chrono::Utc;
use tracing::info;

use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::store::StateStore;
use crate::entities::{Gate, Task};
use crate::gates::error::GateError;

/// Turns a gate's task templates into project tasks, at most once per title
pub struct TaskTemplateExpander<'a> {
    store: &'a StateStore,
}

impl<'a> TaskTemplateExpander<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        Self { store }
    }

    /// Tasks a gate's templates describe for a project, not yet stored
    pub fn instantiate(gate: &Gate, project_id: &str) -> Vec<Task> {
        gate.task_templates
            .iter()
            .map(|template| Task {
                id: EntityId::new(EntityPrefix::Task),
                project_id: project_id.to_string(),
                gate_key: gate.key.clone(),
                title: template.title.trim().to_string(),
                description: template.description.clone(),
                created: Utc::now(),
            })
            .collect()
    }

    /// Create the gate's tasks for a project; returns only the tasks created by this call
    pub fn expand(&self, gate: &Gate, project_id: &str) -> Result<Vec<Task>, GateError> {
        let mut created = Vec::new();
        for task in Self::instantiate(gate, project_id) {
            if self.store.insert_task_if_absent(&task)? {
                created.push(task);
            }
        }

        if !created.is_empty() {
            info!(
                project_id,
                gate_key = %gate.key,
                created = created.len(),
                "tasks created from templates"
            );
        }
        Ok(created)
    }

    pub fn tasks_for(&self, project_id: &str) -> Result<Vec<Task>, GateError> {
        Ok(self.store.tasks(project_id)?)
    }
}
