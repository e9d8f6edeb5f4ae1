//! Stage-gate orchestration
//!
//! Decides whether a project may leave its stage, applies the side effects of
//! gates passing for the first time, and records stage transitions.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::store::StateStore;
use crate::entities::{Gate, LockKind, ProjectAggregate, Stage, Task};
use crate::gates::catalog::GateCatalog;
use crate::gates::checks::CustomCheckRegistry;
use crate::gates::error::GateError;
use crate::gates::evaluator::{GateEvaluationResult, GateEvaluator};
use crate::gates::tasks::TaskTemplateExpander;

/// Answer to "may this project leave `stage`?"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvanceDecision {
    pub project_id: String,
    pub stage: Stage,
    /// Every blocking gate of the stage passed
    pub allowed: bool,
    /// One result per active gate, in sequence order
    pub results: Vec<GateEvaluationResult>,
    /// Side effects applied during this call
    pub effects: Vec<FirstPass>,
}

impl AdvanceDecision {
    /// Blocking gates that have not passed
    pub fn blockers(&self) -> impl Iterator<Item = &GateEvaluationResult> {
        self.results.iter().filter(|r| r.is_blocker())
    }

    pub fn blocking_gate_keys(&self) -> Vec<String> {
        self.blockers().map(|r| r.gate_key.clone()).collect()
    }

    /// Tasks created during this call
    pub fn created_tasks(&self) -> impl Iterator<Item = &Task> {
        self.effects.iter().flat_map(|e| e.tasks.iter())
    }
}

/// What happened when a gate passed for the first time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirstPass {
    pub gate_key: String,
    pub locks: Vec<LockKind>,
    pub tasks: Vec<Task>,
}

/// A recorded stage change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTransition {
    pub project_id: String,
    pub from: Stage,
    pub to: Stage,
    pub decision: AdvanceDecision,
}

pub struct StageGateOrchestrator<'a> {
    catalog: &'a GateCatalog,
    evaluator: GateEvaluator<'a>,
    store: &'a StateStore,
}

impl<'a> StageGateOrchestrator<'a> {
    pub fn new(catalog: &'a GateCatalog, checks: &'a CustomCheckRegistry, store: &'a StateStore) -> Self {
        Self {
            catalog,
            evaluator: GateEvaluator::new(checks),
            store,
        }
    }

    /// Evaluate the gates of a stage without touching any state
    pub fn evaluate_stage(
        &self,
        project: &ProjectAggregate,
        stage: Stage,
    ) -> Result<Vec<GateEvaluationResult>, GateError> {
        ensure_addressable(project)?;
        Ok(self
            .catalog
            .gates_for(stage)
            .into_iter()
            .map(|gate| self.evaluator.evaluate(gate, project))
            .collect())
    }

    /// The first blocking gate of `stage` that does not pass
    pub fn first_blocker(
        &self,
        project: &ProjectAggregate,
        stage: Stage,
    ) -> Result<Option<GateEvaluationResult>, GateError> {
        Ok(self
            .evaluate_stage(project, stage)?
            .into_iter()
            .find(|r| r.is_blocker()))
    }

    /// Evaluate the gates of `from_stage` and apply first-pass side effects
    ///
    /// Non-blocking gates are evaluated and reported but never hold up the
    /// decision. A stage without active gates is always allowed. Side effects
    /// apply only for the project's current stage or one it already left; a
    /// later stage is evaluated as a preview.
    pub fn can_advance(
        &self,
        project: &ProjectAggregate,
        from_stage: Stage,
    ) -> Result<AdvanceDecision, GateError> {
        ensure_addressable(project)?;

        let current = self.current_stage(&project.id)?;
        let reached = from_stage <= current;
        if !reached {
            debug!(
                project_id = %project.id,
                stage = %from_stage,
                current = %current,
                "stage not reached, skipping side effects"
            );
        }

        let mut results = Vec::new();
        let mut effects = Vec::new();
        for gate in self.catalog.gates_for(from_stage) {
            let result = self.evaluator.evaluate(gate, project);
            if result.passed && reached {
                if let Some(effect) = self.on_pass(gate, &project.id)? {
                    effects.push(effect);
                }
            }
            results.push(result);
        }

        let allowed = results.iter().all(|r| !r.is_blocker());
        debug!(
            project_id = %project.id,
            stage = %from_stage,
            allowed,
            gates = results.len(),
            "advance decision"
        );

        Ok(AdvanceDecision {
            project_id: project.id.clone(),
            stage: from_stage,
            allowed,
            results,
            effects,
        })
    }

    /// Side effects of a passed gate, applied only by the call that claims its first pass
    ///
    /// The claim, the locks and the tasks are written together; if any of them
    /// fails nothing is kept and the next evaluation retries.
    fn on_pass(&self, gate: &Gate, project_id: &str) -> Result<Option<FirstPass>, GateError> {
        let tasks = if gate.creates_tasks_on_pass {
            TaskTemplateExpander::instantiate(gate, project_id)
        } else {
            Vec::new()
        };

        let Some(writes) = self.store.record_first_pass(
            project_id,
            &gate.key,
            Utc::now(),
            &gate.lock_kinds(),
            tasks,
        )?
        else {
            return Ok(None);
        };

        info!(
            project_id,
            gate_key = %gate.key,
            locks = writes.locks.len(),
            tasks = writes.tasks.len(),
            "gate passed for the first time"
        );
        Ok(Some(FirstPass {
            gate_key: gate.key.clone(),
            locks: writes.locks,
            tasks: writes.tasks,
        }))
    }

    /// Move the project from `from_stage` to the next stage if its gates allow it
    pub fn advance(
        &self,
        project: &ProjectAggregate,
        from_stage: Stage,
    ) -> Result<StageTransition, GateError> {
        ensure_addressable(project)?;

        let current = self.current_stage(&project.id)?;
        if current != from_stage {
            return Err(GateError::StageMismatch {
                project_id: project.id.clone(),
                expected: from_stage,
                actual: current,
            });
        }
        let Some(to) = from_stage.next() else {
            return Err(GateError::PipelineComplete(project.id.clone()));
        };

        let decision = self.can_advance(project, from_stage)?;
        if !decision.allowed {
            return Err(GateError::Blocked(Box::new(decision)));
        }

        if !self
            .store
            .transition_stage(&project.id, from_stage, to, Utc::now())?
        {
            // another writer moved the project between the check and the update
            let actual = self.current_stage(&project.id)?;
            return Err(GateError::StageMismatch {
                project_id: project.id.clone(),
                expected: from_stage,
                actual,
            });
        }

        info!(project_id = %project.id, from = %from_stage, to = %to, "stage advanced");
        Ok(StageTransition {
            project_id: project.id.clone(),
            from: from_stage,
            to,
            decision,
        })
    }

    /// Recorded stage of a project; projects that never advanced are in discovery
    pub fn current_stage(&self, project_id: &str) -> Result<Stage, GateError> {
        Ok(self.store.stage(project_id)?.unwrap_or_default())
    }
}

fn ensure_addressable(project: &ProjectAggregate) -> Result<(), GateError> {
    if project.is_addressable() {
        Ok(())
    } else {
        Err(GateError::ProjectUnaddressable)
    }
}
