//! Gate evaluation - every active requirement of one gate

use serde::Serialize;
use tracing::debug;

use crate::entities::{Gate, ProjectAggregate, RemediationAction, Stage};
use crate::gates::checks::CustomCheckRegistry;
use crate::gates::requirement::{RequirementEvaluator, RequirementResult, ResultTag};

/// Outcome of evaluating one gate for one project
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateEvaluationResult {
    pub gate_key: String,
    pub gate_name: String,
    pub stage: Stage,
    pub sequence: u32,
    pub is_blocking: bool,
    /// Gate is active and every active requirement passed
    pub passed: bool,
    /// One entry per active requirement, in sequence order
    pub requirement_results: Vec<RequirementResult>,
}

impl GateEvaluationResult {
    /// Results that did not pass, in sequence order
    pub fn failures(&self) -> impl Iterator<Item = &RequirementResult> {
        self.requirement_results.iter().filter(|r| !r.passed)
    }

    /// Failure messages, in sequence order
    pub fn failure_messages(&self) -> Vec<&str> {
        self.failures().map(|r| r.message()).collect()
    }

    /// Remediation actions offered by failed requirements
    pub fn actions(&self) -> Vec<RemediationAction> {
        self.failures()
            .filter_map(|r| r.requirement.action())
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn passed_count(&self) -> usize {
        self.requirement_results.len() - self.failed_count()
    }

    pub fn total_count(&self) -> usize {
        self.requirement_results.len()
    }

    /// Share of passed requirements, 100 for a gate without requirements
    pub fn progress_percentage(&self) -> u8 {
        let total = self.total_count();
        if total == 0 {
            return 100;
        }
        ((self.passed_count() * 100) / total) as u8
    }

    /// True when any failure came from bad configuration or a broken check
    pub fn has_errors(&self) -> bool {
        self.failures().any(|r| {
            matches!(
                r.tag,
                ResultTag::ConfigurationError | ResultTag::EvaluationError
            )
        })
    }

    /// Holds up advancement: blocking and not passed
    pub fn is_blocker(&self) -> bool {
        self.is_blocking && !self.passed
    }
}

/// Evaluates gates against a project aggregate
pub struct GateEvaluator<'a> {
    requirements: RequirementEvaluator<'a>,
}

impl<'a> GateEvaluator<'a> {
    pub fn new(checks: &'a CustomCheckRegistry) -> Self {
        Self {
            requirements: RequirementEvaluator::new(checks),
        }
    }

    /// Evaluate every active requirement without short-circuiting
    pub fn evaluate(&self, gate: &Gate, project: &ProjectAggregate) -> GateEvaluationResult {
        let requirement_results: Vec<RequirementResult> = gate
            .active_requirements()
            .into_iter()
            .map(|req| self.requirements.evaluate(req, project))
            .collect();

        let passed = gate.is_active && requirement_results.iter().all(|r| r.passed);

        debug!(
            project_id = %project.id,
            gate_key = %gate.key,
            passed,
            failed = requirement_results.iter().filter(|r| !r.passed).count(),
            "evaluated gate"
        );

        GateEvaluationResult {
            gate_key: gate.key.clone(),
            gate_name: gate.name.clone(),
            stage: gate.stage,
            sequence: gate.sequence,
            is_blocking: gate.is_blocking,
            passed,
            requirement_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{record, GateRequirement, RequirementKind};
    use serde_json::json;

    fn not_null(field: &str, message: &str, sequence: u32) -> GateRequirement {
        let mut req = GateRequirement::new(RequirementKind::FieldNotNull, message);
        req.target_field = Some(field.into());
        req.sequence = sequence;
        req
    }

    fn three_field_gate() -> Gate {
        let mut gate = Gate::new("delivered_closed", Stage::Delivery, 2);
        gate.requirements = vec![
            not_null("customer_signoff_at", "Customer signoff not received", 3),
            not_null("delivered_at", "Delivery not confirmed", 1),
            not_null("closeout_delivered_at", "Closeout package not delivered", 2),
        ];
        gate
    }

    #[test]
    fn test_completeness_and_order() {
        let registry = CustomCheckRegistry::new();
        let evaluator = GateEvaluator::new(&registry);
        let project = ProjectAggregate::new("P-1")
            .with_field("delivered_at", json!(null))
            .with_field("closeout_delivered_at", json!("2024-06-01"))
            .with_field("customer_signoff_at", json!(null));

        let result = evaluator.evaluate(&three_field_gate(), &project);
        assert!(!result.passed);
        assert_eq!(result.total_count(), 3);
        assert_eq!(result.failed_count(), 2);
        assert_eq!(
            result.failure_messages(),
            vec!["Delivery not confirmed", "Customer signoff not received"]
        );
        assert_eq!(result.progress_percentage(), 33);
    }

    #[test]
    fn test_deterministic() {
        let registry = CustomCheckRegistry::with_builtin_checks();
        let evaluator = GateEvaluator::new(&registry);
        let project = ProjectAggregate::new("P-1")
            .with_field("delivered_at", json!("2024-06-01"))
            .with_field("closeout_delivered_at", json!(null))
            .with_field("customer_signoff_at", json!(""));

        let gate = three_field_gate();
        let first = evaluator.evaluate(&gate, &project);
        for _ in 0..5 {
            assert_eq!(evaluator.evaluate(&gate, &project), first);
        }
    }

    #[test]
    fn test_inactive_requirements_skipped() {
        let registry = CustomCheckRegistry::new();
        let evaluator = GateEvaluator::new(&registry);
        let mut gate = three_field_gate();
        for req in gate.requirements.iter_mut() {
            req.is_active = false;
        }
        gate.requirements[0].is_active = true;

        let project = ProjectAggregate::new("P-1").with_field("customer_signoff_at", json!("yes"));
        let result = evaluator.evaluate(&gate, &project);
        assert!(result.passed);
        assert_eq!(result.total_count(), 1);
    }

    #[test]
    fn test_inactive_gate_never_passes() {
        let registry = CustomCheckRegistry::new();
        let evaluator = GateEvaluator::new(&registry);
        let mut gate = Gate::new("empty", Stage::Design, 1);
        gate.is_active = false;

        let result = evaluator.evaluate(&gate, &ProjectAggregate::new("P-1"));
        assert!(!result.passed);
        assert_eq!(result.progress_percentage(), 100);
    }

    #[test]
    fn test_actions_for_failures() {
        let registry = CustomCheckRegistry::new();
        let evaluator = GateEvaluator::new(&registry);
        let mut req = GateRequirement::new(RequirementKind::RelationExists, "No rooms/specifications defined");
        req.target_relation = Some("rooms".into());
        req.action_label = Some("Add Room".into());
        req.action_route = Some("filament.projects.resources.projects.edit".into());

        let mut gate = Gate::new("discovery_complete", Stage::Discovery, 1);
        gate.requirements.push(req);

        let without = ProjectAggregate::new("P-1").with_relation("rooms", vec![]);
        let actions = evaluator.evaluate(&gate, &without).actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].label, "Add Room");

        let with = ProjectAggregate::new("P-1")
            .with_relation("rooms", vec![record([("name", json!("Kitchen"))])]);
        assert!(evaluator.evaluate(&gate, &with).actions().is_empty());
    }
}
