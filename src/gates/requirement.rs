//! Requirement evaluation
//!
//! Every requirement produces a result. Bad configuration and failing custom
//! checks are folded into failing results so one broken rule cannot stop a
//! gate from reporting its other requirements.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::entities::{
    ComparisonOperator, GateRequirement, ModelLookup, ProjectAggregate, Record, RequirementKind,
};
use crate::gates::checks::{CustomCheckRegistry, ALL_CNC_PROGRAMS_COMPLETE};
use crate::gates::value::{as_number, display, is_blank, values_match};

/// Why a requirement result came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultTag {
    Passed,
    /// The condition was evaluated and does not hold
    Unmet,
    /// The requirement references something the aggregate does not have,
    /// or is missing settings its kind needs
    ConfigurationError,
    /// A custom check returned an error or panicked
    EvaluationError,
}

impl std::fmt::Display for ResultTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResultTag::Passed => "passed",
            ResultTag::Unmet => "unmet",
            ResultTag::ConfigurationError => "configuration error",
            ResultTag::EvaluationError => "evaluation error",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one requirement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementResult {
    pub requirement: GateRequirement,
    pub passed: bool,
    pub tag: ResultTag,
    /// What the evaluator observed, e.g. `4/5 cabinets have qc_passed = true`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RequirementResult {
    fn new(requirement: &GateRequirement, tag: ResultTag, detail: Option<String>) -> Self {
        Self {
            requirement: requirement.clone(),
            passed: tag == ResultTag::Passed,
            tag,
            detail,
        }
    }

    /// User-facing message: the configured error message when failed
    pub fn message(&self) -> &str {
        if self.passed {
            self.detail.as_deref().unwrap_or("")
        } else {
            &self.requirement.error_message
        }
    }
}

/// Result of the kind-specific rule before it is tagged
enum Outcome {
    Holds(bool, String),
    Misconfigured(String),
    CheckFailed(String),
}

/// Evaluates single requirements against a project aggregate
///
/// A configuration problem is logged at `warn` the first time this evaluator
/// meets it and at `debug` afterwards.
pub struct RequirementEvaluator<'a> {
    checks: &'a CustomCheckRegistry,
    reported: Mutex<HashSet<String>>,
}

impl<'a> RequirementEvaluator<'a> {
    pub fn new(checks: &'a CustomCheckRegistry) -> Self {
        Self {
            checks,
            reported: Mutex::new(HashSet::new()),
        }
    }

    pub fn evaluate(
        &self,
        requirement: &GateRequirement,
        project: &ProjectAggregate,
    ) -> RequirementResult {
        let outcome = match requirement.kind {
            RequirementKind::FieldNotNull => field_not_null(requirement, project),
            RequirementKind::FieldEquals => field_equals(requirement, project),
            RequirementKind::FieldGreaterThan => field_greater_than(requirement, project),
            RequirementKind::RelationExists => relation_exists(requirement, project),
            RequirementKind::RelationCount => relation_count(requirement, project),
            RequirementKind::AllChildrenPass => all_children_pass(requirement, project),
            RequirementKind::CustomCheck => self.custom_check(requirement, project),
            RequirementKind::DocumentUploaded => document_uploaded(requirement, project),
            RequirementKind::PaymentReceived => payment_received(requirement, project),
            RequirementKind::TaskCompleted => task_completed(requirement, project),
            RequirementKind::AllCncComplete => self.run_check(ALL_CNC_PROGRAMS_COMPLETE, project),
        };

        match outcome {
            Outcome::Holds(true, detail) => {
                RequirementResult::new(requirement, ResultTag::Passed, Some(detail))
            }
            Outcome::Holds(false, detail) => {
                RequirementResult::new(requirement, ResultTag::Unmet, Some(detail))
            }
            Outcome::Misconfigured(problem) => {
                let label = requirement.label();
                if self.first_report(format!("{}: {}", label, problem)) {
                    warn!(project_id = %project.id, requirement = %label, %problem, "requirement misconfigured");
                } else {
                    debug!(project_id = %project.id, requirement = %label, %problem, "requirement misconfigured");
                }
                RequirementResult::new(requirement, ResultTag::ConfigurationError, Some(problem))
            }
            Outcome::CheckFailed(problem) => {
                error!(
                    project_id = %project.id,
                    requirement = %requirement.label(),
                    check = check_key(requirement),
                    %problem,
                    "custom check failed"
                );
                RequirementResult::new(requirement, ResultTag::EvaluationError, Some(problem))
            }
        }
    }

    /// True only the first time `key` is reported by this evaluator
    fn first_report(&self, key: String) -> bool {
        match self.reported.lock() {
            Ok(mut seen) => seen.insert(key),
            Err(_) => true,
        }
    }

    fn custom_check(&self, requirement: &GateRequirement, project: &ProjectAggregate) -> Outcome {
        match setting(&requirement.custom_check_identifier) {
            Some(key) => self.run_check(key, project),
            None => Outcome::Misconfigured("no custom_check_identifier".into()),
        }
    }

    fn run_check(&self, key: &str, project: &ProjectAggregate) -> Outcome {
        let Some(check) = self.checks.resolve(key) else {
            return Outcome::Misconfigured(format!("custom check '{}' is not registered", key));
        };

        match catch_unwind(AssertUnwindSafe(|| check.evaluate(project))) {
            Ok(Ok(outcome)) => {
                let detail = outcome.detail.unwrap_or_else(|| key.to_string());
                Outcome::Holds(outcome.passed, detail)
            }
            Ok(Err(e)) => Outcome::CheckFailed(e.to_string()),
            Err(payload) => Outcome::CheckFailed(format!("panicked: {}", panic_message(&payload))),
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Registry key a check-backed requirement runs
fn check_key(requirement: &GateRequirement) -> &str {
    match requirement.kind {
        RequirementKind::AllCncComplete => ALL_CNC_PROGRAMS_COMPLETE,
        _ => requirement.custom_check_identifier.as_deref().unwrap_or(""),
    }
}

/// A string setting that is present and not blank
fn setting(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Read `target_field` off `target_model`
///
/// `Err` carries the final outcome when there is nothing to compare: an
/// empty backing relation is unmet, a missing model or field is misconfigured.
fn target_field<'p>(
    requirement: &GateRequirement,
    project: &'p ProjectAggregate,
) -> Result<(&'p Value, String), Outcome> {
    let Some(field) = setting(&requirement.target_field) else {
        return Err(Outcome::Misconfigured("no target_field".into()));
    };
    let model = setting(&requirement.target_model).unwrap_or("Project");

    let record = match project.model(Some(model)) {
        ModelLookup::Found(record) => record,
        ModelLookup::Empty(_) => {
            return Err(Outcome::Holds(false, format!("no {} record", model)));
        }
        ModelLookup::Unknown(relation) => {
            return Err(Outcome::Misconfigured(format!(
                "model '{}' needs relation '{}', which is not loaded",
                model, relation
            )));
        }
    };

    match record.get(field) {
        Some(value) => Ok((value, format!("{}.{}", model, field))),
        None => Err(Outcome::Misconfigured(format!(
            "field '{}' is not present on {}",
            field, model
        ))),
    }
}

fn target_value(requirement: &GateRequirement) -> Result<&Value, Outcome> {
    requirement
        .target_value
        .as_ref()
        .filter(|v| !v.is_null())
        .ok_or_else(|| Outcome::Misconfigured("no target_value".into()))
}

fn target_relation<'p>(
    requirement: &GateRequirement,
    project: &'p ProjectAggregate,
) -> Result<(&'p [Record], &'p str), Outcome> {
    let Some(name) = setting(&requirement.target_relation) else {
        return Err(Outcome::Misconfigured("no target_relation".into()));
    };
    match project.relations.get_key_value(name) {
        Some((key, rows)) => Ok((rows.as_slice(), key.as_str())),
        None => Err(Outcome::Misconfigured(format!(
            "relation '{}' is not loaded",
            name
        ))),
    }
}

fn field_not_null(requirement: &GateRequirement, project: &ProjectAggregate) -> Outcome {
    match target_field(requirement, project) {
        Ok((value, label)) => {
            let set = !is_blank(value);
            Outcome::Holds(set, format!("{} is {}", label, if set { "set" } else { "empty" }))
        }
        Err(outcome) => outcome,
    }
}

fn field_equals(requirement: &GateRequirement, project: &ProjectAggregate) -> Outcome {
    let expected = match target_value(requirement) {
        Ok(v) => v,
        Err(outcome) => return outcome,
    };
    match target_field(requirement, project) {
        Ok((value, label)) => Outcome::Holds(
            values_match(value, expected),
            format!("{} = {} (expected {})", label, display(value), display(expected)),
        ),
        Err(outcome) => outcome,
    }
}

fn field_greater_than(requirement: &GateRequirement, project: &ProjectAggregate) -> Outcome {
    let threshold = match target_value(requirement).map(as_number) {
        Ok(Some(n)) => n,
        Ok(None) => return Outcome::Misconfigured("target_value is not numeric".into()),
        Err(outcome) => return outcome,
    };
    match target_field(requirement, project) {
        Ok((value, label)) => match as_number(value) {
            Some(actual) => Outcome::Holds(
                actual > threshold,
                format!("{} = {} (must exceed {})", label, actual, threshold),
            ),
            None => Outcome::Holds(false, format!("{} = {} is not a number", label, display(value))),
        },
        Err(outcome) => outcome,
    }
}

fn relation_exists(requirement: &GateRequirement, project: &ProjectAggregate) -> Outcome {
    match target_relation(requirement, project) {
        Ok((rows, name)) => Outcome::Holds(!rows.is_empty(), format!("{} {}", rows.len(), name)),
        Err(outcome) => outcome,
    }
}

fn relation_count(requirement: &GateRequirement, project: &ProjectAggregate) -> Outcome {
    let op: ComparisonOperator = match setting(&requirement.comparison_operator) {
        Some(raw) => match raw.parse() {
            Ok(op) => op,
            Err(e) => return Outcome::Misconfigured(e),
        },
        None => return Outcome::Misconfigured("no comparison_operator".into()),
    };
    let expected = match target_value(requirement).map(as_number) {
        Ok(Some(n)) => n,
        Ok(None) => return Outcome::Misconfigured("target_value is not numeric".into()),
        Err(outcome) => return outcome,
    };

    match target_relation(requirement, project) {
        Ok((rows, name)) => {
            let count = rows.len();
            Outcome::Holds(
                op.holds(count as f64, expected),
                format!("{} {} (required {} {})", count, name, op, expected),
            )
        }
        Err(outcome) => outcome,
    }
}

fn all_children_pass(requirement: &GateRequirement, project: &ProjectAggregate) -> Outcome {
    let Some(field) = setting(&requirement.target_field) else {
        return Outcome::Misconfigured("no target_field".into());
    };
    let expected = match target_value(requirement) {
        Ok(v) => v,
        Err(outcome) => return outcome,
    };
    let (rows, name) = match target_relation(requirement, project) {
        Ok(found) => found,
        Err(outcome) => return outcome,
    };

    if rows.is_empty() {
        return Outcome::Holds(false, format!("No {} found to check", name));
    }

    // a child without the field does not satisfy it
    let passing = rows
        .iter()
        .filter(|row| row.get(field).is_some_and(|v| values_match(v, expected)))
        .count();

    Outcome::Holds(
        passing == rows.len(),
        format!(
            "{}/{} {} have {} = {}",
            passing,
            rows.len(),
            name,
            field,
            display(expected)
        ),
    )
}

/// `target_value` as trimmed text
fn target_text(requirement: &GateRequirement) -> Result<String, Outcome> {
    let text = display(target_value(requirement)?).trim().to_string();
    if text.is_empty() {
        Err(Outcome::Misconfigured("no target_value".into()))
    } else {
        Ok(text)
    }
}

/// A relation named by `target_relation`, or `default` when none is configured
fn relation_or<'p>(
    requirement: &GateRequirement,
    project: &'p ProjectAggregate,
    default: &str,
) -> Result<&'p [Record], Outcome> {
    let name = setting(&requirement.target_relation).unwrap_or(default);
    project
        .relation(name)
        .ok_or_else(|| Outcome::Misconfigured(format!("relation '{}' is not loaded", name)))
}

fn text_is(row: &Record, field: &str, expected: &str) -> bool {
    row.get(field)
        .is_some_and(|v| !is_blank(v) && display(v).trim() == expected)
}

fn document_uploaded(requirement: &GateRequirement, project: &ProjectAggregate) -> Outcome {
    let doc_type = match target_text(requirement) {
        Ok(t) => t,
        Err(outcome) => return outcome,
    };
    let documents = match relation_or(requirement, project, "documents") {
        Ok(rows) => rows,
        Err(outcome) => return outcome,
    };

    let field = setting(&requirement.target_field).unwrap_or("collection");
    let found = documents.iter().any(|doc| text_is(doc, field, &doc_type));
    let state = if found { "uploaded" } else { "not found" };
    Outcome::Holds(found, format!("Document type '{}' is {}", doc_type, state))
}

fn payment_received(requirement: &GateRequirement, project: &ProjectAggregate) -> Outcome {
    let payment = match target_text(requirement) {
        Ok(t) => t,
        Err(outcome) => return outcome,
    };
    let field = match payment.as_str() {
        "deposit" => "deposit_paid_at",
        "final" => "final_paid_at",
        other => {
            return Outcome::Misconfigured(format!(
                "payment '{}' is neither 'deposit' nor 'final'",
                other
            ))
        }
    };
    let orders = match relation_or(requirement, project, "orders") {
        Ok(rows) => rows,
        Err(outcome) => return outcome,
    };

    let Some(order) = orders.first() else {
        return Outcome::Holds(false, "No sales order found".into());
    };
    let paid = order.get(field).is_some_and(|v| !is_blank(v));
    let state = if paid { "received" } else { "not received" };
    Outcome::Holds(paid, format!("Payment '{}' {}", payment, state))
}

fn task_completed(requirement: &GateRequirement, project: &ProjectAggregate) -> Outcome {
    let task_type = match target_text(requirement) {
        Ok(t) => t,
        Err(outcome) => return outcome,
    };
    let tasks = match relation_or(requirement, project, "tasks") {
        Ok(rows) => rows,
        Err(outcome) => return outcome,
    };

    let done = tasks
        .iter()
        .any(|task| text_is(task, "task_type", &task_type) && text_is(task, "state", "done"));
    let state = if done { "completed" } else { "not completed" };
    Outcome::Holds(done, format!("Task type '{}' is {}", task_type, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::record;
    use crate::gates::checks::CheckOutcome;
    use crate::gates::error::CheckError;
    use serde_json::json;

    fn requirement(kind: RequirementKind) -> GateRequirement {
        GateRequirement::new(kind, "requirement not met")
    }

    fn eval(req: &GateRequirement, project: &ProjectAggregate) -> RequirementResult {
        let registry = CustomCheckRegistry::with_builtin_checks();
        RequirementEvaluator::new(&registry).evaluate(req, project)
    }

    fn cabinets(passed: &[bool]) -> ProjectAggregate {
        let rows = passed
            .iter()
            .enumerate()
            .map(|(i, p)| record([("id", json!(i + 1)), ("qc_passed", json!(p))]))
            .collect();
        ProjectAggregate::new("P-1").with_relation("cabinets", rows)
    }

    fn qc_requirement() -> GateRequirement {
        let mut req = requirement(RequirementKind::AllChildrenPass);
        req.target_relation = Some("cabinets".into());
        req.target_field = Some("qc_passed".into());
        req.target_value = Some(json!("true"));
        req
    }

    #[test]
    fn test_field_not_null() {
        let mut req = requirement(RequirementKind::FieldNotNull);
        req.target_field = Some("partner_id".into());

        let set = ProjectAggregate::new("P-1").with_field("partner_id", json!(42));
        assert!(eval(&req, &set).passed);

        let null = ProjectAggregate::new("P-1").with_field("partner_id", Value::Null);
        let result = eval(&req, &null);
        assert!(!result.passed);
        assert_eq!(result.tag, ResultTag::Unmet);
        assert_eq!(result.message(), "requirement not met");

        let empty = ProjectAggregate::new("P-1").with_field("partner_id", json!(""));
        assert!(!eval(&req, &empty).passed);
    }

    #[test]
    fn test_absent_field_is_configuration_error() {
        let mut req = requirement(RequirementKind::FieldNotNull);
        req.target_field = Some("nonexistent_column".into());

        let result = eval(&req, &ProjectAggregate::new("P-1"));
        assert!(!result.passed);
        assert_eq!(result.tag, ResultTag::ConfigurationError);
    }

    #[test]
    fn test_field_on_sales_order() {
        let mut req = requirement(RequirementKind::FieldNotNull);
        req.target_model = Some("SalesOrder".into());
        req.target_field = Some("deposit_paid_at".into());

        let project = ProjectAggregate::new("P-1").with_relation(
            "orders",
            vec![record([("deposit_paid_at", json!("2024-03-01"))])],
        );
        assert!(eval(&req, &project).passed);

        let no_orders = ProjectAggregate::new("P-1").with_relation("orders", vec![]);
        assert_eq!(eval(&req, &no_orders).tag, ResultTag::Unmet);

        let unknown = ProjectAggregate::new("P-1");
        assert_eq!(eval(&req, &unknown).tag, ResultTag::ConfigurationError);
    }

    #[test]
    fn test_field_equals_and_greater_than() {
        let project = ProjectAggregate::new("P-1")
            .with_field("state", json!("approved"))
            .with_field("total", json!(1200));

        let mut equals = requirement(RequirementKind::FieldEquals);
        equals.target_field = Some("state".into());
        equals.target_value = Some(json!("approved"));
        assert!(eval(&equals, &project).passed);

        let mut greater = requirement(RequirementKind::FieldGreaterThan);
        greater.target_field = Some("total".into());
        greater.target_value = Some(json!("1000"));
        assert!(eval(&greater, &project).passed);

        greater.target_value = Some(json!(1200));
        assert!(!eval(&greater, &project).passed);
    }

    #[test]
    fn test_relation_exists() {
        let mut req = requirement(RequirementKind::RelationExists);
        req.target_relation = Some("rooms".into());

        let with_room = ProjectAggregate::new("P-1")
            .with_relation("rooms", vec![record([("name", json!("Kitchen"))])]);
        assert!(eval(&req, &with_room).passed);

        let no_rooms = ProjectAggregate::new("P-1").with_relation("rooms", vec![]);
        assert_eq!(eval(&req, &no_rooms).tag, ResultTag::Unmet);

        assert_eq!(
            eval(&req, &ProjectAggregate::new("P-1")).tag,
            ResultTag::ConfigurationError
        );
    }

    #[test]
    fn test_relation_count_at_least_one() {
        let mut req = requirement(RequirementKind::RelationCount);
        req.target_relation = Some("bom_lines".into());
        req.comparison_operator = Some(">=".into());
        req.target_value = Some(json!("1"));

        for count in 0..4 {
            let rows = (0..count).map(|i| record([("id", json!(i))])).collect();
            let project = ProjectAggregate::new("P-1").with_relation("bom_lines", rows);
            assert_eq!(eval(&req, &project).passed, count >= 1, "count {}", count);
        }
    }

    #[test]
    fn test_relation_count_bad_operator() {
        let mut req = requirement(RequirementKind::RelationCount);
        req.target_relation = Some("bom_lines".into());
        req.comparison_operator = Some("~".into());
        req.target_value = Some(json!(1));

        let project = ProjectAggregate::new("P-1").with_relation("bom_lines", vec![]);
        assert_eq!(eval(&req, &project).tag, ResultTag::ConfigurationError);

        req.comparison_operator = None;
        assert_eq!(eval(&req, &project).tag, ResultTag::ConfigurationError);
    }

    #[test]
    fn test_all_children_pass() {
        let result = eval(&qc_requirement(), &cabinets(&[true, true, true, true, false]));
        assert!(!result.passed);
        assert_eq!(result.detail.as_deref(), Some("4/5 cabinets have qc_passed = true"));

        assert!(eval(&qc_requirement(), &cabinets(&[true; 5])).passed);
    }

    #[test]
    fn test_all_children_pass_empty_fails() {
        let result = eval(&qc_requirement(), &cabinets(&[]));
        assert!(!result.passed);
        assert_eq!(result.tag, ResultTag::Unmet);
        assert_eq!(result.detail.as_deref(), Some("No cabinets found to check"));
    }

    #[test]
    fn test_custom_check_errors_are_contained() {
        let mut registry = CustomCheckRegistry::new();
        registry
            .register_fn("broken", |_| Err(CheckError::Failed("ledger offline".into())))
            .unwrap();
        registry
            .register_fn("panics", |_| panic!("boom"))
            .unwrap();
        let evaluator = RequirementEvaluator::new(&registry);
        let project = ProjectAggregate::new("P-1");

        let mut req = requirement(RequirementKind::CustomCheck);
        req.custom_check_identifier = Some("broken".into());
        let result = evaluator.evaluate(&req, &project);
        assert_eq!(result.tag, ResultTag::EvaluationError);
        assert_eq!(result.detail.as_deref(), Some("ledger offline"));

        req.custom_check_identifier = Some("panics".into());
        let result = evaluator.evaluate(&req, &project);
        assert_eq!(result.tag, ResultTag::EvaluationError);
        assert!(result.detail.unwrap().contains("boom"));

        req.custom_check_identifier = Some("missing".into());
        assert_eq!(
            evaluator.evaluate(&req, &project).tag,
            ResultTag::ConfigurationError
        );
    }

    #[test]
    fn test_custom_check_outcome() {
        let mut registry = CustomCheckRegistry::new();
        registry
            .register_fn("flag", |p| {
                Ok(CheckOutcome::from_bool(p.field("flag").is_some(), "flag present"))
            })
            .unwrap();
        let evaluator = RequirementEvaluator::new(&registry);

        let mut req = requirement(RequirementKind::CustomCheck);
        req.custom_check_identifier = Some("flag".into());

        let project = ProjectAggregate::new("P-1").with_field("flag", json!(true));
        assert!(evaluator.evaluate(&req, &project).passed);
        assert!(!evaluator.evaluate(&req, &ProjectAggregate::new("P-1")).passed);
    }

    fn with_target(kind: RequirementKind, value: Value) -> GateRequirement {
        let mut req = requirement(kind);
        req.target_value = Some(value);
        req
    }

    #[test]
    fn test_document_uploaded() {
        let req = with_target(RequirementKind::DocumentUploaded, json!("signed_contract"));
        let project = ProjectAggregate::new("P-1").with_relation(
            "documents",
            vec![
                record([("name", json!("floor.pdf")), ("collection", json!("floor_plans"))]),
                record([("name", json!("contract.pdf")), ("collection", json!("signed_contract"))]),
            ],
        );
        let result = eval(&req, &project);
        assert!(result.passed);
        assert_eq!(
            result.detail.as_deref(),
            Some("Document type 'signed_contract' is uploaded")
        );

        let other = with_target(RequirementKind::DocumentUploaded, json!("site_photos"));
        let result = eval(&other, &project);
        assert_eq!(result.tag, ResultTag::Unmet);
        assert_eq!(result.detail.as_deref(), Some("Document type 'site_photos' is not found"));

        let no_docs = ProjectAggregate::new("P-1");
        assert_eq!(eval(&req, &no_docs).tag, ResultTag::ConfigurationError);
        assert_eq!(
            eval(&requirement(RequirementKind::DocumentUploaded), &project).tag,
            ResultTag::ConfigurationError
        );
    }

    #[test]
    fn test_payment_received() {
        let project = ProjectAggregate::new("P-1").with_relation(
            "orders",
            vec![
                record([("deposit_paid_at", json!("2024-03-01")), ("final_paid_at", json!(null))]),
                record([("final_paid_at", json!("2024-06-01"))]),
            ],
        );

        let deposit = with_target(RequirementKind::PaymentReceived, json!("deposit"));
        let result = eval(&deposit, &project);
        assert!(result.passed);
        assert_eq!(result.detail.as_deref(), Some("Payment 'deposit' received"));

        // only the first order counts
        let last = with_target(RequirementKind::PaymentReceived, json!("final"));
        let result = eval(&last, &project);
        assert!(!result.passed);
        assert_eq!(result.detail.as_deref(), Some("Payment 'final' not received"));

        let no_orders = ProjectAggregate::new("P-1").with_relation("orders", vec![]);
        let result = eval(&deposit, &no_orders);
        assert_eq!(result.tag, ResultTag::Unmet);
        assert_eq!(result.detail.as_deref(), Some("No sales order found"));

        let refund = with_target(RequirementKind::PaymentReceived, json!("refund"));
        assert_eq!(eval(&refund, &project).tag, ResultTag::ConfigurationError);
    }

    #[test]
    fn test_task_completed() {
        let req = with_target(RequirementKind::TaskCompleted, json!("site_measure"));
        let task = |task_type: &str, state: &str| {
            record([("task_type", json!(task_type)), ("state", json!(state))])
        };

        let open = ProjectAggregate::new("P-1").with_relation(
            "tasks",
            vec![task("site_measure", "open"), task("design_review", "done")],
        );
        let result = eval(&req, &open);
        assert!(!result.passed);
        assert_eq!(result.detail.as_deref(), Some("Task type 'site_measure' is not completed"));

        let done = ProjectAggregate::new("P-1").with_relation(
            "tasks",
            vec![task("site_measure", "open"), task("site_measure", "done")],
        );
        let result = eval(&req, &done);
        assert!(result.passed);
        assert_eq!(result.detail.as_deref(), Some("Task type 'site_measure' is completed"));

        assert_eq!(
            eval(&req, &ProjectAggregate::new("P-1")).tag,
            ResultTag::ConfigurationError
        );
    }

    #[test]
    fn test_all_cnc_complete_runs_cnc_check() {
        let req = requirement(RequirementKind::AllCncComplete);
        let programs = |statuses: &[&str]| {
            let rows = statuses
                .iter()
                .enumerate()
                .map(|(i, s)| record([("name", json!(format!("NC-{}", i + 1))), ("status", json!(s))]))
                .collect();
            ProjectAggregate::new("P-1").with_relation("cnc_programs", rows)
        };

        assert!(eval(&req, &programs(&["complete", "complete"])).passed);

        let pending = eval(&req, &programs(&["complete", "queued"]));
        assert_eq!(pending.tag, ResultTag::Unmet);
        assert!(pending.detail.unwrap().contains("NC-2"));

        let unloaded = eval(&req, &ProjectAggregate::new("P-1"));
        assert_eq!(unloaded.tag, ResultTag::EvaluationError);

        let empty_registry = CustomCheckRegistry::new();
        let result = RequirementEvaluator::new(&empty_registry).evaluate(&req, &programs(&[]));
        assert_eq!(result.tag, ResultTag::ConfigurationError);
    }

    #[test]
    fn test_configuration_problem_reported_once() {
        let registry = CustomCheckRegistry::with_builtin_checks();
        let evaluator = RequirementEvaluator::new(&registry);
        let mut req = requirement(RequirementKind::FieldNotNull);
        req.target_field = Some("nonexistent_column".into());

        for _ in 0..3 {
            let result = evaluator.evaluate(&req, &ProjectAggregate::new("P-1"));
            assert_eq!(result.tag, ResultTag::ConfigurationError);
        }
        assert_eq!(evaluator.reported.lock().unwrap().len(), 1);

        let repeat = "field_not_null#0: field 'nonexistent_column' is not present on Project";
        assert!(!evaluator.first_report(repeat.to_string()));
        assert!(evaluator.first_report("relation_exists#2: relation 'photos' is not loaded".to_string()));
    }
}
