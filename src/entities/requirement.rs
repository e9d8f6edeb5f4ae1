//! Gate requirement entity type

use serde::{Deserialize, Serialize};

/// Requirement kind - selects which evaluation rule applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    /// Field on the target model must hold a value
    FieldNotNull,
    /// Field on the target model must equal `target_value`
    FieldEquals,
    /// Field on the target model must be numerically greater than `target_value`
    FieldGreaterThan,
    /// Named child collection must be non-empty
    RelationExists,
    /// Size of the named child collection compared with `target_value`
    RelationCount,
    /// Every item of the named collection must have `target_field == target_value`
    AllChildrenPass,
    /// Delegates to a registered custom check
    CustomCheck,
    /// A document of type `target_value` is attached to the project
    DocumentUploaded,
    /// The deposit or final payment named by `target_value` is recorded on the first order
    PaymentReceived,
    /// A task of type `target_value` is done
    TaskCompleted,
    /// Every CNC program is complete
    AllCncComplete,
}

impl std::fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequirementKind::FieldNotNull => write!(f, "field_not_null"),
            RequirementKind::FieldEquals => write!(f, "field_equals"),
            RequirementKind::FieldGreaterThan => write!(f, "field_greater_than"),
            RequirementKind::RelationExists => write!(f, "relation_exists"),
            RequirementKind::RelationCount => write!(f, "relation_count"),
            RequirementKind::AllChildrenPass => write!(f, "all_children_pass"),
            RequirementKind::CustomCheck => write!(f, "custom_check"),
            RequirementKind::DocumentUploaded => write!(f, "document_uploaded"),
            RequirementKind::PaymentReceived => write!(f, "payment_received"),
            RequirementKind::TaskCompleted => write!(f, "task_completed"),
            RequirementKind::AllCncComplete => write!(f, "all_cnc_complete"),
        }
    }
}

/// Comparison operator used by count comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    GreaterOrEqual,
    Greater,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::GreaterOrEqual => ">=",
            ComparisonOperator::Greater => ">",
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "!=",
            ComparisonOperator::Less => "<",
            ComparisonOperator::LessOrEqual => "<=",
        }
    }

    /// Apply `actual <op> expected`
    pub fn holds<T: PartialOrd>(&self, actual: T, expected: T) -> bool {
        match self {
            ComparisonOperator::GreaterOrEqual => actual >= expected,
            ComparisonOperator::Greater => actual > expected,
            ComparisonOperator::Equal => actual == expected,
            ComparisonOperator::NotEqual => actual != expected,
            ComparisonOperator::Less => actual < expected,
            ComparisonOperator::LessOrEqual => actual <= expected,
        }
    }
}

impl std::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ComparisonOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">=" => Ok(ComparisonOperator::GreaterOrEqual),
            ">" => Ok(ComparisonOperator::Greater),
            "=" | "==" => Ok(ComparisonOperator::Equal),
            "!=" | "<>" => Ok(ComparisonOperator::NotEqual),
            "<" => Ok(ComparisonOperator::Less),
            "<=" => Ok(ComparisonOperator::LessOrEqual),
            other => Err(format!("Unknown comparison operator: {}", other)),
        }
    }
}

/// Remediation action shown next to a failed requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub label: String,
    pub route: String,
}

/// One testable condition belonging to a gate
///
/// Only the fields relevant to `kind` are read; the others are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRequirement {
    /// Requirement kind
    #[serde(rename = "requirement_type")]
    pub kind: RequirementKind,

    /// Model the field is read from (Project, SalesOrder, Partner, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_relation: Option<String>,

    /// Expected value or threshold; may be written as a string, number or bool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<serde_json::Value>,

    /// Raw operator text; parsed at evaluation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_operator: Option<String>,

    /// Registry key of the custom check
    #[serde(
        default,
        alias = "custom_check",
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_check_identifier: Option<String>,

    /// Message shown when the requirement is not met
    pub error_message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_route: Option<String>,

    /// Ordering within the gate
    #[serde(default)]
    pub sequence: u32,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl GateRequirement {
    /// Create a requirement of the given kind with only the message set
    pub fn new(kind: RequirementKind, error_message: impl Into<String>) -> Self {
        Self {
            kind,
            target_model: None,
            target_field: None,
            target_relation: None,
            target_value: None,
            comparison_operator: None,
            custom_check_identifier: None,
            error_message: error_message.into(),
            help_text: None,
            action_label: None,
            action_route: None,
            sequence: 0,
            is_active: true,
        }
    }

    /// Remediation action, when both label and route are configured
    pub fn action(&self) -> Option<RemediationAction> {
        match (&self.action_label, &self.action_route) {
            (Some(label), Some(route)) => Some(RemediationAction {
                label: label.clone(),
                route: route.clone(),
            }),
            _ => None,
        }
    }

    /// Short label for logs, e.g. `relation_exists#4`
    pub fn label(&self) -> String {
        format!("{}#{}", self.kind, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_parse_and_apply() {
        let op: ComparisonOperator = ">=".parse().unwrap();
        assert!(op.holds(1, 1));
        assert!(!op.holds(0, 1));
        assert!("=".parse::<ComparisonOperator>().unwrap().holds(3, 3));
        assert!("<".parse::<ComparisonOperator>().unwrap().holds(2, 3));
        assert!("~".parse::<ComparisonOperator>().is_err());
    }

    #[test]
    fn test_requirement_from_yaml() {
        let yaml = r#"
requirement_type: relation_count
target_model: Project
target_relation: bom_lines
target_value: "1"
comparison_operator: ">="
error_message: BOM not generated
action_label: Generate BOM
action_route: filament.projects.resources.projects.edit
sequence: 2
"#;
        let req: GateRequirement = serde_yml::from_str(yaml).unwrap();
        assert_eq!(req.kind, RequirementKind::RelationCount);
        assert!(req.is_active);
        assert_eq!(req.action().unwrap().label, "Generate BOM");
        assert_eq!(req.label(), "relation_count#2");
    }

    #[test]
    fn test_custom_check_alias() {
        let yaml = "requirement_type: custom_check\ncustom_check: deposit_received\nerror_message: x\n";
        let req: GateRequirement = serde_yml::from_str(yaml).unwrap();
        assert_eq!(req.custom_check_identifier.as_deref(), Some("deposit_received"));
        assert!(req.action().is_none());
    }
}
