//! Custom checks - named predicates for rules the declarative kinds cannot express
//!
//! Checks are registered once under a stable key and looked up by the
//! `custom_check_identifier` of a requirement. The registry is read-only
//! after startup, so checks must be `Send + Sync`.

mod builtin;

use std::collections::BTreeMap;

use crate::entities::ProjectAggregate;
use crate::gates::error::{CheckError, DuplicateCheck};

/// Registry key of the built-in CNC check, also used by the `all_cnc_complete` kind
pub const ALL_CNC_PROGRAMS_COMPLETE: &str = "all_cnc_programs_complete";

/// Result of a custom check that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub passed: bool,
    pub detail: Option<String>,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            detail: None,
        }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: Some(detail.into()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Pass or fail from a condition, with the same detail either way
    pub fn from_bool(passed: bool, detail: impl Into<String>) -> Self {
        Self {
            passed,
            detail: Some(detail.into()),
        }
    }
}

/// A named predicate over a project aggregate
pub trait CustomCheck: Send + Sync {
    fn evaluate(&self, project: &ProjectAggregate) -> Result<CheckOutcome, CheckError>;
}

impl<F> CustomCheck for F
where
    F: Fn(&ProjectAggregate) -> Result<CheckOutcome, CheckError> + Send + Sync,
{
    fn evaluate(&self, project: &ProjectAggregate) -> Result<CheckOutcome, CheckError> {
        self(project)
    }
}

/// Custom checks by key
#[derive(Default)]
pub struct CustomCheckRegistry {
    checks: BTreeMap<String, Box<dyn CustomCheck>>,
}

impl CustomCheckRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in check
    pub fn with_builtin_checks() -> Self {
        let mut registry = Self::new();
        for (key, check) in builtin::all() {
            // keys in builtin::all() are distinct
            registry.checks.insert(key.to_string(), check);
        }
        registry
    }

    /// Register a check; a key can only be registered once
    pub fn register(
        &mut self,
        key: impl Into<String>,
        check: impl CustomCheck + 'static,
    ) -> Result<(), DuplicateCheck> {
        let key = key.into();
        if self.checks.contains_key(&key) {
            return Err(DuplicateCheck(key));
        }
        self.checks.insert(key, Box::new(check));
        Ok(())
    }

    /// Register a closure as a check
    pub fn register_fn<F>(&mut self, key: impl Into<String>, check: F) -> Result<(), DuplicateCheck>
    where
        F: Fn(&ProjectAggregate) -> Result<CheckOutcome, CheckError> + Send + Sync + 'static,
    {
        self.register(key, check)
    }

    pub fn resolve(&self, key: &str) -> Option<&dyn CustomCheck> {
        self.checks.get(key).map(|c| c.as_ref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.checks.contains_key(key)
    }

    /// Registered keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl std::fmt::Debug for CustomCheckRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomCheckRegistry")
            .field("checks", &self.checks.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_keys() {
        let registry = CustomCheckRegistry::with_builtin_checks();
        for key in [
            "deposit_received",
            "final_payment_received",
            "all_cabinets_dimensioned",
            "all_bom_lines_covered",
            "all_pos_confirmed",
            "all_production_tasks_complete",
            "no_blocking_defects",
            "delivery_date_set",
            "all_cnc_programs_complete",
        ] {
            assert!(registry.contains(key), "missing built-in check {}", key);
        }
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn test_register_closure() {
        let mut registry = CustomCheckRegistry::new();
        registry
            .register_fn("always", |_| Ok(CheckOutcome::pass()))
            .unwrap();

        let check = registry.resolve("always").unwrap();
        let outcome = check.evaluate(&ProjectAggregate::new("P-1")).unwrap();
        assert!(outcome.passed);
        assert!(registry.resolve("never").is_none());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut registry = CustomCheckRegistry::with_builtin_checks();
        let err = registry
            .register_fn("deposit_received", |_| Ok(CheckOutcome::pass()))
            .unwrap_err();
        assert_eq!(err.0, "deposit_received");
    }
}
