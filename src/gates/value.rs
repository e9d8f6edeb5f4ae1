//! Loose value comparison for requirement targets
//!
//! Target values are configured as text, so `"true"` has to match a stored
//! boolean and `"1"` a stored number.

use serde_json::{Number, Value};

/// Null, or a string that is empty after trimming
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Fold boolean and numeric strings into their typed forms
pub fn normalize(value: &Value) -> Value {
    let Value::String(s) = value else {
        return value.clone();
    };

    let trimmed = s.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(trimmed.to_string()))
}

/// Numeric reading of a value, after normalization; booleans count as 1/0
pub fn as_number(value: &Value) -> Option<f64> {
    match normalize(value) {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Equality after normalization
pub fn values_match(actual: &Value, expected: &Value) -> bool {
    match (normalize(actual), normalize(expected)) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            match (as_number(actual), as_number(expected)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (a, b) => a == b,
    }
}

/// Short human rendering for result details
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank() {
        assert!(is_blank(&Value::Null));
        assert!(is_blank(&json!("")));
        assert!(is_blank(&json!("   ")));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!(false)));
        assert!(!is_blank(&json!("2024-03-01")));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(&json!("true")), json!(true));
        assert_eq!(normalize(&json!("FALSE")), json!(false));
        assert_eq!(normalize(&json!("3")), json!(3.0));
        assert_eq!(normalize(&json!("done")), json!("done"));
        assert_eq!(normalize(&json!("NaN")), json!("NaN"));
    }

    #[test]
    fn test_values_match() {
        assert!(values_match(&json!(true), &json!("true")));
        assert!(values_match(&json!("true"), &json!(true)));
        assert!(values_match(&json!(1), &json!(true)));
        assert!(values_match(&json!(2), &json!("2.0")));
        assert!(values_match(&json!("passed"), &json!("passed")));
        assert!(!values_match(&json!(false), &json!("true")));
        assert!(!values_match(&Value::Null, &json!("true")));
        assert!(!values_match(&json!("abc"), &json!(1)));
    }
}
