//! Condition evaluation.
//!
//! Conditions compare a dotted-path lookup into the execution context against
//! an editor-authored operand. Because the editor authors operands as
//! strings, equality is string-normalized unless both sides are numeric.
//!
//! An absent path evaluates to `false` for every comparator (including
//! `exists`). This is a deliberate permissive default: a chain may reference
//! a field no prior node has produced yet, and should branch rather than
//! abort.

use serde_json::Value;
use strand_chain::{ChainCondition, ConditionType};

use crate::context::ExecutionContext;

/// Evaluation-time error. Surfaced as a node failure, not a panic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
  /// `greater_than` / `less_than` need numeric operands on both sides.
  #[error("ordered comparison on field '{field}' requires numeric operands")]
  NonNumericComparison { field: String },
}

/// Evaluate a condition against the accumulated execution context.
pub fn evaluate_condition(
  condition: &ChainCondition,
  context: &ExecutionContext,
) -> Result<bool, ConditionError> {
  let resolved = context.resolve(&condition.field);

  if condition.condition_type == ConditionType::Exists {
    return Ok(resolved.is_some());
  }

  // Absent path: false, never an error.
  let Some(actual) = resolved else {
    return Ok(false);
  };
  let expected = condition.value.as_ref().unwrap_or(&Value::Null);

  match condition.condition_type {
    ConditionType::Equals => Ok(loose_eq(actual, expected)),
    ConditionType::NotEquals => Ok(!loose_eq(actual, expected)),
    ConditionType::GreaterThan => {
      let (lhs, rhs) = numeric_pair(actual, expected, &condition.field)?;
      Ok(lhs > rhs)
    }
    ConditionType::LessThan => {
      let (lhs, rhs) = numeric_pair(actual, expected, &condition.field)?;
      Ok(lhs < rhs)
    }
    ConditionType::Contains => Ok(contains(actual, expected)),
    ConditionType::Exists => unreachable!("handled above"),
  }
}

/// Numeric view of a value. Numeric strings count, since the editor authors
/// every operand as a string.
fn as_number(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn stringify(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// Numeric comparison when both sides are numeric, string-normalized
/// equality otherwise.
fn loose_eq(actual: &Value, expected: &Value) -> bool {
  if let (Some(lhs), Some(rhs)) = (as_number(actual), as_number(expected)) {
    lhs == rhs
  } else {
    stringify(actual) == stringify(expected)
  }
}

fn numeric_pair(
  actual: &Value,
  expected: &Value,
  field: &str,
) -> Result<(f64, f64), ConditionError> {
  match (as_number(actual), as_number(expected)) {
    (Some(lhs), Some(rhs)) => Ok((lhs, rhs)),
    _ => Err(ConditionError::NonNumericComparison {
      field: field.to_string(),
    }),
  }
}

/// Substring test for strings, membership test for sequences.
fn contains(actual: &Value, expected: &Value) -> bool {
  match (actual, expected) {
    (Value::String(haystack), Value::String(needle)) => haystack.contains(needle),
    (Value::Array(items), _) => items.iter().any(|item| loose_eq(item, expected)),
    _ => false,
  }
}
