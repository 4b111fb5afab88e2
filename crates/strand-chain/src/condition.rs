use serde::{Deserialize, Serialize};

/// Comparator applied by a condition against the execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
  Equals,
  NotEquals,
  GreaterThan,
  LessThan,
  Contains,
  Exists,
}

/// A runtime predicate over accumulated node results.
///
/// `field` is a dotted path into the execution context, e.g. `result.status`.
/// `value` is the comparison operand; it is ignored for `exists`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainCondition {
  #[serde(rename = "type")]
  pub condition_type: ConditionType,
  pub field: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<serde_json::Value>,
}

impl ChainCondition {
  pub fn new(
    condition_type: ConditionType,
    field: impl Into<String>,
    value: Option<serde_json::Value>,
  ) -> Self {
    Self {
      condition_type,
      field: field.into(),
      value,
    }
  }
}
