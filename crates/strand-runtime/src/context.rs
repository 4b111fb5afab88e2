//! Execution context.
//!
//! The accumulated, path-addressable view of prior node results. This module
//! is the only place that interprets the structure of task outcomes; the
//! rest of the engine treats them as opaque values.

use serde_json::{Map, Value};

/// Key under which the most recent task outcome is addressable, so that
/// conditions can say `result.status` without naming a node.
const LATEST_RESULT_KEY: &str = "result";

/// Read-only view (for the evaluator) over node outcomes recorded so far.
///
/// Each node's outcome is stored under its node id; the `result` alias
/// tracks the most recent *task* outcome. A node that is revisited in a loop
/// overwrites its earlier entry.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
  values: Map<String, Value>,
}

impl ExecutionContext {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a node outcome under its node id.
  pub fn record(&mut self, node_id: &str, outcome: Value) {
    self.values.insert(node_id.to_string(), outcome);
  }

  /// Record a task outcome: stored under the node id and as the latest
  /// `result`.
  pub fn record_task(&mut self, node_id: &str, outcome: Value) {
    self.values.insert(LATEST_RESULT_KEY.to_string(), outcome.clone());
    self.values.insert(node_id.to_string(), outcome);
  }

  /// Resolve a dotted path. Splits on `.` and walks nested objects; any
  /// missing segment makes the whole path absent.
  pub fn resolve(&self, path: &str) -> Option<&Value> {
    let mut segments = path.split('.');
    let mut current = self.values.get(segments.next()?)?;
    for segment in segments {
      current = current.as_object()?.get(segment)?;
    }
    Some(current)
  }

  /// The full context as a JSON object, handed to task runners.
  pub fn as_value(&self) -> Value {
    Value::Object(self.values.clone())
  }
}
