//! The injected task-runner capability.

use async_trait::async_trait;
use strand_chain::Task;

/// Failure reported by a task runner. The message is surfaced verbatim in
/// the failing node's result.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
  pub message: String,
}

impl TaskError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Performs the actual work of a task node.
///
/// Supplied by the hosting application; the engine stays domain-agnostic and
/// only sees the returned outcome value. The runner may be long-running -
/// the engine awaits it without blocking other executions, bounds it with
/// the configured per-node timeout, and races it against cancellation.
#[async_trait]
pub trait TaskRunner: Send + Sync {
  /// Run one task against the accumulated execution context.
  async fn run(
    &self,
    task: &Task,
    context: &serde_json::Value,
  ) -> Result<serde_json::Value, TaskError>;
}
