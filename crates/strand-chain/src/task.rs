use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of work a task performs.
///
/// Opaque to the engine - the injected task runner decides what each variant
/// means (an LLM call, a document-store query, a notification, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
  General,
  AiGeneration,
  DataQuery,
  Notification,
}

/// A unit of work owned by the chain node that references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  pub task_type: TaskType,
  /// Opaque parameter bag handed to the task runner unchanged.
  #[serde(default)]
  pub parameters: HashMap<String, serde_json::Value>,
  /// Scheduling hint, 1 (lowest) to 10 (highest).
  #[serde(default = "default_priority")]
  pub priority: u8,
  /// Informational task-level dependencies; not used for traversal.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub dependencies: Vec<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

fn default_priority() -> u8 {
  5
}

impl Task {
  /// Create a task with defaults for everything but identity and type.
  pub fn new(id: impl Into<String>, name: impl Into<String>, task_type: TaskType) -> Self {
    let now = Utc::now();
    Self {
      id: id.into(),
      name: name.into(),
      description: String::new(),
      task_type,
      parameters: HashMap::new(),
      priority: default_priority(),
      dependencies: Vec::new(),
      created_at: now,
      updated_at: now,
    }
  }
}
