//! Execution records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a run or of a single node within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  Pending,
  Running,
  Completed,
  Failed,
  Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
  Info,
  Warn,
  Error,
}

/// One entry in a node's append-only audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
  pub timestamp: DateTime<Utc>,
  pub level: LogLevel,
  pub message: String,
}

impl LogEntry {
  pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
    Self {
      timestamp: Utc::now(),
      level,
      message: message.into(),
    }
  }
}

/// Outcome of executing a single node.
///
/// `result` is opaque to the engine; downstream conditions address it
/// through the execution context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
  /// The executor that ran the node.
  pub agent_id: String,
  pub status: RunStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub result: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub logs: Vec<LogEntry>,
  pub started_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<DateTime<Utc>>,
}

/// The record of one chain run.
///
/// Created when execution starts, updated as nodes are visited, and never
/// mutated after `completed_at` is stamped. `execution_path` preserves every
/// visit in wall-clock order (loop iterations repeat); `node_results` keeps
/// the most recent outcome per node id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainExecutionResult {
  pub execution_id: String,
  pub chain_id: String,
  pub status: RunStatus,
  pub execution_path: Vec<String>,
  pub node_results: HashMap<String, NodeResult>,
  pub started_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl ChainExecutionResult {
  /// Fresh record for a run that is about to traverse its first node.
  pub(crate) fn running(execution_id: String, chain_id: String) -> Self {
    Self {
      execution_id,
      chain_id,
      status: RunStatus::Running,
      execution_path: Vec::new(),
      node_results: HashMap::new(),
      started_at: Utc::now(),
      completed_at: None,
      error: None,
    }
  }
}
