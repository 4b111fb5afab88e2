use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::node::{ChainNode, NodeKind};

/// A named workflow graph with a start node and an id-keyed node table.
///
/// Chains are immutable snapshots during execution. The editor replaces the
/// whole value on save; there are no mutation methods here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskChain {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  pub start_node_id: String,
  #[serde(with = "crate::wire::node_table")]
  pub nodes: HashMap<String, ChainNode>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl TaskChain {
  /// Look up a node by id.
  pub fn node(&self, node_id: &str) -> Option<&ChainNode> {
    self.nodes.get(node_id)
  }

  /// Check the chain's structural invariants.
  ///
  /// Pure and idempotent: the same chain always yields the same result.
  /// Execution refuses to start on a chain that fails here.
  pub fn validate(&self) -> Result<(), ChainError> {
    if self.nodes.is_empty() {
      return Err(ChainError::EmptyChain {
        chain_id: self.id.clone(),
      });
    }

    if !self.nodes.contains_key(&self.start_node_id) {
      return Err(ChainError::DanglingReference {
        referrer: "startNodeId".to_string(),
        target: self.start_node_id.clone(),
      });
    }

    for node in self.nodes.values() {
      if let NodeKind::Loop {
        loop_count,
        loop_condition,
        ..
      } = &node.kind
      {
        if loop_count.is_some() == loop_condition.is_some() {
          return Err(ChainError::InvalidLoopNode {
            node_id: node.id.clone(),
          });
        }
      }

      for target in node.successors() {
        if !self.nodes.contains_key(target) {
          return Err(ChainError::DanglingReference {
            referrer: node.id.clone(),
            target: target.to_string(),
          });
        }
      }
    }

    Ok(())
  }
}
