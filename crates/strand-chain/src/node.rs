use serde::{Deserialize, Serialize};

use crate::condition::ChainCondition;
use crate::task::Task;

/// A single step in a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainNode {
  pub id: String,
  #[serde(flatten)]
  pub kind: NodeKind,
}

/// The type-specific payload of a node.
///
/// Tagged so the wire form carries a `type` discriminator next to the fields
/// of exactly one variant, instead of a bag of optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
  #[serde(rename_all = "camelCase")]
  Task {
    task: Task,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_node_id: Option<String>,
  },
  #[serde(rename_all = "camelCase")]
  Condition {
    condition: ChainCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    true_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    false_branch: Option<String>,
  },
  /// Repeats the body subgraph rooted at `body_node_id`, either a fixed
  /// number of times or while `loop_condition` holds. Exactly one of
  /// `loop_count` / `loop_condition` must be set (enforced by validation).
  #[serde(rename_all = "camelCase")]
  Loop {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    loop_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    loop_condition: Option<ChainCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body_node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_node_id: Option<String>,
  },
}

impl ChainNode {
  /// Every node id this node links to directly.
  pub fn successors(&self) -> Vec<&str> {
    match &self.kind {
      NodeKind::Task { next_node_id, .. } => next_node_id.iter().map(String::as_str).collect(),
      NodeKind::Condition {
        true_branch,
        false_branch,
        ..
      } => true_branch
        .iter()
        .chain(false_branch.iter())
        .map(String::as_str)
        .collect(),
      NodeKind::Loop {
        body_node_id,
        next_node_id,
        ..
      } => body_node_id
        .iter()
        .chain(next_node_id.iter())
        .map(String::as_str)
        .collect(),
    }
  }

  /// A node with no successor links of any kind ends the chain.
  pub fn is_terminal(&self) -> bool {
    self.successors().is_empty()
  }
}
