use std::collections::HashMap;

use chrono::Utc;

use crate::chain::TaskChain;
use crate::condition::ChainCondition;
use crate::error::ChainError;
use crate::node::{ChainNode, NodeKind};
use crate::task::Task;

/// Construction API for external collaborators (the visual editor).
///
/// Collects nodes, stamps timestamps, and validates on `build`. If no start
/// node is named explicitly, the first node added becomes the start.
pub struct ChainBuilder {
  id: String,
  name: String,
  description: String,
  start_node_id: Option<String>,
  first_node_id: Option<String>,
  nodes: HashMap<String, ChainNode>,
}

impl ChainBuilder {
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      description: String::new(),
      start_node_id: None,
      first_node_id: None,
      nodes: HashMap::new(),
    }
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  /// Mark the start node explicitly.
  pub fn start(mut self, node_id: impl Into<String>) -> Self {
    self.start_node_id = Some(node_id.into());
    self
  }

  /// Add a node. A later node with the same id replaces the earlier one.
  pub fn node(mut self, node: ChainNode) -> Self {
    if self.first_node_id.is_none() {
      self.first_node_id = Some(node.id.clone());
    }
    self.nodes.insert(node.id.clone(), node);
    self
  }

  pub fn task(self, id: impl Into<String>, task: Task, next: Option<&str>) -> Self {
    let id = id.into();
    self.node(ChainNode {
      id,
      kind: NodeKind::Task {
        task,
        next_node_id: next.map(str::to_string),
      },
    })
  }

  pub fn condition(
    self,
    id: impl Into<String>,
    condition: ChainCondition,
    true_branch: Option<&str>,
    false_branch: Option<&str>,
  ) -> Self {
    let id = id.into();
    self.node(ChainNode {
      id,
      kind: NodeKind::Condition {
        condition,
        true_branch: true_branch.map(str::to_string),
        false_branch: false_branch.map(str::to_string),
      },
    })
  }

  pub fn count_loop(
    self,
    id: impl Into<String>,
    count: u32,
    body: Option<&str>,
    next: Option<&str>,
  ) -> Self {
    let id = id.into();
    self.node(ChainNode {
      id,
      kind: NodeKind::Loop {
        loop_count: Some(count),
        loop_condition: None,
        body_node_id: body.map(str::to_string),
        next_node_id: next.map(str::to_string),
      },
    })
  }

  pub fn while_loop(
    self,
    id: impl Into<String>,
    condition: ChainCondition,
    body: Option<&str>,
    next: Option<&str>,
  ) -> Self {
    let id = id.into();
    self.node(ChainNode {
      id,
      kind: NodeKind::Loop {
        loop_count: None,
        loop_condition: Some(condition),
        body_node_id: body.map(str::to_string),
        next_node_id: next.map(str::to_string),
      },
    })
  }

  /// Stamp timestamps, validate, and produce the chain.
  pub fn build(self) -> Result<TaskChain, ChainError> {
    let start_node_id = self
      .start_node_id
      .or(self.first_node_id)
      .unwrap_or_default();
    let now = Utc::now();

    let chain = TaskChain {
      id: self.id,
      name: self.name,
      description: self.description,
      start_node_id,
      nodes: self.nodes,
      created_at: now,
      updated_at: now,
    };
    chain.validate()?;
    Ok(chain)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::condition::ConditionType;
  use crate::task::TaskType;

  #[test]
  fn build_defaults_start_to_first_node() {
    let chain = ChainBuilder::new("c1", "demo")
      .task("fetch", Task::new("t1", "fetch", TaskType::DataQuery), Some("check"))
      .condition(
        "check",
        ChainCondition::new(ConditionType::Exists, "result.rows", None),
        None,
        None,
      )
      .build()
      .unwrap();

    assert_eq!(chain.start_node_id, "fetch");
    assert_eq!(chain.nodes.len(), 2);
  }

  #[test]
  fn build_validates_the_graph() {
    let err = ChainBuilder::new("c1", "demo")
      .task("fetch", Task::new("t1", "fetch", TaskType::General), Some("ghost"))
      .build()
      .unwrap_err();

    assert_eq!(
      err,
      ChainError::DanglingReference {
        referrer: "fetch".to_string(),
        target: "ghost".to_string()
      }
    );
  }

  #[test]
  fn build_rejects_empty_builder() {
    let err = ChainBuilder::new("c1", "demo").build().unwrap_err();
    assert_eq!(
      err,
      ChainError::EmptyChain {
        chain_id: "c1".to_string()
      }
    );
  }
}
