//! Wire form of the node table.
//!
//! The editor and the persistence collaborator exchange chains with `nodes`
//! as an array of `{id, type, ...}` objects. In memory the table is keyed by
//! node id. These helpers convert between the two through serde.

pub(crate) mod node_table {
  use std::collections::HashMap;

  use serde::de::Error as _;
  use serde::{Deserialize, Deserializer, Serialize, Serializer};

  use crate::error::ChainError;
  use crate::node::ChainNode;

  /// Serialize the table as an array of nodes, sorted by id for stable output.
  pub fn serialize<S>(nodes: &HashMap<String, ChainNode>, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    let mut ordered: Vec<&ChainNode> = nodes.values().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));
    ordered.serialize(serializer)
  }

  /// Rebuild the id-keyed table from an array of nodes.
  pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<String, ChainNode>, D::Error>
  where
    D: Deserializer<'de>,
  {
    let nodes = Vec::<ChainNode>::deserialize(deserializer)?;
    let mut table = HashMap::with_capacity(nodes.len());
    for node in nodes {
      let id = node.id.clone();
      if table.insert(id.clone(), node).is_some() {
        return Err(D::Error::custom(ChainError::DuplicateNodeId { node_id: id }));
      }
    }
    Ok(table)
  }
}
