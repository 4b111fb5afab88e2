use thiserror::Error;

/// Structural validation errors. A chain that fails validation must be
/// corrected by the editor; none of these are retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
  /// The chain has no nodes at all.
  #[error("chain '{chain_id}' has no nodes")]
  EmptyChain { chain_id: String },

  /// A start node or successor link names a node absent from the table.
  #[error("'{referrer}' references unknown node '{target}'")]
  DanglingReference { referrer: String, target: String },

  /// A loop node must set exactly one of `loopCount` / `loopCondition`.
  #[error("loop node '{node_id}' must set exactly one of loopCount or loopCondition")]
  InvalidLoopNode { node_id: String },

  /// Two nodes in a wire document share an id.
  #[error("duplicate node id '{node_id}'")]
  DuplicateNodeId { node_id: String },
}
