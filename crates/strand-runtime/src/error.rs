//! Engine errors.

use strand_chain::ChainError;

/// Errors returned synchronously by the engine, before any node executes.
///
/// Failures *during* traversal (runner errors, timeouts, loop caps) are not
/// errors at this level - they are recorded in the run's
/// [`ChainExecutionResult`](crate::ChainExecutionResult) so the path up to
/// the failure point stays available for diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// Chain id not present in the registry.
  #[error("chain '{chain_id}' not found in registry")]
  ChainNotFound { chain_id: String },

  /// The chain failed structural validation.
  #[error(transparent)]
  InvalidChain(#[from] ChainError),

  /// Execution id not present in the execution table.
  #[error("execution '{execution_id}' not found")]
  ExecutionNotFound { execution_id: String },
}
