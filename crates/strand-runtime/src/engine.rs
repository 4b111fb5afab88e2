//! The chain engine.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use strand_registry::ChainRegistry;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::EngineError;
use crate::execution::ChainExecution;
use crate::result::ChainExecutionResult;
use crate::runner::TaskRunner;

/// Ceiling on condition-driven loop iterations, so a condition that never
/// turns false cannot spin a run forever. Overridable per engine.
pub const DEFAULT_LOOP_ITERATION_LIMIT: u32 = 10_000;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Upper bound on a single node's execution time. `None` waits as long as
  /// the runner takes.
  pub node_timeout: Option<Duration>,
  /// Iteration ceiling for condition-driven loops.
  pub loop_iteration_limit: u32,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      node_timeout: None,
      loop_iteration_limit: DEFAULT_LOOP_ITERATION_LIMIT,
    }
  }
}

struct ExecutionEntry {
  cancel: CancellationToken,
  result: Arc<RwLock<ChainExecutionResult>>,
}

/// Front door for executing chains.
///
/// Holds the registry handle, the injected task runner, and a table of
/// executions keyed by execution id. The table serves cancellation and
/// status polling; entries stay for the life of the engine so finished runs
/// remain queryable.
pub struct ChainEngine {
  registry: ChainRegistry,
  runner: Arc<dyn TaskRunner>,
  config: EngineConfig,
  agent_id: String,
  executions: Arc<RwLock<HashMap<String, ExecutionEntry>>>,
}

impl ChainEngine {
  pub fn new(registry: ChainRegistry, runner: Arc<dyn TaskRunner>, config: EngineConfig) -> Self {
    Self {
      registry,
      runner,
      config,
      agent_id: format!("engine-{}", Uuid::new_v4()),
      executions: Arc::new(RwLock::new(HashMap::new())),
    }
  }

  pub fn registry(&self) -> &ChainRegistry {
    &self.registry
  }

  /// Prepare an execution: resolve the chain, validate it, allocate ids.
  ///
  /// Structural problems surface here, before any node runs. The returned
  /// handle owns a read-only chain snapshot, so concurrent executions of
  /// the same chain id are independent. Call `.wait()` to drive it.
  pub fn execute_chain(&self, chain_id: &str) -> Result<ChainExecution, EngineError> {
    let chain = self
      .registry
      .get(chain_id)
      .ok_or_else(|| EngineError::ChainNotFound {
        chain_id: chain_id.to_string(),
      })?;
    chain.validate()?;

    let execution_id = Uuid::new_v4().to_string();
    let cancel = CancellationToken::new();
    let result = Arc::new(RwLock::new(ChainExecutionResult::running(
      execution_id.clone(),
      chain.id.clone(),
    )));

    self.executions.write().unwrap().insert(
      execution_id.clone(),
      ExecutionEntry {
        cancel: cancel.clone(),
        result: result.clone(),
      },
    );

    debug!(
      chain_id = %chain.id,
      execution_id = %execution_id,
      "execution prepared"
    );

    Ok(ChainExecution::new(
      chain,
      self.runner.clone(),
      self.config.clone(),
      self.agent_id.clone(),
      execution_id,
      result,
      cancel,
    ))
  }

  /// Request cancellation of a run.
  ///
  /// The run finalizes as `cancelled` at its next check point - before the
  /// following node, or mid-await for a task in flight. Nothing already
  /// executed is rolled back.
  pub fn cancel_execution(&self, execution_id: &str) -> Result<(), EngineError> {
    let executions = self.executions.read().unwrap();
    let entry = executions
      .get(execution_id)
      .ok_or_else(|| EngineError::ExecutionNotFound {
        execution_id: execution_id.to_string(),
      })?;
    entry.cancel.cancel();
    Ok(())
  }

  /// Point-in-time snapshot of a run's record, while it is in flight or
  /// after it finalizes.
  pub fn execution_status(&self, execution_id: &str) -> Option<ChainExecutionResult> {
    let executions = self.executions.read().unwrap();
    executions
      .get(execution_id)
      .map(|entry| entry.result.read().unwrap().clone())
  }
}
