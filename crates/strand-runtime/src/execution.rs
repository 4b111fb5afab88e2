//! Chain execution.
//!
//! A single run is a sequential traversal over node ids: nodes within one
//! execution are never parallelized because branching and looping depend on
//! the immediately preceding node's result. Independent executions run
//! concurrently; each owns its record and reads the shared chain snapshot.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;
use strand_chain::{ChainCondition, NodeKind, Task, TaskChain};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::condition::evaluate_condition;
use crate::context::ExecutionContext;
use crate::engine::EngineConfig;
use crate::result::{ChainExecutionResult, LogEntry, LogLevel, NodeResult, RunStatus};
use crate::runner::TaskRunner;

/// Why a traversal stopped before reaching a terminal node.
enum Halt {
  Failed(String),
  Cancelled,
}

/// A handle to one chain run.
///
/// Owns everything it needs (chain snapshot, runner, shared record), so it
/// can be moved into a spawned task. Call `.wait()` to drive the traversal
/// and get the final record; poll the engine for snapshots in the meantime.
pub struct ChainExecution {
  chain: Arc<TaskChain>,
  runner: Arc<dyn TaskRunner>,
  config: EngineConfig,
  agent_id: String,
  execution_id: String,
  shared: Arc<RwLock<ChainExecutionResult>>,
  cancel: CancellationToken,
}

impl std::fmt::Debug for ChainExecution {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ChainExecution")
      .field("chain", &self.chain)
      .field("config", &self.config)
      .field("agent_id", &self.agent_id)
      .field("execution_id", &self.execution_id)
      .field("shared", &self.shared)
      .field("cancel", &self.cancel)
      .finish()
  }
}

impl ChainExecution {
  pub(crate) fn new(
    chain: Arc<TaskChain>,
    runner: Arc<dyn TaskRunner>,
    config: EngineConfig,
    agent_id: String,
    execution_id: String,
    shared: Arc<RwLock<ChainExecutionResult>>,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      chain,
      runner,
      config,
      agent_id,
      execution_id,
      shared,
      cancel,
    }
  }

  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  /// Token observed between steps and during task awaits. Cancelling it has
  /// the same effect as `ChainEngine::cancel_execution`.
  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  /// Drive the traversal to completion.
  #[instrument(
    name = "chain_execute",
    skip(self),
    fields(
      chain_id = %self.chain.id,
      execution_id = %self.execution_id,
    )
  )]
  pub async fn wait(self) -> ChainExecutionResult {
    info!(
      chain_id = %self.chain.id,
      execution_id = %self.execution_id,
      "chain_started"
    );

    let mut walker = Walker {
      chain: &self.chain,
      runner: self.runner.as_ref(),
      config: &self.config,
      agent_id: &self.agent_id,
      execution_id: &self.execution_id,
      cancel: &self.cancel,
      shared: &self.shared,
      context: ExecutionContext::new(),
    };

    let outcome = walker.run_segment(self.chain.start_node_id.clone()).await;

    // Finalize exactly once; the record is never touched afterwards.
    let record = {
      let mut record = self.shared.write().unwrap();
      record.completed_at = Some(Utc::now());
      match outcome {
        Ok(()) => record.status = RunStatus::Completed,
        Err(Halt::Failed(message)) => {
          record.status = RunStatus::Failed;
          record.error = Some(message);
        }
        Err(Halt::Cancelled) => record.status = RunStatus::Cancelled,
      }
      record.clone()
    };

    match record.status {
      RunStatus::Completed => {
        info!(execution_id = %self.execution_id, "chain_completed");
      }
      RunStatus::Cancelled => {
        warn!(execution_id = %self.execution_id, "chain_cancelled");
      }
      _ => {
        error!(
          execution_id = %self.execution_id,
          error = %record.error.as_deref().unwrap_or_default(),
          "chain_failed"
        );
      }
    }

    record
  }
}

/// Per-run traversal state. Splits off from the handle so loop bodies can
/// recurse over `&mut self`.
struct Walker<'a> {
  chain: &'a TaskChain,
  runner: &'a dyn TaskRunner,
  config: &'a EngineConfig,
  agent_id: &'a str,
  execution_id: &'a str,
  cancel: &'a CancellationToken,
  shared: &'a RwLock<ChainExecutionResult>,
  context: ExecutionContext,
}

impl Walker<'_> {
  /// Walk from `start` until a terminal node, a failure, or cancellation.
  ///
  /// Loop bodies re-enter this with the body's entry node, so the future is
  /// boxed.
  fn run_segment(&mut self, start: String) -> BoxFuture<'_, Result<(), Halt>> {
    Box::pin(async move {
      let mut current = Some(start);

      while let Some(node_id) = current {
        if self.cancel.is_cancelled() {
          return Err(Halt::Cancelled);
        }

        let Some(node) = self.chain.node(&node_id).cloned() else {
          // Validation guarantees the id exists; a miss is a hard failure.
          return Err(Halt::Failed(format!("node '{node_id}' not found in chain")));
        };

        self
          .shared
          .write()
          .unwrap()
          .execution_path
          .push(node_id.clone());

        current = match node.kind {
          NodeKind::Task { task, next_node_id } => {
            self.run_task(&node_id, &task).await?;
            next_node_id
          }
          NodeKind::Condition {
            condition,
            true_branch,
            false_branch,
          } => {
            // An unset branch ends the chain normally at this node.
            if self.run_condition(&node_id, &condition)? {
              true_branch
            } else {
              false_branch
            }
          }
          NodeKind::Loop {
            loop_count,
            loop_condition,
            body_node_id,
            next_node_id,
          } => {
            self
              .run_loop(
                &node_id,
                loop_count,
                loop_condition.as_ref(),
                body_node_id.as_deref(),
              )
              .await?;
            next_node_id
          }
        };
      }

      Ok(())
    })
  }

  /// Dispatch one task to the injected runner, bounded by the configured
  /// timeout and raced against cancellation.
  #[instrument(
    name = "node_execute",
    skip(self, task),
    fields(execution_id = %self.execution_id, node_id = %node_id),
  )]
  async fn run_task(&mut self, node_id: &str, task: &Task) -> Result<(), Halt> {
    let started_at = Utc::now();
    let mut logs = vec![LogEntry::new(
      LogLevel::Info,
      format!("dispatching task '{}'", task.name),
    )];
    let context = self.context.as_value();

    info!(
      execution_id = %self.execution_id,
      node_id = %node_id,
      task_id = %task.id,
      "node_started"
    );

    let run = async {
      match self.config.node_timeout {
        Some(limit) => match tokio::time::timeout(limit, self.runner.run(task, &context)).await {
          Ok(outcome) => outcome.map_err(|e| e.to_string()),
          Err(_) => Err(format!(
            "task '{}' timed out after {}ms",
            task.id,
            limit.as_millis()
          )),
        },
        None => self.runner.run(task, &context).await.map_err(|e| e.to_string()),
      }
    };

    let outcome = tokio::select! {
      outcome = run => outcome,
      _ = self.cancel.cancelled() => return Err(Halt::Cancelled),
    };

    match outcome {
      Ok(value) => {
        info!(
          execution_id = %self.execution_id,
          node_id = %node_id,
          "node_completed"
        );
        self.record(
          node_id,
          NodeResult {
            agent_id: self.agent_id.to_string(),
            status: RunStatus::Completed,
            result: Some(value.clone()),
            error: None,
            logs,
            started_at,
            completed_at: Some(Utc::now()),
          },
        );
        self.context.record_task(node_id, value);
        Ok(())
      }
      Err(message) => {
        error!(
          execution_id = %self.execution_id,
          node_id = %node_id,
          error = %message,
          "node_failed"
        );
        logs.push(LogEntry::new(LogLevel::Error, message.clone()));
        self.record(
          node_id,
          NodeResult {
            agent_id: self.agent_id.to_string(),
            status: RunStatus::Failed,
            result: None,
            error: Some(message.clone()),
            logs,
            started_at,
            completed_at: Some(Utc::now()),
          },
        );
        Err(Halt::Failed(message))
      }
    }
  }

  /// Evaluate a condition node and pick a branch. Evaluation only fails on
  /// a non-numeric ordered comparison.
  fn run_condition(&mut self, node_id: &str, condition: &ChainCondition) -> Result<bool, Halt> {
    let started_at = Utc::now();

    match evaluate_condition(condition, &self.context) {
      Ok(matched) => {
        debug!(
          execution_id = %self.execution_id,
          node_id = %node_id,
          matched,
          "condition_evaluated"
        );
        let outcome = json!({ "matched": matched });
        self.record(
          node_id,
          NodeResult {
            agent_id: self.agent_id.to_string(),
            status: RunStatus::Completed,
            result: Some(outcome.clone()),
            error: None,
            logs: Vec::new(),
            started_at,
            completed_at: Some(Utc::now()),
          },
        );
        self.context.record(node_id, outcome);
        Ok(matched)
      }
      Err(e) => {
        let message = e.to_string();
        error!(
          execution_id = %self.execution_id,
          node_id = %node_id,
          error = %message,
          "node_failed"
        );
        self.record(
          node_id,
          NodeResult {
            agent_id: self.agent_id.to_string(),
            status: RunStatus::Failed,
            result: None,
            error: Some(message.clone()),
            logs: vec![LogEntry::new(LogLevel::Error, message.clone())],
            started_at,
            completed_at: Some(Utc::now()),
          },
        );
        Err(Halt::Failed(message))
      }
    }
  }

  /// Run a loop node: iterate the body subgraph a fixed number of times, or
  /// while the loop condition holds (first false evaluation exits).
  async fn run_loop(
    &mut self,
    node_id: &str,
    loop_count: Option<u32>,
    loop_condition: Option<&ChainCondition>,
    body: Option<&str>,
  ) -> Result<(), Halt> {
    let started_at = Utc::now();
    let mut iterations: u32 = 0;

    match (loop_count, loop_condition) {
      (Some(count), None) => {
        while iterations < count {
          self.run_body(body).await?;
          iterations += 1;
        }
      }
      (None, Some(condition)) => loop {
        match evaluate_condition(condition, &self.context) {
          Ok(true) => {
            if iterations >= self.config.loop_iteration_limit {
              let message = format!(
                "loop '{node_id}' exceeded the iteration limit of {}",
                self.config.loop_iteration_limit
              );
              self.fail_loop(node_id, started_at, message.clone());
              return Err(Halt::Failed(message));
            }
            self.run_body(body).await?;
            iterations += 1;
          }
          Ok(false) => break,
          Err(e) => {
            let message = e.to_string();
            self.fail_loop(node_id, started_at, message.clone());
            return Err(Halt::Failed(message));
          }
        }
      },
      // Validation rejects these shapes before execution starts.
      _ => {
        let message = format!("loop '{node_id}' has no usable exit rule");
        self.fail_loop(node_id, started_at, message.clone());
        return Err(Halt::Failed(message));
      }
    }

    debug!(
      execution_id = %self.execution_id,
      node_id = %node_id,
      iterations,
      "loop_completed"
    );
    let outcome = json!({ "iterations": iterations });
    self.record(
      node_id,
      NodeResult {
        agent_id: self.agent_id.to_string(),
        status: RunStatus::Completed,
        result: Some(outcome.clone()),
        error: None,
        logs: Vec::new(),
        started_at,
        completed_at: Some(Utc::now()),
      },
    );
    self.context.record(node_id, outcome);
    Ok(())
  }

  async fn run_body(&mut self, body: Option<&str>) -> Result<(), Halt> {
    match body {
      Some(entry) => self.run_segment(entry.to_string()).await,
      None => Ok(()),
    }
  }

  fn fail_loop(&self, node_id: &str, started_at: chrono::DateTime<Utc>, message: String) {
    error!(
      execution_id = %self.execution_id,
      node_id = %node_id,
      error = %message,
      "node_failed"
    );
    self.record(
      node_id,
      NodeResult {
        agent_id: self.agent_id.to_string(),
        status: RunStatus::Failed,
        result: None,
        error: Some(message.clone()),
        logs: vec![LogEntry::new(LogLevel::Error, message)],
        started_at,
        completed_at: Some(Utc::now()),
      },
    );
  }

  /// Most recent outcome per node id; loop iterations overwrite.
  fn record(&self, node_id: &str, result: NodeResult) {
    self
      .shared
      .write()
      .unwrap()
      .node_results
      .insert(node_id.to_string(), result);
  }
}
