//! Integration tests for the chain engine: traversal, branching, loops,
//! failure handling, timeouts, and cancellation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use strand_chain::{
  ChainBuilder, ChainCondition, ChainError, ConditionType, Task, TaskChain, TaskType,
};
use strand_registry::ChainRegistry;
use strand_runtime::{
  ChainEngine, EngineConfig, EngineError, RunStatus, TaskError, TaskRunner,
};
use tokio_util::sync::CancellationToken;

/// Runner with canned per-task outputs and failures. Default output carries
/// the task id so tests can tell outcomes apart.
struct ScriptedRunner {
  outputs: HashMap<String, Value>,
  failures: HashMap<String, String>,
  delay: Option<Duration>,
}

impl ScriptedRunner {
  fn new() -> Self {
    Self {
      outputs: HashMap::new(),
      failures: HashMap::new(),
      delay: None,
    }
  }

  fn output(mut self, task_id: &str, value: Value) -> Self {
    self.outputs.insert(task_id.to_string(), value);
    self
  }

  fn failure(mut self, task_id: &str, message: &str) -> Self {
    self.failures.insert(task_id.to_string(), message.to_string());
    self
  }

  fn delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }
}

#[async_trait]
impl TaskRunner for ScriptedRunner {
  async fn run(&self, task: &Task, _context: &Value) -> Result<Value, TaskError> {
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if let Some(message) = self.failures.get(&task.id) {
      return Err(TaskError::new(message.clone()));
    }
    Ok(
      self
        .outputs
        .get(&task.id)
        .cloned()
        .unwrap_or_else(|| json!({ "task": task.id })),
    )
  }
}

/// Runner whose nth invocation returns `{"count": n}`.
struct CountingRunner {
  calls: AtomicU32,
}

impl CountingRunner {
  fn new() -> Self {
    Self {
      calls: AtomicU32::new(0),
    }
  }
}

#[async_trait]
impl TaskRunner for CountingRunner {
  async fn run(&self, _task: &Task, _context: &Value) -> Result<Value, TaskError> {
    let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    Ok(json!({ "count": n }))
  }
}

/// Runner that cancels the supplied token while a specific task is running.
struct CancellingRunner {
  cancel_on: String,
  token: Mutex<Option<CancellationToken>>,
}

impl CancellingRunner {
  fn new(cancel_on: &str) -> Self {
    Self {
      cancel_on: cancel_on.to_string(),
      token: Mutex::new(None),
    }
  }

  fn arm(&self, token: CancellationToken) {
    *self.token.lock().unwrap() = Some(token);
  }
}

#[async_trait]
impl TaskRunner for CancellingRunner {
  async fn run(&self, task: &Task, _context: &Value) -> Result<Value, TaskError> {
    if task.id == self.cancel_on {
      if let Some(token) = self.token.lock().unwrap().as_ref() {
        token.cancel();
      }
    }
    Ok(json!({}))
  }
}

/// Runner that parks every task until the gate is released.
struct GatedRunner {
  gate: tokio::sync::Notify,
}

impl GatedRunner {
  fn new() -> Self {
    Self {
      gate: tokio::sync::Notify::new(),
    }
  }
}

#[async_trait]
impl TaskRunner for GatedRunner {
  async fn run(&self, _task: &Task, _context: &Value) -> Result<Value, TaskError> {
    self.gate.notified().await;
    Ok(json!({}))
  }
}

fn sample_task(id: &str) -> Task {
  Task::new(id, id, TaskType::General)
}

fn equals(field: &str, value: &str) -> ChainCondition {
  ChainCondition::new(ConditionType::Equals, field, Some(json!(value)))
}

fn less_than(field: &str, value: i64) -> ChainCondition {
  ChainCondition::new(ConditionType::LessThan, field, Some(json!(value)))
}

fn exists(field: &str) -> ChainCondition {
  ChainCondition::new(ConditionType::Exists, field, None)
}

/// Straight line of task nodes, each pointing at the next.
fn linear_chain(chain_id: &str, node_ids: &[&str]) -> TaskChain {
  let mut builder = ChainBuilder::new(chain_id, chain_id);
  for (i, id) in node_ids.iter().enumerate() {
    let next = node_ids.get(i + 1).copied();
    builder = builder.task(*id, sample_task(id), next);
  }
  builder.build().expect("test chain should be valid")
}

fn engine_with(chain: TaskChain, runner: Arc<dyn TaskRunner>) -> ChainEngine {
  engine_with_config(chain, runner, EngineConfig::default())
}

fn engine_with_config(
  chain: TaskChain,
  runner: Arc<dyn TaskRunner>,
  config: EngineConfig,
) -> ChainEngine {
  let registry = ChainRegistry::new();
  registry.register(chain);
  ChainEngine::new(registry, runner, config)
}

fn visits(result_path: &[String], node_id: &str) -> usize {
  result_path.iter().filter(|id| id.as_str() == node_id).count()
}

#[tokio::test]
async fn linear_chain_visits_each_node_once() {
  let chain = linear_chain("linear", &["a", "b", "c"]);
  let engine = engine_with(chain, Arc::new(ScriptedRunner::new()));

  let result = engine.execute_chain("linear").unwrap().wait().await;

  assert_eq!(result.status, RunStatus::Completed);
  assert_eq!(result.execution_path, vec!["a", "b", "c"]);
  assert!(result.completed_at.is_some());
  assert!(result.error.is_none());
  for id in ["a", "b", "c"] {
    let node = &result.node_results[id];
    assert_eq!(node.status, RunStatus::Completed);
    assert_eq!(node.logs.len(), 1);
    assert!(!node.agent_id.is_empty());
  }
}

#[tokio::test]
async fn condition_true_takes_true_branch() {
  // t1 -> check(result.status == "ok") -> t2 | t3
  let chain = ChainBuilder::new("branchy", "branchy")
    .task("t1", sample_task("t1"), Some("check"))
    .condition("check", equals("result.status", "ok"), Some("t2"), Some("t3"))
    .task("t2", sample_task("t2"), None)
    .task("t3", sample_task("t3"), None)
    .build()
    .unwrap();
  let runner = ScriptedRunner::new().output("t1", json!({ "status": "ok" }));
  let engine = engine_with(chain, Arc::new(runner));

  let result = engine.execute_chain("branchy").unwrap().wait().await;

  assert_eq!(result.status, RunStatus::Completed);
  assert_eq!(result.execution_path, vec!["t1", "check", "t2"]);
  assert_eq!(result.node_results["check"].result, Some(json!({ "matched": true })));
  assert!(!result.node_results.contains_key("t3"));
}

#[tokio::test]
async fn condition_false_takes_false_branch() {
  let chain = ChainBuilder::new("branchy", "branchy")
    .task("t1", sample_task("t1"), Some("check"))
    .condition("check", equals("result.status", "ok"), Some("t2"), Some("t3"))
    .task("t2", sample_task("t2"), None)
    .task("t3", sample_task("t3"), None)
    .build()
    .unwrap();
  let runner = ScriptedRunner::new().output("t1", json!({ "status": "error" }));
  let engine = engine_with(chain, Arc::new(runner));

  let result = engine.execute_chain("branchy").unwrap().wait().await;

  assert_eq!(result.execution_path, vec!["t1", "check", "t3"]);
  assert!(!result.node_results.contains_key("t2"));
}

#[tokio::test]
async fn unset_branch_ends_the_chain_normally() {
  let chain = ChainBuilder::new("open-ended", "open-ended")
    .task("t1", sample_task("t1"), Some("check"))
    .condition("check", exists("result.task"), None, Some("t2"))
    .task("t2", sample_task("t2"), None)
    .build()
    .unwrap();
  let engine = engine_with(chain, Arc::new(ScriptedRunner::new()));

  let result = engine.execute_chain("open-ended").unwrap().wait().await;

  // The default output sets `result.task`, so the unset true branch wins.
  assert_eq!(result.status, RunStatus::Completed);
  assert_eq!(result.execution_path, vec!["t1", "check"]);
}

#[tokio::test]
async fn never_produced_field_branches_false() {
  // No prior node ever sets `result.never`.
  let chain = ChainBuilder::new("absent", "absent")
    .task("t1", sample_task("t1"), Some("check"))
    .condition("check", equals("result.never", "x"), Some("t2"), Some("t3"))
    .task("t2", sample_task("t2"), None)
    .task("t3", sample_task("t3"), None)
    .build()
    .unwrap();
  let engine = engine_with(chain, Arc::new(ScriptedRunner::new()));

  let result = engine.execute_chain("absent").unwrap().wait().await;

  assert_eq!(result.status, RunStatus::Completed);
  assert_eq!(result.execution_path, vec!["t1", "check", "t3"]);
}

#[tokio::test]
async fn count_loop_runs_body_n_times() {
  // loop(count=3) around a single task node.
  let chain = ChainBuilder::new("looped", "looped")
    .count_loop("repeat", 3, Some("body"), Some("after"))
    .task("body", sample_task("body"), None)
    .task("after", sample_task("after"), None)
    .start("repeat")
    .build()
    .unwrap();
  let engine = engine_with(chain, Arc::new(ScriptedRunner::new()));

  let result = engine.execute_chain("looped").unwrap().wait().await;

  assert_eq!(result.status, RunStatus::Completed);
  assert_eq!(
    result.execution_path,
    vec!["repeat", "body", "body", "body", "after"]
  );
  assert_eq!(visits(&result.execution_path, "body"), 3);
  assert_eq!(
    result.node_results["repeat"].result,
    Some(json!({ "iterations": 3 }))
  );
}

#[tokio::test]
async fn zero_count_loop_skips_the_body() {
  let chain = ChainBuilder::new("looped", "looped")
    .count_loop("repeat", 0, Some("body"), Some("after"))
    .task("body", sample_task("body"), None)
    .task("after", sample_task("after"), None)
    .start("repeat")
    .build()
    .unwrap();
  let engine = engine_with(chain, Arc::new(ScriptedRunner::new()));

  let result = engine.execute_chain("looped").unwrap().wait().await;

  assert_eq!(result.execution_path, vec!["repeat", "after"]);
  assert!(!result.node_results.contains_key("body"));
  assert_eq!(
    result.node_results["repeat"].result,
    Some(json!({ "iterations": 0 }))
  );
}

#[tokio::test]
async fn loop_body_follows_inner_links() {
  let chain = ChainBuilder::new("looped", "looped")
    .count_loop("repeat", 2, Some("b1"), Some("after"))
    .task("b1", sample_task("b1"), Some("b2"))
    .task("b2", sample_task("b2"), None)
    .task("after", sample_task("after"), None)
    .start("repeat")
    .build()
    .unwrap();
  let engine = engine_with(chain, Arc::new(ScriptedRunner::new()));

  let result = engine.execute_chain("looped").unwrap().wait().await;

  assert_eq!(
    result.execution_path,
    vec!["repeat", "b1", "b2", "b1", "b2", "after"]
  );
}

#[tokio::test]
async fn while_loop_exits_on_first_false_evaluation() {
  // Each task invocation bumps `result.count`; the loop continues while it
  // stays below 4.
  let chain = ChainBuilder::new("whiled", "whiled")
    .task("seed", sample_task("seed"), Some("repeat"))
    .while_loop("repeat", less_than("result.count", 4), Some("body"), Some("after"))
    .task("body", sample_task("body"), None)
    .task("after", sample_task("after"), None)
    .build()
    .unwrap();
  let engine = engine_with(chain, Arc::new(CountingRunner::new()));

  let result = engine.execute_chain("whiled").unwrap().wait().await;

  assert_eq!(result.status, RunStatus::Completed);
  // seed -> 1, then body runs for counts 1, 2, 3; 4 stops the loop.
  assert_eq!(
    result.execution_path,
    vec!["seed", "repeat", "body", "body", "body", "after"]
  );
  assert_eq!(
    result.node_results["repeat"].result,
    Some(json!({ "iterations": 3 }))
  );
}

#[tokio::test]
async fn while_loop_that_never_exits_hits_the_iteration_cap() {
  let chain = ChainBuilder::new("runaway", "runaway")
    .task("seed", sample_task("seed"), Some("repeat"))
    .while_loop("repeat", exists("result.go"), Some("body"), Some("after"))
    .task("body", sample_task("body"), None)
    .task("after", sample_task("after"), None)
    .build()
    .unwrap();
  let runner = ScriptedRunner::new()
    .output("seed", json!({ "go": true }))
    .output("body", json!({ "go": true }));
  let config = EngineConfig {
    loop_iteration_limit: 5,
    ..EngineConfig::default()
  };
  let engine = engine_with_config(chain, Arc::new(runner), config);

  let result = engine.execute_chain("runaway").unwrap().wait().await;

  assert_eq!(result.status, RunStatus::Failed);
  let error = result.error.as_deref().unwrap();
  assert!(error.contains("iteration limit of 5"), "unexpected error: {error}");
  assert_eq!(result.node_results["repeat"].status, RunStatus::Failed);
  assert_eq!(visits(&result.execution_path, "body"), 5);
  assert!(!result.node_results.contains_key("after"));
}

#[tokio::test]
async fn task_failure_stops_the_chain_at_the_failing_node() {
  let chain = linear_chain("fragile", &["t1", "t2", "t3"]);
  let runner = ScriptedRunner::new().failure("t2", "boom");
  let engine = engine_with(chain, Arc::new(runner));

  let result = engine.execute_chain("fragile").unwrap().wait().await;

  assert_eq!(result.status, RunStatus::Failed);
  // Runner-reported errors are surfaced verbatim.
  assert_eq!(result.error.as_deref(), Some("boom"));
  assert_eq!(result.execution_path, vec!["t1", "t2"]);
  assert_eq!(result.node_results["t1"].status, RunStatus::Completed);
  assert_eq!(result.node_results["t2"].status, RunStatus::Failed);
  assert_eq!(result.node_results["t2"].error.as_deref(), Some("boom"));
  assert!(!result.node_results.contains_key("t3"));
}

#[tokio::test]
async fn slow_task_fails_on_the_node_timeout() {
  let chain = linear_chain("slow", &["t1"]);
  let runner = ScriptedRunner::new().delay(Duration::from_millis(200));
  let config = EngineConfig {
    node_timeout: Some(Duration::from_millis(25)),
    ..EngineConfig::default()
  };
  let engine = engine_with_config(chain, Arc::new(runner), config);

  let result = engine.execute_chain("slow").unwrap().wait().await;

  assert_eq!(result.status, RunStatus::Failed);
  assert!(result.error.as_deref().unwrap().contains("timed out"));
  assert_eq!(result.node_results["t1"].status, RunStatus::Failed);
}

#[tokio::test]
async fn cancellation_stops_the_run_between_steps() {
  // Cancel while node 2 of a 5-node chain is running.
  let chain = linear_chain("cancelled", &["t1", "t2", "t3", "t4", "t5"]);
  let runner = Arc::new(CancellingRunner::new("t2"));
  let engine = engine_with(chain, runner.clone());

  let execution = engine.execute_chain("cancelled").unwrap();
  runner.arm(execution.cancellation_token());
  let result = execution.wait().await;

  assert_eq!(result.status, RunStatus::Cancelled);
  assert_eq!(result.execution_path, vec!["t1", "t2"]);
  for id in ["t3", "t4", "t5"] {
    assert!(!result.node_results.contains_key(id));
  }
}

#[tokio::test]
async fn cancel_before_start_short_circuits() {
  let chain = linear_chain("early", &["t1", "t2"]);
  let engine = engine_with(chain, Arc::new(ScriptedRunner::new()));

  let execution = engine.execute_chain("early").unwrap();
  engine.cancel_execution(execution.execution_id()).unwrap();
  let result = execution.wait().await;

  assert_eq!(result.status, RunStatus::Cancelled);
  assert!(result.execution_path.is_empty());
  assert!(result.node_results.is_empty());
}

#[tokio::test]
async fn concurrent_executions_of_one_chain_are_independent() {
  let chain = linear_chain("shared", &["t1", "t2"]);
  let runner = ScriptedRunner::new().delay(Duration::from_millis(10));
  let engine = engine_with(chain, Arc::new(runner));

  let first = engine.execute_chain("shared").unwrap();
  let second = engine.execute_chain("shared").unwrap();
  assert_ne!(first.execution_id(), second.execution_id());

  let (a, b) = tokio::join!(first.wait(), second.wait());

  assert_ne!(a.execution_id, b.execution_id);
  assert_eq!(a.status, RunStatus::Completed);
  assert_eq!(b.status, RunStatus::Completed);
  assert_eq!(a.execution_path, b.execution_path);
}

#[tokio::test]
async fn execution_status_tracks_the_run() {
  let chain = linear_chain("polled", &["t1"]);
  let runner = Arc::new(GatedRunner::new());
  let engine = engine_with(chain, runner.clone());

  let execution = engine.execute_chain("polled").unwrap();
  let execution_id = execution.execution_id().to_string();

  // Observable as running before the traversal is even driven.
  let snapshot = engine.execution_status(&execution_id).unwrap();
  assert_eq!(snapshot.status, RunStatus::Running);
  assert!(snapshot.completed_at.is_none());

  let handle = tokio::spawn(execution.wait());
  runner.gate.notify_one();
  let result = handle.await.unwrap();

  assert_eq!(result.status, RunStatus::Completed);
  assert_eq!(engine.execution_status(&execution_id), Some(result));
}

#[tokio::test]
async fn unknown_chain_is_rejected() {
  let engine = ChainEngine::new(
    ChainRegistry::new(),
    Arc::new(ScriptedRunner::new()),
    EngineConfig::default(),
  );

  let err = engine.execute_chain("nope").unwrap_err();
  assert!(matches!(err, EngineError::ChainNotFound { chain_id } if chain_id == "nope"));
}

#[tokio::test]
async fn invalid_chain_is_rejected_before_any_node_runs() {
  // Bypass the builder: registered chains may come from persistence and
  // must still be validated at execution time.
  let mut chain = linear_chain("broken", &["t1"]);
  if let Some(node) = chain.nodes.get_mut("t1") {
    if let strand_chain::NodeKind::Task { next_node_id, .. } = &mut node.kind {
      *next_node_id = Some("ghost".to_string());
    }
  }
  let engine = engine_with(chain, Arc::new(ScriptedRunner::new()));

  let err = engine.execute_chain("broken").unwrap_err();
  assert!(matches!(
    err,
    EngineError::InvalidChain(ChainError::DanglingReference { ref target, .. }) if target == "ghost"
  ));

  // The failure is synchronous, so there is no execution to poll.
  assert!(engine.execution_status("anything").is_none());
}

#[tokio::test]
async fn cancel_unknown_execution_is_an_error() {
  let engine = ChainEngine::new(
    ChainRegistry::new(),
    Arc::new(ScriptedRunner::new()),
    EngineConfig::default(),
  );

  let err = engine.cancel_execution("missing").unwrap_err();
  assert!(matches!(err, EngineError::ExecutionNotFound { .. }));
}
