//! Strand Runtime
//!
//! This crate executes chains: it walks the graph from the start node,
//! evaluates conditions against accumulated results, bounds loops, and
//! collects a per-run execution record.
//!
//! # Architecture
//!
//! ```text
//! ChainEngine
//! ├── new(registry, runner, config)
//! ├── execute_chain(chain_id) -> ChainExecution   (looks up + validates)
//! ├── cancel_execution(execution_id)
//! └── execution_status(execution_id) -> ChainExecutionResult snapshot
//!
//! ChainExecution
//! └── wait() - sequential traversal; task dispatch, branching, loops
//!
//! condition::evaluate_condition(condition, context) -> bool
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use strand_runtime::{ChainEngine, EngineConfig};
//!
//! let engine = ChainEngine::new(registry, Arc::new(runner), EngineConfig::default());
//!
//! let execution = engine.execute_chain("my-chain")?;
//! let result = execution.wait().await;
//! assert_eq!(result.execution_path.first().map(String::as_str), Some("start"));
//! ```
//!
//! Task execution itself is delegated to an injected [`TaskRunner`]; the
//! engine has no knowledge of how a task is actually performed.

mod condition;
mod context;
mod engine;
mod error;
mod execution;
mod result;
mod runner;

pub use condition::{ConditionError, evaluate_condition};
pub use context::ExecutionContext;
pub use engine::{ChainEngine, DEFAULT_LOOP_ITERATION_LIMIT, EngineConfig};
pub use error::EngineError;
pub use execution::ChainExecution;
pub use result::{ChainExecutionResult, LogEntry, LogLevel, NodeResult, RunStatus};
pub use runner::{TaskError, TaskRunner};
