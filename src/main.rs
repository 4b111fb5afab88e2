use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};

use strand_chain::{Task, TaskChain};
use strand_registry::ChainRegistry;
use strand_runtime::{ChainEngine, EngineConfig, RunStatus, TaskError, TaskRunner};

/// Strand - a task chain execution engine
#[derive(Parser)]
#[command(name = "strand")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Execute a chain document
  Run {
    /// Path to the chain file (JSON)
    chain_file: PathBuf,

    /// Per-node timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
  },

  /// Check a chain document's structural invariants
  Validate {
    /// Path to the chain file (JSON)
    chain_file: PathBuf,
  },
}

/// Task runner for file-driven runs: echoes each task's parameters as its
/// outcome, so downstream conditions can branch on editor-authored values.
struct EchoRunner;

#[async_trait]
impl TaskRunner for EchoRunner {
  async fn run(
    &self,
    task: &Task,
    _context: &serde_json::Value,
  ) -> Result<serde_json::Value, TaskError> {
    Ok(serde_json::Value::Object(
      task.parameters.clone().into_iter().collect(),
    ))
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Run {
      chain_file,
      timeout_ms,
    } => run_chain(chain_file, timeout_ms),
    Commands::Validate { chain_file } => validate_chain(chain_file),
  }
}

fn load_chain(chain_file: &PathBuf) -> Result<TaskChain> {
  let content = std::fs::read_to_string(chain_file)
    .with_context(|| format!("failed to read chain file: {}", chain_file.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse chain file: {}", chain_file.display()))
}

fn validate_chain(chain_file: PathBuf) -> Result<()> {
  let chain = load_chain(&chain_file)?;
  chain.validate()?;
  eprintln!("chain '{}' is valid ({} nodes)", chain.id, chain.nodes.len());
  Ok(())
}

fn run_chain(chain_file: PathBuf, timeout_ms: Option<u64>) -> Result<()> {
  let chain = load_chain(&chain_file)?;
  let chain_id = chain.id.clone();
  eprintln!("loaded chain: {}", chain.name);

  let registry = ChainRegistry::new();
  registry.register(chain);

  let config = EngineConfig {
    node_timeout: timeout_ms.map(Duration::from_millis),
    ..EngineConfig::default()
  };
  let engine = ChainEngine::new(registry, Arc::new(EchoRunner), config);

  let rt = tokio::runtime::Runtime::new()?;
  let result = rt.block_on(async {
    let execution = engine.execute_chain(&chain_id)?;
    let execution_id = execution.execution_id().to_string();

    let mut run = tokio::spawn(execution.wait());
    tokio::select! {
      result = &mut run => result.map_err(anyhow::Error::from),
      _ = tokio::signal::ctrl_c() => {
        eprintln!("cancellation requested");
        engine.cancel_execution(&execution_id)?;
        run.await.map_err(anyhow::Error::from)
      }
    }
  })?;

  println!("{}", serde_json::to_string_pretty(&result)?);

  if result.status != RunStatus::Completed {
    anyhow::bail!("chain finished with status {:?}", result.status);
  }
  Ok(())
}
