//! Strand Registry
//!
//! In-memory catalogue of chains, keyed by chain id. A persistence
//! collaborator loads chains at startup (or on demand) and registers them
//! here; the registry itself never touches durable storage.
//!
//! The handle is cheap to clone and safe to share across executions:
//! lookups take a read lock, registration takes a short write lock, and
//! chains are handed out as `Arc` snapshots so a running execution keeps its
//! chain even if the editor re-saves it mid-run.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use strand_chain::TaskChain;
use tracing::debug;

/// Catalogue of chains available for execution.
#[derive(Clone, Default)]
pub struct ChainRegistry {
  chains: Arc<RwLock<HashMap<String, Arc<TaskChain>>>>,
}

impl ChainRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert or replace a chain. Last write wins; there is no merge.
  pub fn register(&self, chain: TaskChain) {
    let mut chains = self.chains.write().unwrap();
    debug!(chain_id = %chain.id, chain_name = %chain.name, "chain registered");
    chains.insert(chain.id.clone(), Arc::new(chain));
  }

  /// Look up a chain by id.
  pub fn get(&self, chain_id: &str) -> Option<Arc<TaskChain>> {
    let chains = self.chains.read().unwrap();
    chains.get(chain_id).cloned()
  }

  /// Remove a chain. Returns the removed snapshot, if any.
  pub fn remove(&self, chain_id: &str) -> Option<Arc<TaskChain>> {
    let mut chains = self.chains.write().unwrap();
    let removed = chains.remove(chain_id);
    if removed.is_some() {
      debug!(chain_id = %chain_id, "chain removed");
    }
    removed
  }

  /// Snapshot of every registered chain.
  pub fn list(&self) -> Vec<Arc<TaskChain>> {
    let chains = self.chains.read().unwrap();
    chains.values().cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.chains.read().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.chains.read().unwrap().is_empty()
  }
}
