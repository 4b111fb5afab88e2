//! Strand Chain
//!
//! This crate provides the chain graph model for strand: the data structures
//! an external editor produces, plus structural validation.
//!
//! A [`TaskChain`] is a named directed graph. Each [`ChainNode`] is a task, a
//! condition, or a loop; successor links (`nextNodeId`, branches, loop body)
//! are node ids into the chain's node table. The model carries no behavior
//! beyond validation - execution lives in `strand-runtime`, and chains are
//! replaced wholesale on edit rather than mutated.
//!
//! On the wire the node table is an array of `{id, type, ...}` objects, the
//! shape exchanged with the editor and the persistence collaborator. In
//! memory it is an id-keyed map.

mod builder;
mod chain;
mod condition;
mod error;
mod node;
mod task;
mod wire;

pub use builder::ChainBuilder;
pub use chain::TaskChain;
pub use condition::{ChainCondition, ConditionType};
pub use error::ChainError;
pub use node::{ChainNode, NodeKind};
pub use task::{Task, TaskType};
