//! Graph store seam
//!
//! The graph database is reached through these traits so the executor can be
//! driven by any Cypher-speaking backend. A backend implements
//! [`GraphStore`] for its client and [`GraphTransaction`] for the
//! per-call transaction it hands out.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::query::CompiledQuery;

/// Opaque failure reported by a graph backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("graph store error: {message}")]
pub struct GraphStoreError {
    pub message: String,
}

impl GraphStoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    #[default]
    Write,
    Read,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub database: String,
    pub access_mode: AccessMode,
}

impl SessionConfig {
    pub fn write(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            access_mode: AccessMode::Write,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::write("neo4j")
    }
}

/// A node as returned by the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphNode {
    pub labels: Vec<String>,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Node(GraphNode),
    Scalar(Value),
}

/// One result row: parallel `keys` and `values`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphRecord {
    pub keys: Vec<String>,
    pub values: Vec<GraphValue>,
}

/// An open transaction on the graph backend.
///
/// Implementations must roll back when dropped without [`commit`] or
/// [`rollback`]. [`GraphRepository`] finishes every transaction it begins,
/// but a caller that drops the future mid-query leaves only `Drop` to clean up.
///
/// [`commit`]: GraphTransaction::commit
/// [`rollback`]: GraphTransaction::rollback
/// [`GraphRepository`]: super::GraphRepository
#[async_trait]
pub trait GraphTransaction: Send {
    async fn run(&mut self, query: &CompiledQuery) -> Result<Vec<GraphRecord>, GraphStoreError>;

    async fn commit(self: Box<Self>) -> Result<(), GraphStoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), GraphStoreError>;
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn begin(&self, config: &SessionConfig) -> Result<Box<dyn GraphTransaction>, GraphStoreError>;
}
