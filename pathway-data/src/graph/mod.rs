//! Graph side: node model, Cypher compiler, store seam and executor.

mod executor;
mod node;
mod query;
mod store;
mod tag;

#[cfg(test)]
pub(crate) mod testing;

pub use executor::GraphRepository;
pub use node::Node;
pub use query::{CompileError, CompiledQuery, CypherBuilder, NodeStage, QueryKind, RelationStage, UpdateStage};
pub use store::{
    AccessMode, GraphNode, GraphRecord, GraphStore, GraphStoreError, GraphTransaction, GraphValue, SessionConfig,
};
pub use tag::{Tag, TagAllocator};
