//! Error types for pathway-data
//!
//! Every failure is detected and returned where it happens; nothing in this
//! crate retries. "Not found" is never an error, lookups return `Ok(None)`.

use thiserror::Error;

use crate::graph::{CompileError, GraphStoreError};
use crate::models::ValidationError;

pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    /// Malformed table definition
    #[error("schema error: {0}")]
    Schema(String),

    /// Placeholder count in the query text differs from the bound columns.
    /// Raised before any connection is touched.
    #[error("invalid amount of columns for query \"{query}\": expected {expected}, got {actual}")]
    ParameterArityMismatch {
        query: String,
        expected: usize,
        actual: usize,
    },

    #[error("database error: {0}")]
    Driver(#[from] sqlx::Error),

    #[error(transparent)]
    Graph(#[from] GraphStoreError),

    #[error("graph query compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("expected {expected} result, found {found}")]
    MultipleResults { expected: usize, found: usize },

    #[error("no node created")]
    NoNodeCreated,

    #[error("no nodes updated")]
    NoNodesUpdated,

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl DataError {
    pub fn schema(reason: impl Into<String>) -> Self {
        Self::Schema(reason.into())
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// True when the underlying MySQL error reports an index that already exists.
    pub fn is_duplicate_key_name(&self) -> bool {
        match self {
            Self::Driver(sqlx::Error::Database(db)) => db.message().contains("Duplicate key name"),
            _ => false,
        }
    }
}
