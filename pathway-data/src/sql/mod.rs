//! Relational side: column model, DDL generation, statement execution

pub mod column;
pub mod executor;
pub mod pool;
pub mod table;
pub mod transaction;

pub use column::{Column, ColumnKind, SqlColumn, SqlValue};
pub use executor::{placeholder_count, InsertOptions, QueryOptions, SqlRepository};
pub use pool::{create_pool, create_pool_with_options};
pub use table::Table;
pub use transaction::TransactionScope;
