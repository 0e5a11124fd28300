//! pathway-data: data-access layer for pathway
//!
//! Two stores sit behind this crate:
//!
//! - **MySQL** through [`sql::SqlRepository`]: typed columns, generated DDL,
//!   placeholder-checked statements and RAII transactions.
//! - **A Cypher graph store** through [`graph::GraphRepository`]: a fluent
//!   compiler that binds every property value as a parameter, run against
//!   any backend implementing [`graph::GraphStore`].
//!
//! [`repos`] builds the opportunity, user, student, points and match
//! repositories on top of both.

pub mod config;
pub mod error;
pub mod graph;
pub mod models;
pub mod repos;
pub mod sql;

pub use config::StoreConfig;
pub use error::{DataError, Result};
