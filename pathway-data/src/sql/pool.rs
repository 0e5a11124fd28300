//! Database connection pool management
//!
//! Uses sqlx MySqlPool with explicit connection limits.

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

use crate::config::StoreConfig;
use crate::error::Result;

/// Create a MySQL connection pool from validated configuration.
///
/// # Errors
///
/// Returns a configuration error for an invalid host/port/database, or the
/// driver error if the connection fails.
pub async fn create_pool(config: &StoreConfig) -> Result<MySqlPool> {
    config.validate()?;
    let pool = create_pool_with_options(&config.mysql_url(), config.max_connections).await?;
    tracing::info!(host = %config.host, database = %config.database, "connected to mysql");
    Ok(pool)
}

/// Create a MySQL connection pool with custom options.
///
/// # Arguments
///
/// * `database_url` - MySQL connection string
/// * `max_connections` - Maximum number of connections in the pool
pub async fn create_pool_with_options(
    database_url: &str,
    max_connections: u32,
) -> std::result::Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
