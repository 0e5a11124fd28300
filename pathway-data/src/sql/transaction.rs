//! Atomic multi-statement batches
//!
//! A [`TransactionScope`] owns one open transaction. `commit` consumes it;
//! if the scope is dropped first (early return, error, panic) every statement
//! executed through it is rolled back. Failed statements and commits are not
//! retried.

use sqlx::mysql::{MySqlQueryResult, MySqlRow};
use sqlx::{MySql, Transaction};

use super::column::Column;
use super::executor::{bind_columns, check_arity};
use crate::error::Result;

pub struct TransactionScope {
    tx: Transaction<'static, MySql>,
    statements: usize,
}

impl TransactionScope {
    pub(crate) fn new(tx: Transaction<'static, MySql>) -> Self {
        Self { tx, statements: 0 }
    }

    /// Execute one write inside the batch.
    pub async fn execute<C: Column>(&mut self, query: &str, columns: &[C]) -> Result<MySqlQueryResult> {
        check_arity(query, columns.len())?;
        self.statements += 1;
        tracing::debug!(query = %query, statement = self.statements, "executing in transaction");

        let result = bind_columns(sqlx::query(query), columns)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transaction statement failed");
                e
            })?;
        Ok(result)
    }

    /// Read inside the batch, seeing the batch's own uncommitted writes.
    pub async fn fetch_all<C: Column>(&mut self, query: &str, columns: &[C]) -> Result<Vec<MySqlRow>> {
        check_arity(query, columns.len())?;
        let rows = bind_columns(sqlx::query(query), columns)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    /// Number of statements executed so far.
    pub fn statements(&self) -> usize {
        self.statements
    }

    pub async fn commit(self) -> Result<()> {
        tracing::debug!(statements = self.statements, "committing transaction");
        self.tx.commit().await?;
        Ok(())
    }

    /// Discard the batch now instead of waiting for drop.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
