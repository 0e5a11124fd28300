//! Parameterized statement execution
//!
//! Every call acquires one pooled connection, binds column values
//! positionally into a prepared statement, and hands the connection back on
//! drop, whichever way the call exits.

use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlQueryResult, MySqlRow};
use sqlx::query::Query;
use sqlx::MySql;

use super::column::{Column, SqlColumn, SqlValue};
use super::transaction::TransactionScope;
use crate::error::{DataError, Result};

type ErrorCallback<'a> = Box<dyn FnOnce(&DataError) + Send + 'a>;

/// Options accepted by [`SqlRepository::execute_query`].
///
/// Callbacks run synchronously on the calling task, before the result is
/// returned.
#[derive(Default)]
pub struct QueryOptions<'a> {
    pub on_complete: Option<Box<dyn FnOnce(&[MySqlRow]) + Send + 'a>>,
    pub on_error: Option<ErrorCallback<'a>>,
    /// Overrides the repository's pool for this call.
    pub connection: Option<MySqlPool>,
}

impl<'a> QueryOptions<'a> {
    pub fn on_complete(mut self, f: impl FnOnce(&[MySqlRow]) + Send + 'a) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&DataError) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn connection(mut self, pool: MySqlPool) -> Self {
        self.connection = Some(pool);
        self
    }
}

/// Options accepted by [`SqlRepository::execute_insert`].
#[derive(Default)]
pub struct InsertOptions<'a> {
    pub on_complete: Option<Box<dyn FnOnce(&MySqlQueryResult) + Send + 'a>>,
    pub on_error: Option<ErrorCallback<'a>>,
    pub connection: Option<MySqlPool>,
}

impl<'a> InsertOptions<'a> {
    pub fn on_complete(mut self, f: impl FnOnce(&MySqlQueryResult) + Send + 'a) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&DataError) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn connection(mut self, pool: MySqlPool) -> Self {
        self.connection = Some(pool);
        self
    }
}

/// Count `?` placeholders outside quoted literals, quoted identifiers and
/// comments (`-- `, `#` and `/* */`, as MySQL reads them).
pub fn placeholder_count(query: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == '\\' && q != '`' {
                chars.next();
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '?' => count += 1,
            '#' => skip_line(&mut chars),
            // MySQL needs whitespace (or end of input) after the dashes
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                if chars.peek().map_or(true, |c| c.is_whitespace()) {
                    skip_line(&mut chars);
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            _ => {}
        }
    }

    count
}

fn skip_line(chars: &mut impl Iterator<Item = char>) {
    for c in chars.by_ref() {
        if c == '\n' {
            break;
        }
    }
}

pub(crate) fn check_arity(query: &str, columns: usize) -> Result<()> {
    let expected = placeholder_count(query);
    if expected != columns {
        return Err(DataError::ParameterArityMismatch {
            query: query.to_owned(),
            expected,
            actual: columns,
        });
    }
    Ok(())
}

pub(crate) fn bind_columns<'q, C: Column>(
    mut query: Query<'q, MySql, MySqlArguments>,
    columns: &'q [C],
) -> Query<'q, MySql, MySqlArguments> {
    for column in columns {
        query = match column.value() {
            Some(SqlValue::Char(c)) => query.bind(c.to_string()),
            Some(SqlValue::Integer(i)) => query.bind(*i),
            Some(SqlValue::Uuid(u)) => query.bind(u.hyphenated().to_string()),
            Some(SqlValue::Text(s)) => query.bind(s.as_str()),
            Some(SqlValue::Bool(b)) => query.bind(*b),
            None => query.bind(Option::<String>::None),
        };
    }
    query
}

/// Relational query executor over a MySQL pool.
#[derive(Debug, Clone)]
pub struct SqlRepository {
    pool: MySqlPool,
}

impl SqlRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Run a statement and return every row.
    ///
    /// When `columns` is given its length must match the placeholder count;
    /// a mismatch fails before any connection is acquired.
    pub async fn execute_query<C: Column>(
        &self,
        query: &str,
        columns: Option<&[C]>,
        options: QueryOptions<'_>,
    ) -> Result<Vec<MySqlRow>> {
        if let Some(columns) = columns {
            check_arity(query, columns.len())?;
        }
        let columns = columns.unwrap_or(&[]);

        let QueryOptions {
            on_complete,
            on_error,
            connection,
        } = options;
        let pool = connection.as_ref().unwrap_or(&self.pool);

        tracing::debug!(query = %query, params = columns.len(), "executing query");

        let outcome: std::result::Result<Vec<MySqlRow>, sqlx::Error> = async {
            let mut conn = pool.acquire().await?;
            bind_columns(sqlx::query(query), columns)
                .fetch_all(&mut *conn)
                .await
        }
        .await;

        match outcome {
            Ok(rows) => {
                if let Some(on_complete) = on_complete {
                    on_complete(&rows);
                }
                Ok(rows)
            }
            Err(e) => Err(report(e.into(), on_error)),
        }
    }

    /// Run a statement without bound values.
    pub async fn execute_unchecked(&self, query: &str) -> Result<Vec<MySqlRow>> {
        self.execute_query(query, None::<&[SqlColumn]>, QueryOptions::default())
            .await
    }

    /// Run a write statement and return the affected-row count.
    pub async fn execute_insert<C: Column>(
        &self,
        query: &str,
        columns: &[C],
        options: InsertOptions<'_>,
    ) -> Result<u64> {
        check_arity(query, columns.len())?;

        let InsertOptions {
            on_complete,
            on_error,
            connection,
        } = options;
        let pool = connection.as_ref().unwrap_or(&self.pool);

        tracing::debug!(query = %query, params = columns.len(), "executing insert");

        let outcome: std::result::Result<MySqlQueryResult, sqlx::Error> = async {
            let mut conn = pool.acquire().await?;
            bind_columns(sqlx::query(query), columns)
                .execute(&mut *conn)
                .await
        }
        .await;

        match outcome {
            Ok(result) => {
                if let Some(on_complete) = on_complete {
                    on_complete(&result);
                }
                Ok(result.rows_affected())
            }
            Err(e) => Err(report(e.into(), on_error)),
        }
    }

    /// Begin an atomic batch. Dropping the scope without committing rolls
    /// every statement back.
    pub async fn start_transaction(&self) -> Result<TransactionScope> {
        let tx = self.pool.begin().await?;
        Ok(TransactionScope::new(tx))
    }

    /// Create missing tables, then indexes. Indexes that already exist are
    /// skipped.
    pub async fn init_schema(&self, tables: &[String], indexes: &[String]) -> Result<()> {
        tracing::info!(tables = tables.len(), indexes = indexes.len(), "initialising schema");

        for table in tables {
            self.execute_unchecked(table).await.map_err(|e| {
                tracing::error!(error = %e, "failed to create table");
                e
            })?;
        }

        for index in indexes {
            match self.execute_unchecked(index).await {
                Ok(_) => {}
                Err(e) if e.is_duplicate_key_name() => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}

fn report(err: DataError, on_error: Option<ErrorCallback<'_>>) -> DataError {
    tracing::error!(error = %err, "statement failed");
    if let Some(on_error) = on_error {
        on_error(&err);
    }
    err
}
