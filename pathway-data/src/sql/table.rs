//! CREATE TABLE generation from a column list
//!
//! Table definitions are rare and static, so this is plain string assembly
//! over the [`Column`] contract.

use std::fmt::Write as _;

use super::column::Column;
use crate::error::{DataError, Result};

/// Schema of one table: ordered columns plus primary keys.
#[derive(Debug, Default)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Box<dyn Column>>,
    pub primary_keys: Vec<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_keys: Vec::new(),
        }
    }

    pub fn column(mut self, column: impl Column + 'static) -> Self {
        self.columns.push(Box::new(column));
        self
    }

    /// Adds a primary key; repeated names are kept once.
    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !self.primary_keys.contains(&key) {
            self.primary_keys.push(key);
        }
        self
    }

    /// Generate the DDL for this table.
    ///
    /// When `create_if_exists` is false the statement is guarded with
    /// `IF NOT EXISTS`.
    ///
    /// # Errors
    ///
    /// [`DataError::Schema`] when there are no columns or when an
    /// auto-increment column is nullable.
    pub fn get_or_create_table_query(&self, create_if_exists: bool) -> Result<String> {
        if self.columns.is_empty() {
            return Err(DataError::schema(format!(
                "table `{}` needs at least one column",
                self.name
            )));
        }

        let mut query = String::from("CREATE TABLE ");
        if !create_if_exists {
            query.push_str("IF NOT EXISTS ");
        }
        let _ = write!(query, "`{}`(", self.name);

        let mut definitions = Vec::with_capacity(self.columns.len() + 1);
        for column in &self.columns {
            definitions.push(column_definition(column.as_ref())?);
        }

        if !self.primary_keys.is_empty() {
            definitions.push(format!("PRIMARY KEY ({})", self.primary_keys.join(", ")));
        }

        query.push_str(&definitions.join(", "));
        query.push_str(");");
        Ok(query)
    }
}

fn column_definition(column: &dyn Column) -> Result<String> {
    let mut def = format!("{} {}", column.name(), column.sql_type());

    if column.length() > 1 {
        let _ = write!(def, "({})", column.length());
    }

    if column.is_auto_increment() {
        if column.is_nullable() {
            return Err(DataError::schema(format!(
                "auto incrementing column `{}` cannot be null",
                column.name()
            )));
        }
        def.push_str(" AUTO_INCREMENT");
    }

    if !column.is_nullable() {
        def.push_str(" NOT NULL");
    }

    Ok(def)
}
