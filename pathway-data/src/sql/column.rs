//! Typed column model
//!
//! A column is either a *value* (a literal to bind into a statement) or a
//! *definition* (name, length, nullability and type used to generate DDL).
//! The executor and the schema builder only talk to the [`Column`] trait, so
//! new kinds plug in without touching either.

use std::fmt;

use uuid::Uuid;

/// A literal bound into a parameterized statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Char(char),
    Integer(i64),
    /// Stored as its hyphenated text form in a `VARCHAR(36)` column.
    Uuid(Uuid),
    Text(String),
    Bool(bool),
}

/// Contract every column kind satisfies.
pub trait Column: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// The literal to bind, absent for schema-only columns.
    fn value(&self) -> Option<&SqlValue>;

    fn length(&self) -> u32;

    fn is_nullable(&self) -> bool;

    /// SQL type name as written in DDL, without the length suffix.
    fn sql_type(&self) -> &'static str;

    fn is_auto_increment(&self) -> bool {
        false
    }
}

impl<C: Column + ?Sized> Column for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn value(&self) -> Option<&SqlValue> {
        (**self).value()
    }

    fn length(&self) -> u32 {
        (**self).length()
    }

    fn is_nullable(&self) -> bool {
        (**self).is_nullable()
    }

    fn sql_type(&self) -> &'static str {
        (**self).sql_type()
    }

    fn is_auto_increment(&self) -> bool {
        (**self).is_auto_increment()
    }
}

/// Column kinds used by the application's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Char,
    Integer { auto_increment: bool },
    Uuid,
    Varchar,
    Text,
    Bool,
}

impl ColumnKind {
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Char => "CHAR",
            Self::Integer { .. } => "INT",
            Self::Uuid => "VARCHAR(36)",
            Self::Varchar => "VARCHAR",
            Self::Text => "TEXT",
            Self::Bool => "BOOL",
        }
    }
}

/// Standard [`Column`] implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlColumn {
    name: String,
    value: Option<SqlValue>,
    length: u32,
    nullable: bool,
    kind: ColumnKind,
}

impl SqlColumn {
    fn with_value(name: impl Into<String>, kind: ColumnKind, value: SqlValue) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            length: 1,
            nullable: false,
            kind,
        }
    }

    fn definition(name: impl Into<String>, kind: ColumnKind, nullable: bool, length: u32) -> Self {
        Self {
            name: name.into(),
            value: None,
            length,
            nullable,
            kind,
        }
    }

    // Value mode

    pub fn char(name: impl Into<String>, value: char) -> Self {
        Self::with_value(name, ColumnKind::Char, SqlValue::Char(value))
    }

    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self::with_value(
            name,
            ColumnKind::Integer {
                auto_increment: false,
            },
            SqlValue::Integer(value),
        )
    }

    pub fn uuid(name: impl Into<String>, value: Uuid) -> Self {
        Self::with_value(name, ColumnKind::Uuid, SqlValue::Uuid(value))
    }

    pub fn varchar(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_value(name, ColumnKind::Varchar, SqlValue::Text(value.into()))
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_value(name, ColumnKind::Text, SqlValue::Text(value.into()))
    }

    pub fn bool(name: impl Into<String>, value: bool) -> Self {
        Self::with_value(name, ColumnKind::Bool, SqlValue::Bool(value))
    }

    // Schema mode

    pub fn char_for_table(name: impl Into<String>, nullable: bool, length: u32) -> Self {
        Self::definition(name, ColumnKind::Char, nullable, length)
    }

    pub fn integer_for_table(name: impl Into<String>, nullable: bool, auto_increment: bool) -> Self {
        Self::definition(name, ColumnKind::Integer { auto_increment }, nullable, 1)
    }

    /// UUID columns always hold the 36-character hyphenated form.
    pub fn uuid_for_table(name: impl Into<String>, nullable: bool) -> Self {
        Self::definition(name, ColumnKind::Uuid, nullable, 1)
    }

    pub fn varchar_for_table(name: impl Into<String>, nullable: bool, length: u32) -> Self {
        Self::definition(name, ColumnKind::Varchar, nullable, length)
    }

    pub fn text_for_table(name: impl Into<String>, nullable: bool) -> Self {
        Self::definition(name, ColumnKind::Text, nullable, 1)
    }

    pub fn bool_for_table(name: impl Into<String>, nullable: bool) -> Self {
        Self::definition(name, ColumnKind::Bool, nullable, 1)
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }
}

impl Column for SqlColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Option<&SqlValue> {
        self.value.as_ref()
    }

    fn length(&self) -> u32 {
        self.length
    }

    fn is_nullable(&self) -> bool {
        self.nullable
    }

    fn sql_type(&self) -> &'static str {
        self.kind.sql_type()
    }

    fn is_auto_increment(&self) -> bool {
        matches!(self.kind, ColumnKind::Integer { auto_increment: true })
    }
}
