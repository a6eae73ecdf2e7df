//! Dialect-Neutral Store Types
//!
//! The repository never sees a driver type. Parameters go down as [`Value`]s,
//! result rows come back as [`Row`]s of [`Value`]s, and every driver failure
//! is folded into a [`StoreError`] so the layers above can decide between
//! "conflict", "retry on another connection" and "give up".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// A single bound parameter or decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    /// 32-bit integer, the store's `INT4` / `INTEGER` column type.
    Int32(i32),
    /// 64-bit integer, used for `LIMIT` / `OFFSET` and SQLite integers.
    Int64(i64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Short type name used in decode error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int32(_) => "int4",
            Value::Int64(_) => "int8",
            Value::Text(_) => "text",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

/// One result row, columns in `SELECT` order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Errors reported by a store session.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// A new session could not be established
    #[error("connect failed: {0}")]
    Connect(String),

    /// A uniqueness constraint rejected the write
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The session's transport is gone; the handle is unusable
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The store rejected or failed the statement
    #[error("query failed: {0}")]
    Query(String),

    /// A result column could not be decoded
    #[error("malformed result: {0}")]
    Decode(String),
}

impl StoreError {
    /// Returns true if the error means the session itself must not be reused.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::ConnectionLost(_) | StoreError::Connect(_))
    }
}

/// SQL flavour of a backend: placeholder syntax and bootstrap schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Renders the 1-based positional placeholder `n`.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::Sqlite => format!("?{}", n),
        }
    }

    /// Idempotent `CREATE TABLE` for the contacts relation.
    pub fn schema(self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "CREATE TABLE IF NOT EXISTS contacts (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    external_id INTEGER NOT NULL UNIQUE,
                    phone_number TEXT NOT NULL,
                    date_created TIMESTAMPTZ NOT NULL DEFAULT now(),
                    date_updated TIMESTAMPTZ NOT NULL DEFAULT now()
                )"
            }
            Dialect::Sqlite => {
                "CREATE TABLE IF NOT EXISTS contacts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    external_id INTEGER NOT NULL UNIQUE,
                    phone_number TEXT NOT NULL,
                    date_created TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                    date_updated TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                )"
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }
}

/// One live session with the store.
///
/// A session is only ever driven by one logical operation at a time; the
/// pool hands out `&mut` access through a lent handle.
#[async_trait]
pub trait Session: Send {
    /// Executes `sql` with positional `params` and returns every result row.
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StoreError>;

    /// Returns true once the underlying transport has shut down.
    fn is_closed(&self) -> bool {
        false
    }
}
