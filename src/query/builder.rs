//! Parameterized Contact Queries
//!
//! Translates a [`QuerySpec`] into SQL text plus an ordered list of bound
//! values. Client-supplied values only ever travel as bound parameters; the
//! SQL text is assembled from fixed fragments and placeholders.
//!
//! ## Clause Order
//!
//! ```text
//! SELECT <columns> FROM contacts
//!   [WHERE external_id = $n]          (int4)
//!   [  AND phone_number = $n]         (text)
//!   LIMIT $n | LIMIT <server default>  (int8, clamped to [0, max])
//!   [OFFSET $n]                       (int8)
//! ```
//!
//! The order is fixed so the same spec shape always yields the same SQL.

use crate::error::{ContactError, ContactResult};
use crate::store::{Dialect, Value};

/// Default page size when the client gives no limit.
pub const DEFAULT_LIMIT: i64 = 10_000;

/// Largest page size a client may ask for.
pub const MAX_LIMIT: i64 = 10_000;

/// Columns of a contact record, in decode order.
pub const CONTACT_COLUMNS: &str = "id, external_id, phone_number, date_created, date_updated";

/// Filter and pagination options for listing contacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySpec {
    pub external_id: Option<i32>,
    pub phone_number: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn external_id(mut self, external_id: i32) -> Self {
        self.external_id = Some(external_id);
        self
    }

    pub fn phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Builds a spec from decoded query-string pairs.
    ///
    /// Unknown keys are ignored and empty values count as absent. A key given
    /// more than once takes its last value.
    pub fn from_params<'a, I>(params: I) -> ContactResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut spec = QuerySpec::new();

        for (key, value) in params {
            if value.is_empty() {
                continue;
            }
            match key {
                "external_id" => {
                    let id = parse_integer(key, value)?;
                    let id = i32::try_from(id).map_err(|_| {
                        ContactError::validation("external_id is out of range")
                    })?;
                    spec.external_id = Some(id);
                }
                "phone_number" => spec.phone_number = Some(value.to_string()),
                "limit" => {
                    let limit = parse_integer(key, value)?;
                    if limit < 0 {
                        return Err(ContactError::validation("limit must not be negative"));
                    }
                    spec.limit = Some(limit);
                }
                "offset" => {
                    let offset = parse_integer(key, value)?;
                    let offset = u64::try_from(offset)
                        .map_err(|_| ContactError::validation("offset must not be negative"))?;
                    spec.offset = Some(offset);
                }
                _ => {}
            }
        }

        Ok(spec)
    }
}

fn parse_integer(key: &str, value: &str) -> ContactResult<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ContactError::validation(format!("{} must be an integer", key)))
}

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn new(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }

    /// Binds `value` and returns the placeholder that refers to it.
    fn bind(&mut self, dialect: Dialect, value: Value) -> String {
        self.params.push(value);
        dialect.placeholder(self.params.len())
    }
}

/// Builds contact statements for one SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryBuilder {
    dialect: Dialect,
    default_limit: i64,
    max_limit: i64,
}

impl QueryBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }

    /// Overrides the page-size policy. The default is clamped into `[0, max]`.
    pub fn with_limits(mut self, default_limit: i64, max_limit: i64) -> Self {
        self.max_limit = max_limit.max(0);
        self.default_limit = default_limit.clamp(0, self.max_limit);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn default_limit(&self) -> i64 {
        self.default_limit
    }

    pub fn max_limit(&self) -> i64 {
        self.max_limit
    }

    /// Clamps a requested page size into `[0, max_limit]`.
    pub fn clamp_limit(&self, limit: i64) -> i64 {
        limit.clamp(0, self.max_limit)
    }

    /// Builds the filtered, paginated `SELECT` for `spec`.
    pub fn select(&self, spec: &QuerySpec) -> Statement {
        let mut stmt = Statement::new(format!("SELECT {} FROM contacts", CONTACT_COLUMNS));
        let mut predicates = Vec::with_capacity(2);

        if let Some(external_id) = spec.external_id {
            let p = stmt.bind(self.dialect, Value::Int32(external_id));
            predicates.push(format!("external_id = {}", p));
        }
        if let Some(phone_number) = &spec.phone_number {
            let p = stmt.bind(self.dialect, Value::Text(phone_number.clone()));
            predicates.push(format!("phone_number = {}", p));
        }
        if !predicates.is_empty() {
            stmt.sql.push_str(" WHERE ");
            stmt.sql.push_str(&predicates.join(" AND "));
        }

        match spec.limit {
            Some(limit) => {
                let p = stmt.bind(self.dialect, Value::Int64(self.clamp_limit(limit)));
                stmt.sql.push_str(&format!(" LIMIT {}", p));
            }
            // Server-side constant, not client data.
            None => stmt.sql.push_str(&format!(" LIMIT {}", self.default_limit)),
        }

        if let Some(offset) = spec.offset {
            let offset = i64::try_from(offset).unwrap_or(i64::MAX);
            let p = stmt.bind(self.dialect, Value::Int64(offset));
            stmt.sql.push_str(&format!(" OFFSET {}", p));
        }

        stmt
    }

    /// The idempotent `CREATE TABLE` for this dialect.
    pub fn create_table(&self) -> Statement {
        Statement::new(self.dialect.schema().to_string())
    }

    /// Builds the `INSERT ... RETURNING` for a new contact.
    pub fn insert(&self, external_id: i32, phone_number: &str) -> Statement {
        let mut stmt = Statement::new(String::new());
        let p1 = stmt.bind(self.dialect, Value::Int32(external_id));
        let p2 = stmt.bind(self.dialect, Value::Text(phone_number.to_string()));
        stmt.sql = format!(
            "INSERT INTO contacts (external_id, phone_number) VALUES ({}, {}) RETURNING {}",
            p1, p2, CONTACT_COLUMNS
        );
        stmt
    }
}
