//! Query Construction Module
//!
//! Pure translation from list filters to parameterized SQL.
//!
//! ## Example
//!
//! ```
//! use contactd::query::{QueryBuilder, QuerySpec};
//! use contactd::store::{Dialect, Value};
//!
//! let builder = QueryBuilder::new(Dialect::Postgres);
//! let stmt = builder.select(&QuerySpec::new().external_id(7));
//!
//! assert!(stmt.sql.ends_with("WHERE external_id = $1 LIMIT 10000"));
//! assert_eq!(stmt.params, vec![Value::Int32(7)]);
//! ```

pub mod builder;

// Re-export commonly used types
pub use builder::{QueryBuilder, QuerySpec, Statement, CONTACT_COLUMNS, DEFAULT_LIMIT, MAX_LIMIT};
