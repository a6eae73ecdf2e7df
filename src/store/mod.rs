//! Store Module
//!
//! The relational store behind the contact repository. Everything above this
//! module speaks in [`Value`]s, [`Row`]s and [`StoreError`]s; the backends
//! translate those to and from their drivers.
//!
//! ## Backends
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────────────────────────┐
//! │  Backend (enum)  │────>│ PgConnector     -> PgSession         │  tokio-postgres
//! │  from_url()      │     │ SqliteConnector -> SqliteSession     │  rusqlite (WAL file)
//! └──────────────────┘     └──────────────────────────────────────┘
//! ```
//!
//! Both backends implement [`crate::pool::Connector`] so the pool can
//! establish sessions, and [`Session`] so the repository can run statements.
//!
//! ## Schema
//!
//! ```text
//! contacts
//!   id            primary key, store-generated (UUID on Postgres, integer on SQLite)
//!   external_id   integer, unique
//!   phone_number  text
//!   date_created  timestamp, default now
//!   date_updated  timestamp, default now
//! ```

pub mod backend;
pub mod postgres;
pub mod sqlite;
pub mod types;

// Re-export commonly used types
pub use backend::{Backend, BackendSession};
pub use postgres::{PgConnector, PgSession};
pub use sqlite::{SqliteConnector, SqliteSession};
pub use types::{Dialect, Row, Session, StoreError, Value};
