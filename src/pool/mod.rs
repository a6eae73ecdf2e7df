//! Connection Pool Module
//!
//! A fixed-size pool of store sessions shared by every request handler.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ConnectionPool                          │
//! │                                                             │
//! │   Mutex<PoolState> ──┬── idle:    VecDeque<connection>      │
//! │                      ├── waiters: VecDeque<oneshot::Sender> │
//! │                      └── lent / vacant counters             │
//! │                                                             │
//! │   Connector ──> establishes sessions (eagerly at build,     │
//! │                 lazily for discarded slots)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use contactd::pool::{ConnectionPool, PoolConfig};
//! use contactd::store::SqliteConnector;
//!
//! let pool = ConnectionPool::new(SqliteConnector::new("contacts.db"), PoolConfig::new(8)).await?;
//! let conn = pool.acquire().await?;
//! // ... use the session ...
//! pool.release(conn);
//! ```

pub mod connection_pool;

// Re-export commonly used types
pub use connection_pool::{
    ConnectionPool, Connector, PoolConfig, PoolError, PoolStatus, PooledConnection,
};
