//! Runtime backend selection from a connection string.

use crate::pool::Connector;
use crate::store::postgres::{PgConnector, PgSession};
use crate::store::sqlite::{SqliteConnector, SqliteSession};
use crate::store::types::{Dialect, Row, Session, StoreError, Value};
use async_trait::async_trait;

/// Connector for whichever backend the connection string names.
#[derive(Debug, Clone)]
pub enum Backend {
    Postgres(PgConnector),
    Sqlite(SqliteConnector),
}

impl Backend {
    /// `postgres://` and `postgresql://` select Postgres; `sqlite://<path>`
    /// or a bare path select SQLite.
    pub fn from_url(url: &str) -> Result<Self, StoreError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return PgConnector::new(url).map(Backend::Postgres);
        }
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        if path.is_empty() {
            return Err(StoreError::Connect("empty database path".to_string()));
        }
        Ok(Backend::Sqlite(SqliteConnector::new(path)))
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Backend::Postgres(_) => Dialect::Postgres,
            Backend::Sqlite(_) => Dialect::Sqlite,
        }
    }
}

#[async_trait]
impl Connector for Backend {
    type Connection = BackendSession;

    async fn connect(&self) -> Result<BackendSession, StoreError> {
        match self {
            Backend::Postgres(connector) => connector.connect().await.map(BackendSession::Postgres),
            Backend::Sqlite(connector) => connector.connect().await.map(BackendSession::Sqlite),
        }
    }
}

/// A session opened by [`Backend`].
pub enum BackendSession {
    Postgres(PgSession),
    Sqlite(SqliteSession),
}

#[async_trait]
impl Session for BackendSession {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StoreError> {
        match self {
            BackendSession::Postgres(session) => session.query(sql, params).await,
            BackendSession::Sqlite(session) => session.query(sql, params).await,
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            BackendSession::Postgres(session) => session.is_closed(),
            BackendSession::Sqlite(session) => session.is_closed(),
        }
    }
}
