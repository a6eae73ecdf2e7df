//! Embedded SQLite backend built on `rusqlite`.
//!
//! Each pooled session is its own `rusqlite::Connection` to the same database
//! file. WAL mode lets readers proceed while a writer holds the lock, and the
//! busy timeout serialises concurrent writers instead of failing them.
//!
//! rusqlite is synchronous, so every open and every statement runs on
//! tokio's blocking thread pool. A writer waiting out the busy timeout
//! parks a blocking thread, never a runtime worker.

use crate::pool::Connector;
use crate::store::types::{Dialect, Row, Session, StoreError, Value};
use async_trait::async_trait;
use chrono::SecondsFormat;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens SQLite sessions on one database file, creating the schema if needed.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
}

impl SqliteConnector {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, rusqlite::Error> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.execute_batch(Dialect::Sqlite.schema())?;
        Ok(conn)
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    type Connection = SqliteSession;

    async fn connect(&self) -> Result<SqliteSession, StoreError> {
        let connector = self.clone();
        let conn = tokio::task::spawn_blocking(move || connector.open())
            .await
            .map_err(|err| StoreError::Connect(err.to_string()))?
            .map_err(|err| StoreError::Connect(err.to_string()))?;
        debug!(path = %self.path.display(), "sqlite session established");
        Ok(SqliteSession { conn: Some(conn) })
    }
}

/// One open SQLite connection.
///
/// The connection is moved onto a blocking thread for each statement and
/// moved back afterwards. If that thread never hands it back (a panic, or
/// the calling future was dropped mid-statement) the session is closed.
pub struct SqliteSession {
    conn: Option<Connection>,
}

fn run(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, StoreError> {
    let mut stmt = conn.prepare_cached(sql).map_err(map_sqlite_error)?;
    let columns = stmt.column_count();
    let mut rows = stmt
        .query(params_from_iter(params.iter()))
        .map_err(map_sqlite_error)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(map_sqlite_error)? {
        let mut values = Vec::with_capacity(columns);
        for index in 0..columns {
            let raw = row
                .get_ref(index)
                .map_err(|err| StoreError::Decode(err.to_string()))?;
            values.push(decode_value(index, raw)?);
        }
        out.push(Row::new(values));
    }
    Ok(out)
}

#[async_trait]
impl Session for SqliteSession {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StoreError> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| StoreError::ConnectionLost("sqlite session closed".to_string()))?;
        let sql = sql.to_string();
        let params = params.to_vec();

        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = run(&conn, &sql, &params);
            (conn, result)
        })
        .await
        .map_err(|err| StoreError::ConnectionLost(err.to_string()))?;

        self.conn = Some(conn);
        result
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;

        Ok(match self {
            Value::Null => ToSqlOutput::Owned(Sql::Null),
            Value::Int32(v) => ToSqlOutput::Owned(Sql::Integer(i64::from(*v))),
            Value::Int64(v) => ToSqlOutput::Owned(Sql::Integer(*v)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Uuid(u) => ToSqlOutput::Owned(Sql::Text(u.to_string())),
            Value::Timestamp(t) => {
                ToSqlOutput::Owned(Sql::Text(t.to_rfc3339_opts(SecondsFormat::Millis, true)))
            }
        })
    }
}

fn decode_value(index: usize, raw: ValueRef<'_>) -> Result<Value, StoreError> {
    match raw {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(v) => Ok(Value::Int64(v)),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map(Value::Text)
            .map_err(|err| StoreError::Decode(format!("column {index}: {err}"))),
        ValueRef::Real(_) | ValueRef::Blob(_) => Err(StoreError::Decode(format!(
            "column {index}: unsupported type {}",
            raw.data_type()
        ))),
    }
}

fn map_sqlite_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let extended = failure.extended_code;
            if extended == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || extended == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            {
                return StoreError::UniqueViolation(
                    message.clone().unwrap_or_else(|| "unique".to_string()),
                );
            }
            match failure.code {
                ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt => {
                    StoreError::ConnectionLost(err.to_string())
                }
                _ => StoreError::Query(err.to_string()),
            }
        }
        _ => StoreError::Query(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn session() -> (tempfile::TempDir, SqliteSession) {
        let dir = tempfile::tempdir().unwrap();
        let connector = SqliteConnector::new(dir.path().join("contacts.db"));
        let session = connector.connect().await.unwrap();
        (dir, session)
    }

    #[tokio::test]
    async fn test_connect_creates_schema() {
        let (_dir, mut session) = session().await;
        let rows = session
            .query("SELECT count(*) FROM contacts", &[])
            .await
            .unwrap();
        assert_eq!(rows[0].get(0), Some(&Value::Int64(0)));
    }

    #[tokio::test]
    async fn test_insert_returning_populates_defaults() {
        let (_dir, mut session) = session().await;
        let rows = session
            .query(
                "INSERT INTO contacts (external_id, phone_number) VALUES (?1, ?2) \
                 RETURNING id, date_created, date_updated",
                &[Value::Int32(5), Value::Text("555-0105".into())],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(matches!(rows[0].get(0), Some(Value::Int64(_))));
        assert_eq!(rows[0].get(1), rows[0].get(2));
    }

    #[tokio::test]
    async fn test_duplicate_external_id_is_unique_violation() {
        let (_dir, mut session) = session().await;
        let sql = "INSERT INTO contacts (external_id, phone_number) VALUES (?1, ?2)";
        let params = [Value::Int32(9), Value::Text("555".into())];
        session.query(sql, &params).await.unwrap();

        let err = session.query(sql, &params).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_bad_sql_is_query_error() {
        let (_dir, mut session) = session().await;
        let err = session.query("SELEC nonsense", &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
        assert!(!err.is_fatal());
    }
}
