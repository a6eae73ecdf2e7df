//! Postgres backend built on `tokio-postgres`.

use crate::pool::Connector;
use crate::store::types::{Row, Session, StoreError, Value};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, Config, NoTls};
use tracing::{debug, warn};
use uuid::Uuid;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens Postgres sessions from a connection string.
#[derive(Debug, Clone)]
pub struct PgConnector {
    config: Config,
}

impl PgConnector {
    /// Parses `dsn` (URL or key/value form).
    pub fn new(dsn: &str) -> Result<Self, StoreError> {
        let mut config = Config::from_str(dsn)
            .map_err(|err| StoreError::Connect(format!("invalid Postgres DSN: {err}")))?;
        if config.get_connect_timeout().is_none() {
            config.connect_timeout(CONNECT_TIMEOUT);
        }
        Ok(Self { config })
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Connection = PgSession;

    async fn connect(&self) -> Result<PgSession, StoreError> {
        let (client, connection) = self
            .config
            .connect(NoTls)
            .await
            .map_err(|err| StoreError::Connect(err.to_string()))?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!(error = %err, "postgres connection terminated");
            }
        });

        debug!("postgres session established");
        Ok(PgSession { client })
    }
}

/// One live Postgres session.
pub struct PgSession {
    client: Client,
}

#[async_trait]
impl Session for PgSession {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StoreError> {
        let bound: Vec<&(dyn ToSql + Sync)> = params.iter().map(as_pg_param).collect();
        let rows = self
            .client
            .query(sql, &bound)
            .await
            .map_err(map_pg_error)?;
        rows.iter().map(decode_row).collect()
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

static NULL_PARAM: Option<i32> = None;

fn as_pg_param(value: &Value) -> &(dyn ToSql + Sync) {
    match value {
        Value::Null => &NULL_PARAM,
        Value::Int32(v) => v,
        Value::Int64(v) => v,
        Value::Text(s) => s,
        Value::Uuid(u) => u,
        Value::Timestamp(t) => t,
    }
}

fn map_pg_error(err: tokio_postgres::Error) -> StoreError {
    if let Some(db) = err.as_db_error() {
        if *db.code() == SqlState::UNIQUE_VIOLATION {
            return StoreError::UniqueViolation(
                db.constraint().unwrap_or("unique").to_string(),
            );
        }
        return StoreError::Query(format!("{}: {}", db.code().code(), db.message()));
    }
    if err.is_closed() {
        StoreError::ConnectionLost(err.to_string())
    } else {
        StoreError::Query(err.to_string())
    }
}

fn decode_row(row: &tokio_postgres::Row) -> Result<Row, StoreError> {
    let mut values = Vec::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let decode_err = |err: tokio_postgres::Error| {
            StoreError::Decode(format!("column {}: {}", column.name(), err))
        };
        let value = if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(index)
                .map_err(decode_err)?
                .map_or(Value::Null, Value::Int32)
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(index)
                .map_err(decode_err)?
                .map_or(Value::Null, Value::Int64)
        } else if *ty == Type::TEXT || *ty == Type::VARCHAR {
            row.try_get::<_, Option<String>>(index)
                .map_err(decode_err)?
                .map_or(Value::Null, Value::Text)
        } else if *ty == Type::UUID {
            row.try_get::<_, Option<Uuid>>(index)
                .map_err(decode_err)?
                .map_or(Value::Null, Value::Uuid)
        } else if *ty == Type::TIMESTAMPTZ {
            row.try_get::<_, Option<DateTime<Utc>>>(index)
                .map_err(decode_err)?
                .map_or(Value::Null, Value::Timestamp)
        } else if *ty == Type::TIMESTAMP {
            row.try_get::<_, Option<NaiveDateTime>>(index)
                .map_err(decode_err)?
                .map_or(Value::Null, |naive| Value::Timestamp(naive.and_utc()))
        } else {
            return Err(StoreError::Decode(format!(
                "column {}: unsupported type {}",
                column.name(),
                ty
            )));
        };
        values.push(value);
    }
    Ok(Row::new(values))
}
