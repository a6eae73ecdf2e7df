//! Contact Repository
//!
//! The only component that talks to both the pool and the query builder.
//! Every operation follows the same lifecycle:
//!
//! ```text
//! NotStarted ──> ConnectionAcquired ──> QueryExecuted ──┬─> Success ─────────> release()
//!                                                       ├─> Conflict ────────> release()
//!                                                       ├─> Statement fault ─> release()
//!                                                       └─> Session fault ───> discard_and_replace()
//! ```
//!
//! A connection never leaves [`ContactRepository::execute`] still lent: it
//! is released or discarded on every path, and if the request future is
//! dropped mid-query the pooled handle's drop discards it.

use crate::contacts::record::{ContactRecord, NewContact};
use crate::error::{ContactError, ContactResult};
use crate::pool::{ConnectionPool, Connector};
use crate::query::{QueryBuilder, QuerySpec, Statement};
use crate::store::{Row, Session, StoreError};
use tracing::{debug, error, info, warn};

/// Lists and creates contacts through a shared connection pool.
pub struct ContactRepository<C: Connector> {
    pool: ConnectionPool<C>,
    builder: QueryBuilder,
}

impl<C: Connector> Clone for ContactRepository<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            builder: self.builder,
        }
    }
}

impl<C> ContactRepository<C>
where
    C: Connector,
    C::Connection: Session,
{
    pub fn new(pool: ConnectionPool<C>, builder: QueryBuilder) -> Self {
        Self { pool, builder }
    }

    pub fn pool(&self) -> &ConnectionPool<C> {
        &self.pool
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Returns the contacts matching `spec`, in store order.
    pub async fn list_contacts(&self, spec: &QuerySpec) -> ContactResult<Vec<ContactRecord>> {
        let stmt = self.builder.select(spec);
        let contacts: Vec<ContactRecord> = self
            .execute(&stmt, |rows| rows.iter().map(ContactRecord::from_row).collect())
            .await?;
        debug!(count = contacts.len(), "listed contacts");
        Ok(contacts)
    }

    /// Inserts a contact and returns it with its store-assigned fields.
    pub async fn create_contact(
        &self,
        external_id: i64,
        phone_number: &str,
    ) -> ContactResult<ContactRecord> {
        let new = NewContact::validate(external_id, phone_number)?;
        let stmt = self.builder.insert(new.external_id, &new.phone_number);

        let contact = self
            .execute(&stmt, |rows| match rows.first() {
                Some(row) => ContactRecord::from_row(row),
                None => Err(StoreError::Decode("insert returned no row".to_string())),
            })
            .await?;

        info!(id = %contact.id, external_id = contact.external_id, "contact created");
        Ok(contact)
    }

    /// Creates the contacts table if it does not exist yet.
    pub async fn init_schema(&self) -> ContactResult<()> {
        let stmt = self.builder.create_table();
        self.execute(&stmt, |_| Ok(())).await?;
        info!(dialect = self.builder.dialect().name(), "schema ready");
        Ok(())
    }

    /// Runs one statement on a pooled connection and maps its rows.
    async fn execute<T, F>(&self, stmt: &Statement, map: F) -> ContactResult<T>
    where
        F: FnOnce(Vec<Row>) -> Result<T, StoreError> + Send,
    {
        let mut conn = self.pool.acquire().await.map_err(|err| {
            warn!(error = %err, "could not acquire a connection");
            ContactError::from(err)
        })?;

        let result = match conn.query(&stmt.sql, &stmt.params).await {
            Ok(rows) => map(rows),
            Err(err) => Err(err),
        };

        match result {
            Ok(value) => {
                self.pool.release(conn);
                Ok(value)
            }
            Err(StoreError::UniqueViolation(constraint)) => {
                debug!(constraint = %constraint, "uniqueness conflict");
                self.pool.release(conn);
                Err(ContactError::Conflict(constraint))
            }
            Err(err) if err.is_fatal() || conn.is_closed() => {
                error!(
                    conn = conn.id(),
                    error = %err,
                    sql = %stmt.sql,
                    "session failed, discarding connection"
                );
                self.pool.discard_and_replace(conn);
                Err(ContactError::from(err))
            }
            Err(err) => {
                error!(
                    conn = conn.id(),
                    error = %err,
                    sql = %stmt.sql,
                    "statement failed"
                );
                self.pool.release(conn);
                Err(ContactError::from(err))
            }
        }
    }
}
