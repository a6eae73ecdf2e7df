//! Fixed-Size FIFO Connection Pool
//!
//! The pool owns exactly `capacity` slots for the lifetime of the process.
//! A slot is always in exactly one of three places:
//!
//! ```text
//!            acquire()                      release()
//!   ┌──────┐ ───────────> ┌──────────┐ ───────────────> ┌──────┐
//!   │ idle │              │   lent   │                  │ idle │ (or straight to
//!   └──────┘ <─────────── └──────────┘                  └──────┘  the first waiter)
//!       ▲     replacement      │
//!       │     established      │ discard_and_replace()
//!       │                      ▼
//!       │                ┌──────────┐
//!       └─────────────── │  vacant  │  (re-established lazily by the next acquire)
//!          acquire()     └──────────┘
//! ```
//!
//! `idle + lent + vacant == capacity` holds under the state lock at all
//! times. A replacement being established counts as lent until it is ready.
//!
//! ## Fairness
//!
//! When no connection is idle, acquirers join a FIFO queue of oneshot
//! channels. `release` hands the connection directly to the front waiter
//! instead of pushing it to the idle set, so a late arrival can never
//! overtake a queued acquirer and no wakeup can be lost.
//!
//! A slot that goes vacant while acquirers are queued (a discard, or a
//! failed or abandoned reconnect) is refilled in the background for them
//! straight away, so no queued acquirer waits beside an empty slot.

use crate::store::StoreError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

/// Establishes new store sessions for the pool.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The session type handed out by the pool.
    type Connection: Send + 'static;

    /// Opens one new session.
    async fn connect(&self) -> Result<Self::Connection, StoreError>;
}

/// Errors returned by the connection pool.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoolError {
    /// The requested pool size is zero
    #[error("pool size must be at least 1")]
    InvalidSize,

    /// Eager construction could not open every connection
    #[error("failed to establish connection {index} of {capacity}: {source}")]
    Build {
        index: usize,
        capacity: usize,
        #[source]
        source: StoreError,
    },

    /// No connection became available before the deadline
    #[error("timed out after {0:?} waiting for a connection")]
    Timeout(Duration),

    /// Re-establishing a vacant slot failed
    #[error("failed to establish connection: {0}")]
    Connect(#[from] StoreError),

    /// The pool went away while waiting
    #[error("connection pool closed")]
    Closed,
}

/// Pool construction parameters.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of connections, fixed for the pool's lifetime
    pub size: usize,
    /// Default deadline for [`ConnectionPool::acquire`]; `None` waits forever
    pub acquire_timeout: Option<Duration>,
}

impl PoolConfig {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            acquire_timeout: None,
        }
    }

    pub fn acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// A point-in-time view of the pool, taken under the state lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub capacity: usize,
    pub idle: usize,
    pub lent: usize,
    pub vacant: usize,
    pub waiting: usize,
}

/// A connection together with its slot id (for logging).
struct Checkout<T> {
    id: u64,
    conn: T,
}

type Handoff<T> = Result<Checkout<T>, PoolError>;

struct Waiter<T> {
    id: u64,
    tx: oneshot::Sender<Handoff<T>>,
}

struct PoolState<T> {
    idle: VecDeque<Checkout<T>>,
    waiters: VecDeque<Waiter<T>>,
    lent: usize,
    vacant: usize,
    next_conn_id: u64,
    next_waiter_id: u64,
}

impl<T> PoolState<T> {
    fn next_conn_id(&mut self) -> u64 {
        let id = self.next_conn_id;
        self.next_conn_id += 1;
        id
    }

    /// Moves one lent slot to vacant.
    fn vacate(&mut self) {
        self.lent -= 1;
        self.vacant += 1;
    }
}

struct Shared<C: Connector> {
    connector: C,
    capacity: usize,
    acquire_timeout: Option<Duration>,
    state: Mutex<PoolState<C::Connection>>,
}

impl<C: Connector> Shared<C> {
    fn lock(&self) -> MutexGuard<'_, PoolState<C::Connection>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lend(self: &Arc<Self>, checkout: Checkout<C::Connection>) -> PooledConnection<C> {
        trace!(conn = checkout.id, "connection lent");
        PooledConnection {
            id: checkout.id,
            conn: Some(checkout.conn),
            pool: Arc::clone(self),
        }
    }

    /// Returns a healthy connection: to the first live waiter, else to idle.
    fn checkin(&self, mut checkout: Checkout<C::Connection>) {
        let mut state = self.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.tx.send(Ok(checkout)) {
                Ok(()) => {
                    trace!(waiter = waiter.id, "connection handed to waiter");
                    return;
                }
                // The waiter gave up between queueing and now; try the next one.
                Err(Ok(returned)) => checkout = returned,
                Err(Err(_)) => return,
            }
        }
        state.lent -= 1;
        state.idle.push_back(checkout);
    }

    /// Drops a broken connection and schedules or defers its replacement.
    fn discard_slot(self: &Arc<Self>, id: u64, conn: C::Connection) {
        drop(conn);

        let mut state = self.lock();
        state.vacate();
        if state.waiters.is_empty() {
            debug!(conn = id, "connection discarded, slot left vacant");
        } else {
            debug!(conn = id, "connection discarded, establishing replacement");
            self.refill_for_waiters(&mut state);
        }
    }

    /// Starts a background replacement for every vacant slot a queued
    /// acquirer could use. Must be called with the state lock held, after
    /// any change that can leave a slot vacant.
    fn refill_for_waiters(self: &Arc<Self>, state: &mut PoolState<C::Connection>) {
        let wanted = state.vacant.min(state.waiters.len());
        if wanted == 0 {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                vacant = state.vacant,
                waiting = state.waiters.len(),
                "no runtime to establish replacements, slots left vacant"
            );
            return;
        };

        for _ in 0..wanted {
            state.vacant -= 1;
            state.lent += 1;
            let shared = Arc::clone(self);
            handle.spawn(async move { shared.replace().await });
        }
    }

    async fn replace(self: Arc<Self>) {
        match self.connector.connect().await {
            Ok(conn) => {
                let id = self.lock().next_conn_id();
                info!(conn = id, "replacement connection established");
                self.checkin(Checkout { id, conn });
            }
            Err(err) => {
                error!(error = %err, "failed to establish replacement connection");
                let mut state = self.lock();
                state.vacate();
                if let Some(waiter) = state.waiters.pop_front() {
                    let _ = waiter.tx.send(Err(PoolError::Connect(err)));
                }
                self.refill_for_waiters(&mut state);
            }
        }
    }
}

/// A bounded, fixed-size pool of store connections.
///
/// Cloning the pool is cheap; all clones share the same slots.
pub struct ConnectionPool<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Builds the pool, establishing all `config.size` connections up front.
    ///
    /// If any connection fails, the ones already opened are closed and the
    /// first failure is returned; no partial pool is ever handed out.
    pub async fn new(connector: C, config: PoolConfig) -> Result<Self, PoolError> {
        let capacity = config.size;
        if capacity == 0 {
            return Err(PoolError::InvalidSize);
        }

        let mut idle = VecDeque::with_capacity(capacity);
        for index in 0..capacity {
            match connector.connect().await {
                Ok(conn) => idle.push_back(Checkout {
                    id: index as u64,
                    conn,
                }),
                Err(source) => {
                    error!(index, capacity, error = %source, "connection pool construction failed");
                    return Err(PoolError::Build {
                        index,
                        capacity,
                        source,
                    });
                }
            }
        }

        info!(capacity, "connection pool ready");

        Ok(Self {
            shared: Arc::new(Shared {
                connector,
                capacity,
                acquire_timeout: config.acquire_timeout,
                state: Mutex::new(PoolState {
                    idle,
                    waiters: VecDeque::new(),
                    lent: 0,
                    vacant: 0,
                    next_conn_id: capacity as u64,
                    next_waiter_id: 0,
                }),
            }),
        })
    }

    /// Acquires a connection using the pool's default deadline.
    pub async fn acquire(&self) -> Result<PooledConnection<C>, PoolError> {
        self.acquire_timeout(self.shared.acquire_timeout).await
    }

    /// Acquires a connection, waiting at most `timeout` (forever if `None`).
    pub async fn acquire_timeout(
        &self,
        timeout: Option<Duration>,
    ) -> Result<PooledConnection<C>, PoolError> {
        let next = {
            let mut state = self.shared.lock();

            if let Some(checkout) = state.idle.pop_front() {
                state.lent += 1;
                Next::Ready(checkout)
            } else if state.vacant > 0 {
                state.vacant -= 1;
                state.lent += 1;
                Next::Vacancy(state.next_conn_id())
            } else {
                let id = state.next_waiter_id;
                state.next_waiter_id += 1;
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(Waiter { id, tx });
                trace!(waiter = id, queued = state.waiters.len(), "waiting for a connection");

                Next::Wait(WaitTicket {
                    shared: Arc::clone(&self.shared),
                    id,
                    rx: Some(rx),
                })
            }
        };

        let mut ticket = match next {
            Next::Ready(checkout) => return Ok(self.shared.lend(checkout)),
            Next::Vacancy(id) => return self.fill_vacancy(id).await,
            Next::Wait(ticket) => ticket,
        };

        let handoff = match timeout {
            None => ticket.wait().await,
            Some(limit) => {
                let waited = tokio::time::timeout(limit, ticket.wait()).await;
                match waited {
                    Ok(handoff) => handoff,
                    // A release may have raced the deadline; honor it if so.
                    Err(_) => match ticket.abandon() {
                        Some(handoff) => handoff,
                        None => {
                            debug!(timeout_ms = limit.as_millis() as u64, "acquire timed out");
                            return Err(PoolError::Timeout(limit));
                        }
                    },
                }
            }
        };

        handoff.map(|checkout| self.shared.lend(checkout))
    }

    /// Returns a healthy connection to the pool.
    pub fn release(&self, conn: PooledConnection<C>) {
        conn.release();
    }

    /// Removes a broken connection and re-establishes its slot.
    pub fn discard_and_replace(&self, conn: PooledConnection<C>) {
        conn.discard();
    }

    /// Takes a consistent snapshot of the pool's slots.
    pub fn status(&self) -> PoolStatus {
        let state = self.shared.lock();
        PoolStatus {
            capacity: self.shared.capacity,
            idle: state.idle.len(),
            lent: state.lent,
            vacant: state.vacant,
            waiting: state.waiters.len(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn idle_count(&self) -> usize {
        self.shared.lock().idle.len()
    }

    async fn fill_vacancy(&self, id: u64) -> Result<PooledConnection<C>, PoolError> {
        let mut guard = VacancyGuard {
            shared: &self.shared,
            armed: true,
        };

        let result = self.shared.connector.connect().await;
        guard.armed = false;

        match result {
            Ok(conn) => {
                info!(conn = id, "vacant slot re-established");
                Ok(self.shared.lend(Checkout { id, conn }))
            }
            Err(err) => {
                error!(error = %err, "failed to re-establish vacant slot");
                let mut state = self.shared.lock();
                state.vacate();
                self.shared.refill_for_waiters(&mut state);
                Err(PoolError::Connect(err))
            }
        }
    }
}

/// What an acquirer does after inspecting the pool state.
enum Next<C: Connector> {
    Ready(Checkout<C::Connection>),
    Vacancy(u64),
    Wait(WaitTicket<C>),
}

/// Puts a claimed vacancy back if the acquiring future is dropped mid-connect.
struct VacancyGuard<'a, C: Connector> {
    shared: &'a Arc<Shared<C>>,
    armed: bool,
}

impl<C: Connector> Drop for VacancyGuard<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.shared.lock();
            state.vacate();
            self.shared.refill_for_waiters(&mut state);
        }
    }
}

/// A queued acquirer's place in line.
///
/// Dropping an unfinished ticket leaves the queue, and returns any connection
/// that was handed over in the meantime.
struct WaitTicket<C: Connector> {
    shared: Arc<Shared<C>>,
    id: u64,
    rx: Option<oneshot::Receiver<Handoff<C::Connection>>>,
}

impl<C: Connector> WaitTicket<C> {
    async fn wait(&mut self) -> Handoff<C::Connection> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(PoolError::Closed);
        };
        let result = rx.await;
        self.rx = None;
        result.unwrap_or(Err(PoolError::Closed))
    }

    fn abandon(&mut self) -> Option<Handoff<C::Connection>> {
        let mut rx = self.rx.take()?;
        {
            let mut state = self.shared.lock();
            state.waiters.retain(|waiter| waiter.id != self.id);
        }
        // Any handoff happened under the lock we just released.
        rx.try_recv().ok()
    }
}

impl<C: Connector> Drop for WaitTicket<C> {
    fn drop(&mut self) {
        if let Some(Ok(checkout)) = self.abandon() {
            trace!(waiter = self.id, "cancelled waiter returned its connection");
            self.shared.checkin(checkout);
        }
    }
}

/// A connection lent out by the pool.
///
/// Give it back with [`release`](Self::release) or, if the session is
/// broken, [`discard`](Self::discard). Dropping it without either is treated
/// as a discard, since the session may have been interrupted mid-statement.
pub struct PooledConnection<C: Connector> {
    id: u64,
    conn: Option<C::Connection>,
    pool: Arc<Shared<C>>,
}

impl<C: Connector> PooledConnection<C> {
    /// Slot id of this connection, stable until it is replaced.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the connection to the idle set (or the first waiter).
    pub fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            trace!(conn = self.id, "connection released");
            self.pool.checkin(Checkout { id: self.id, conn });
        }
    }

    /// Drops the connection and re-establishes its slot.
    pub fn discard(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.discard_slot(self.id, conn);
        }
    }
}

impl<C: Connector> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("returned", &self.conn.is_none())
            .finish()
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("pooled connection already returned")
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .expect("pooled connection already returned")
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!(conn = self.id, "connection dropped without release, discarding");
            self.pool.discard_slot(self.id, conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    /// Hands out sequential integers; fails the `fail_at`-th connect if set.
    struct TestConnector {
        made: Arc<AtomicUsize>,
        fail_at: Option<usize>,
    }

    impl TestConnector {
        fn new() -> Self {
            Self {
                made: Arc::new(AtomicUsize::new(0)),
                fail_at: None,
            }
        }

        fn failing_at(n: usize) -> Self {
            Self {
                made: Arc::new(AtomicUsize::new(0)),
                fail_at: Some(n),
            }
        }
    }

    #[async_trait]
    impl Connector for TestConnector {
        type Connection = usize;

        async fn connect(&self) -> Result<usize, StoreError> {
            let n = self.made.fetch_add(1, Ordering::SeqCst);
            if Some(n) == self.fail_at {
                return Err(StoreError::Connect("refused".to_string()));
            }
            Ok(n)
        }
    }

    async fn pool_of(size: usize) -> ConnectionPool<TestConnector> {
        ConnectionPool::new(TestConnector::new(), PoolConfig::new(size))
            .await
            .unwrap()
    }

    async fn wait_for_waiters<C: Connector>(pool: &ConnectionPool<C>, n: usize) {
        for _ in 0..200 {
            if pool.status().waiting == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} waiters, got {:?}", n, pool.status());
    }

    fn assert_balanced(status: PoolStatus) {
        assert_eq!(
            status.idle + status.lent + status.vacant,
            status.capacity,
            "unbalanced pool: {:?}",
            status
        );
    }

    #[tokio::test]
    async fn test_connections_established_eagerly() {
        let connector = TestConnector::new();
        let made = Arc::clone(&connector.made);
        let pool = ConnectionPool::new(connector, PoolConfig::new(4))
            .await
            .unwrap();

        assert_eq!(made.load(Ordering::SeqCst), 4);
        assert_eq!(pool.idle_count(), 4);
        assert_eq!(pool.capacity(), 4);
    }

    #[tokio::test]
    async fn test_zero_size_rejected() {
        let result = ConnectionPool::new(TestConnector::new(), PoolConfig::new(0)).await;
        assert_eq!(result.err(), Some(PoolError::InvalidSize));
    }

    #[tokio::test]
    async fn test_construction_fails_atomically() {
        let result = ConnectionPool::new(TestConnector::failing_at(2), PoolConfig::new(4)).await;
        match result {
            Err(PoolError::Build {
                index, capacity, ..
            }) => {
                assert_eq!(index, 2);
                assert_eq!(capacity, 4);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("pool should not have been built"),
        }
    }

    #[tokio::test]
    async fn test_idle_count_restored_after_release() {
        for size in 1..=5 {
            let pool = pool_of(size).await;
            let mut held = Vec::new();
            for _ in 0..size {
                held.push(pool.acquire().await.unwrap());
                assert_balanced(pool.status());
            }
            assert_eq!(pool.idle_count(), 0);
            for conn in held {
                pool.release(conn);
            }
            assert_eq!(pool.idle_count(), size);
            assert_balanced(pool.status());
        }
    }

    #[tokio::test]
    async fn test_lent_connections_are_distinct() {
        let pool = pool_of(3).await;
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();
        let mut seen = vec![*a, *b, *c];
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_single_slot_is_exclusive() {
        let pool = pool_of(1).await;
        let first = pool.acquire().await.unwrap();

        let contender = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|conn| conn.release()) })
        };

        wait_for_waiters(&pool, 1).await;
        assert!(!contender.is_finished());

        pool.release(first);
        assert_ok!(contender.await.unwrap());
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiters_served_in_fifo_order() {
        let pool = pool_of(1).await;
        let held = pool.acquire().await.unwrap();
        let (order_tx, mut order_rx) = mpsc::unbounded_channel();

        let mut tasks = Vec::new();
        for name in 0..4usize {
            let task_pool = pool.clone();
            let order_tx = order_tx.clone();
            tasks.push(tokio::spawn(async move {
                let conn = task_pool.acquire().await.unwrap();
                order_tx.send(name).unwrap();
                task_pool.release(conn);
            }));
            wait_for_waiters(&pool, name + 1).await;
        }

        pool.release(held);
        for task in tasks {
            task.await.unwrap();
        }

        let mut order = Vec::new();
        while let Ok(name) = order_rx.try_recv() {
            order.push(name);
        }
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_acquire_timeout() {
        let pool = pool_of(1).await;
        let _held = pool.acquire().await.unwrap();

        let result = pool.acquire_timeout(Some(Duration::from_millis(20))).await;
        assert_eq!(
            result.err(),
            Some(PoolError::Timeout(Duration::from_millis(20)))
        );
        // The timed-out acquirer must not linger in the queue.
        assert_eq!(pool.status().waiting, 0);
    }

    #[tokio::test]
    async fn test_default_timeout_from_config() {
        let config = PoolConfig::new(1).acquire_timeout(Some(Duration::from_millis(10)));
        let pool = ConnectionPool::new(TestConnector::new(), config)
            .await
            .unwrap();
        let _held = pool.acquire().await.unwrap();
        assert_err!(pool.acquire().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_waiter_does_not_leak() {
        let pool = pool_of(1).await;
        let held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|conn| conn.release()) })
        };
        wait_for_waiters(&pool, 1).await;
        waiter.abort();
        let _ = waiter.await;

        pool.release(held);
        let status = pool.status();
        assert_eq!(status.idle, 1);
        assert_eq!(status.waiting, 0);
        assert_balanced(status);
    }

    #[tokio::test]
    async fn test_discard_without_waiters_refills_lazily() {
        let connector = TestConnector::new();
        let made = Arc::clone(&connector.made);
        let pool = ConnectionPool::new(connector, PoolConfig::new(2))
            .await
            .unwrap();

        let conn = pool.acquire().await.unwrap();
        pool.discard_and_replace(conn);

        let status = pool.status();
        assert_eq!(status.vacant, 1);
        assert_eq!(status.idle, 1);
        assert_balanced(status);
        assert_eq!(made.load(Ordering::SeqCst), 2);

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_eq!(made.load(Ordering::SeqCst), 3);
        assert_eq!(pool.status().vacant, 0);
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_discard_with_waiter_hands_over_replacement() {
        let pool = pool_of(1).await;
        let broken = pool.acquire().await.unwrap();
        let broken_value = *broken;

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let conn = pool.acquire().await.unwrap();
                let value = *conn;
                pool.release(conn);
                value
            })
        };
        wait_for_waiters(&pool, 1).await;

        pool.discard_and_replace(broken);
        let replacement = waiter.await.unwrap();
        assert_ne!(replacement, broken_value);

        let status = pool.status();
        assert_eq!(status.idle, 1);
        assert_balanced(status);
    }

    #[tokio::test]
    async fn test_failed_refill_returns_slot_to_vacant() {
        let pool = ConnectionPool::new(TestConnector::failing_at(1), PoolConfig::new(1))
            .await
            .unwrap();
        let conn = pool.acquire().await.unwrap();
        pool.discard_and_replace(conn);

        let result = pool.acquire().await;
        assert!(matches!(result, Err(PoolError::Connect(_))));
        assert_eq!(pool.status().vacant, 1);

        // The next attempt succeeds and fills the slot.
        let conn = pool.acquire().await.unwrap();
        pool.release(conn);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_replacement_still_serves_later_waiters() {
        let pool = ConnectionPool::new(TestConnector::failing_at(1), PoolConfig::new(1))
            .await
            .unwrap();
        let broken = pool.acquire().await.unwrap();

        let mut waiters = Vec::new();
        for queued in 1..=2 {
            let task_pool = pool.clone();
            waiters.push(tokio::spawn(async move {
                task_pool
                    .acquire_timeout(Some(Duration::from_secs(5)))
                    .await
                    .map(|conn| {
                        let value = *conn;
                        task_pool.release(conn);
                        value
                    })
            }));
            wait_for_waiters(&pool, queued).await;
        }

        pool.discard_and_replace(broken);

        let mut waiters = waiters.into_iter();
        let first = waiters.next().unwrap().await.unwrap();
        assert!(matches!(first, Err(PoolError::Connect(_))), "got {:?}", first);

        // The second waiter gets a fresh connection, not a timeout.
        let second = waiters.next().unwrap().await.unwrap();
        assert_eq!(second, Ok(2));

        let status = pool.status();
        assert_eq!(status.idle, 1);
        assert_eq!(status.waiting, 0);
        assert_balanced(status);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_vacancy_fill_wakes_queued_waiter() {
        // Connect #1 fails slowly so a second acquirer queues behind it.
        struct SlowFailConnector {
            made: AtomicUsize,
        }

        #[async_trait]
        impl Connector for SlowFailConnector {
            type Connection = usize;

            async fn connect(&self) -> Result<usize, StoreError> {
                let n = self.made.fetch_add(1, Ordering::SeqCst);
                if n == 1 {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    return Err(StoreError::Connect("refused".to_string()));
                }
                Ok(n)
            }
        }

        let connector = SlowFailConnector {
            made: AtomicUsize::new(0),
        };
        let pool = ConnectionPool::new(connector, PoolConfig::new(1))
            .await
            .unwrap();
        let conn = pool.acquire().await.unwrap();
        pool.discard_and_replace(conn);

        let filler = {
            let task_pool = pool.clone();
            tokio::spawn(async move { task_pool.acquire().await.map(|conn| conn.release()) })
        };
        // The filler has claimed the vacancy and is stuck connecting.
        for _ in 0..200 {
            if pool.status().vacant == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let waiter = {
            let task_pool = pool.clone();
            tokio::spawn(async move {
                task_pool
                    .acquire_timeout(Some(Duration::from_secs(5)))
                    .await
                    .map(|conn| conn.release())
            })
        };
        wait_for_waiters(&pool, 1).await;

        assert!(matches!(filler.await.unwrap(), Err(PoolError::Connect(_))));
        assert_ok!(waiter.await.unwrap());
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn test_drop_without_release_is_discard() {
        let pool = pool_of(2).await;
        {
            let _conn = pool.acquire().await.unwrap();
        }
        let status = pool.status();
        assert_eq!(status.vacant, 1);
        assert_eq!(status.lent, 0);
        assert_balanced(status);
    }
}
