//! # contactd - A Connection-Pooled Contact Service
//!
//! contactd stores and queries contact records (an external identifier plus
//! a phone number) in a relational store, serving them over HTTP/1.1 as
//! JSON through axum. It demonstrates a fixed-size async connection pool with
//! discard-and-replace recovery, parameterized dynamic SQL, and safe
//! accumulation of request bodies that arrive in pieces.
//!
//! ## Features
//!
//! - **Bounded pool**: A fixed number of store sessions shared by every
//!   request, FIFO waiting with a deadline, faulted sessions replaced
//! - **Injection-safe queries**: Filters and pagination travel only as
//!   bound parameters
//! - **Streaming bodies**: Content-Length and chunked bodies are assembled
//!   frame by frame under a size cap and handed out exactly once
//! - **Two backends**: PostgreSQL via tokio-postgres, or an embedded SQLite
//!   file
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              contactd                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ axum::serve │───>│ axum Router │───>│  Handlers   │                  │
//! │  │   (hyper)   │    │ + TraceLayer│    │             │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                            ┌──────────────────┤                         │
//! │                            ▼                  ▼                         │
//! │                     ┌─────────────┐    ┌─────────────┐    ┌──────────┐  │
//! │                     │ RequestBody │    │  Contact    │───>│  Query   │  │
//! │                     │ Assembler   │    │ Repository  │    │ Builder  │  │
//! │                     └─────────────┘    └──────┬──────┘    └──────────┘  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                     ┌──────────────────────────────────────────────┐    │
//! │                     │              ConnectionPool                  │    │
//! │                     │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │    │
//! │                     │  │Session │ │Session │ │(vacant)│ │...N    │ │    │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │    │
//! │                     └──────────────────────────────────────────────┘    │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                              PostgreSQL  /  SQLite file                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use contactd::contacts::ContactRepository;
//! use contactd::pool::{ConnectionPool, PoolConfig};
//! use contactd::query::QueryBuilder;
//! use contactd::routes::{router, AppState};
//! use contactd::store::Backend;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = Backend::from_url("sqlite://contacts.db")?;
//!     let dialect = backend.dialect();
//!     let pool = ConnectionPool::new(backend, PoolConfig::new(8)).await?;
//!     let repo = ContactRepository::new(pool, QueryBuilder::new(dialect));
//!
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, router(AppState::new(repo))).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Endpoints
//!
//! - `GET /ping` - liveness, answers `pong`
//! - `GET /contacts?external_id=&phone_number=&limit=&offset=` - filtered listing
//! - `POST /contacts` with `{"external_id": 1, "phone_number": "555-0100"}` - create
//!
//! ## Module Overview
//!
//! - [`store`]: Store sessions, values, dialects and the two backends
//! - [`pool`]: Fixed-capacity connection pool
//! - [`query`]: Parameterized SELECT/INSERT construction
//! - [`body`]: Request body assembly and capped reading
//! - [`contacts`]: Contact records and the repository
//! - [`error`]: Service error taxonomy and status mapping
//! - [`routes`]: axum routes and shared handler state
//! - [`config`]: Command-line and environment configuration
//!
//! ## Design Highlights
//!
//! ### Connection Accounting
//!
//! Every pool slot is always exactly one of idle, lent, or vacant. A lent
//! connection comes back through `release` (healthy) or
//! `discard_and_replace` (faulted); a handle dropped any other way counts as
//! discarded, so a cancelled request can never leak a slot.
//!
//! ### Fail Fast Under Load
//!
//! Acquiring a connection waits in FIFO order up to a deadline. When the
//! deadline passes the request is answered with 503 instead of queueing
//! indefinitely.

pub mod body;
pub mod config;
pub mod contacts;
pub mod error;
pub mod pool;
pub mod query;
pub mod routes;
pub mod store;

// Re-export commonly used types for convenience
pub use body::{read_body, BodyError, BodyReadError, RequestBodyAssembler};
pub use contacts::{ContactRecord, ContactRepository};
pub use error::{ContactError, ContactResult};
pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
pub use query::{QueryBuilder, QuerySpec};
pub use routes::{router, AppState};
pub use store::{Backend, StoreError};

/// The default port contactd listens on
pub const DEFAULT_PORT: u16 = 8080;

/// The default host contactd binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of contactd
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
