//! contactd - Contact Service
//!
//! This is the main entry point for the contact service.
//! It builds the store connection pool, binds the routes, and serves them
//! until Ctrl+C.

use anyhow::Context;
use clap::Parser;
use contactd::config::Config;
use contactd::contacts::ContactRepository;
use contactd::pool::{ConnectionPool, PoolConfig};
use contactd::query::QueryBuilder;
use contactd::routes::{router, AppState};
use contactd::store::Backend;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let config = Config::parse();

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!(
        version = contactd::VERSION,
        address = %config.bind_address(),
        "contactd starting"
    );

    // Select the store backend from the connection string
    let backend = Backend::from_url(&config.database_url).context("invalid DATABASE_URL")?;
    let dialect = backend.dialect();

    // Establish every pooled connection up front
    let pool_size = config.pool_size();
    let pool_config = PoolConfig::new(pool_size).acquire_timeout(config.acquire_timeout());
    let pool = ConnectionPool::new(backend, pool_config)
        .await
        .context("failed to build connection pool")?;
    info!(
        backend = dialect.name(),
        size = pool_size,
        acquire_timeout_ms = config.acquire_timeout_ms,
        "Connection pool ready"
    );

    let builder = QueryBuilder::new(dialect).with_limits(config.default_limit, config.max_limit);
    let repo = ContactRepository::new(pool, builder);

    if config.init_schema {
        repo.init_schema()
            .await
            .context("failed to create schema")?;
    }

    let pool = repo.pool().clone();
    let state = AppState::new(repo).max_body_bytes(config.max_body_bytes);
    let app = router(state);

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let status = pool.status();
    info!(
        idle = status.idle,
        lent = status.lent,
        vacant = status.vacant,
        "Server shutdown complete"
    );
    Ok(())
}

/// Resolves on Ctrl+C. If the handler cannot be installed the server runs
/// until killed.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping server...");
}
