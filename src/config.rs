//! Server configuration, from command-line flags with environment fallbacks.
//!
//! A `.env` file in the working directory is loaded first (see `main.rs`),
//! so every `env = "..."` below can also come from there.

use crate::body::DEFAULT_MAX_BODY_BYTES;
use crate::query::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;
use std::time::Duration;

/// Pool connections per CPU core when `--pool-size` is not given
pub const CONNECTIONS_PER_CORE: usize = 4;

/// Contact service configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "contactd", version, about = "Contact service over a pooled SQL store")]
pub struct Config {
    /// Store connection string: postgres://... or sqlite://<path>
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Number of pooled store connections (default: CPU_CORES * 4)
    #[arg(long, env = "POOL_SIZE")]
    pub pool_size: Option<usize>,

    /// CPU core count used to size the pool (default: available CPUs)
    #[arg(long, env = "CPU_CORES")]
    pub cpu_cores: Option<usize>,

    /// Host to bind to
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(long, short = 'p', env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// How long a request waits for a pooled connection; 0 waits forever
    #[arg(long, env = "ACQUIRE_TIMEOUT_MS", default_value_t = 5000)]
    pub acquire_timeout_ms: u64,

    /// Largest request body accepted, in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Page size when a listing gives no limit
    #[arg(long, env = "DEFAULT_LIMIT", default_value_t = DEFAULT_LIMIT)]
    pub default_limit: i64,

    /// Largest page size a listing may ask for
    #[arg(long, env = "MAX_LIMIT", default_value_t = MAX_LIMIT)]
    pub max_limit: i64,

    /// Create the contacts table on startup if it does not exist
    #[arg(long)]
    pub init_schema: bool,
}

impl Config {
    /// Effective pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
            .unwrap_or_else(|| self.cpu_cores() * CONNECTIONS_PER_CORE)
    }

    /// Effective CPU core count.
    pub fn cpu_cores(&self) -> usize {
        self.cpu_cores.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Pool acquire deadline; `None` waits forever.
    pub fn acquire_timeout(&self) -> Option<Duration> {
        match self.acquire_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
