use anyhow::{Context, Result};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, info};

use crate::config::PostgresConfig;
use crate::tls::load_client_config;

/// PostgreSQL client wrapper with connection pooling
#[derive(Clone)]
pub struct PostgresClient {
    pool: Pool,
}

impl PostgresClient {
    /// Creates a new PostgreSQL client with connection pooling
    ///
    /// Connections are mutually authenticated when `config.tls` is set.
    /// No connection is opened until the first `ping` or query.
    pub fn new(config: &PostgresConfig) -> Result<Self> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.username.clone());
        cfg.password = Some(config.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = match &config.tls {
            Some(tls) => {
                let client_config = load_client_config(tls)?;
                info!(host = %config.host, "Using mutual TLS for database connections");
                cfg.create_pool(Some(Runtime::Tokio1), MakeRustlsConnect::new(client_config))
            }
            None => cfg.create_pool(Some(Runtime::Tokio1), NoTls),
        }
        .context("Failed to create connection pool")?;

        pool.resize(config.max_pool_size);

        Ok(Self { pool })
    }

    /// Pings the database to verify connectivity
    pub async fn ping(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client.execute("SELECT 1", &[]).await?;
        debug!("postgreSQL connection successful");
        Ok(())
    }

    /// Gets a connection from the pool
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Client> {
        Ok(self.pool.get().await?)
    }

    /// Closes the pool; idle connections are dropped and new checkouts fail
    pub fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close();
    }
}
