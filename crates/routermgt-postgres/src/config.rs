use serde::{Deserialize, Serialize};
use std::fmt;

/// PostgreSQL configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_pool_size: usize,
    /// Mutual TLS material; plaintext connection when absent
    pub tls: Option<PostgresTlsConfig>,
}

/// PEM file paths for a mutually authenticated connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostgresTlsConfig {
    pub client_cert: String,
    pub client_key: String,
    pub server_ca: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "routermgt".to_string(),
            username: "routermgt".to_string(),
            password: "routermgt".to_string(),
            max_pool_size: 10,
            tls: None,
        }
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("max_pool_size", &self.max_pool_size)
            .field("tls", &self.tls)
            .finish()
    }
}
