use config::{Config, ConfigError, Environment, File, FileFormat};
use routermgt_postgres::{PostgresConfig, PostgresTlsConfig};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Config file read when no path is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "conf.yml";

/// Prefix for environment overrides, e.g. `ROUTERMGT_NATS_URL`
pub const ENV_PREFIX: &str = "ROUTERMGT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Subject requests arrive on
    #[serde(default = "default_nats_subject")]
    pub nats_subject: String,

    /// Queue group shared by every instance
    #[serde(default = "default_nats_queue_group")]
    pub nats_queue_group: String,

    #[serde(default = "default_nats_connect_timeout_secs")]
    pub nats_connect_timeout_secs: u64,

    /// Requests handled concurrently per instance
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Client certificate (PEM) for mutual TLS
    #[serde(default)]
    pub postgres_tls_client_cert: Option<String>,

    /// Client private key (PEM) for mutual TLS
    #[serde(default)]
    pub postgres_tls_client_key: Option<String>,

    /// CA bundle (PEM) the server certificate is verified against
    #[serde(default)]
    pub postgres_tls_server_ca: Option<String>,

    /// Time allowed for closers during shutdown
    #[serde(default = "default_closer_timeout_secs")]
    pub closer_timeout_secs: u64,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("nats_url", &self.nats_url)
            .field("nats_subject", &self.nats_subject)
            .field("nats_queue_group", &self.nats_queue_group)
            .field("nats_connect_timeout_secs", &self.nats_connect_timeout_secs)
            .field("max_in_flight", &self.max_in_flight)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("storage_backend", &self.storage_backend)
            .field("postgres_host", &self.postgres_host)
            .field("postgres_port", &self.postgres_port)
            .field("postgres_database", &self.postgres_database)
            .field("postgres_username", &self.postgres_username)
            .field("postgres_password", &"***")
            .field("postgres_max_pool_size", &self.postgres_max_pool_size)
            .field("postgres_tls_client_cert", &self.postgres_tls_client_cert)
            .field("postgres_tls_client_key", &self.postgres_tls_client_key)
            .field("postgres_tls_server_ca", &self.postgres_tls_server_ca)
            .field("closer_timeout_secs", &self.closer_timeout_secs)
            .finish()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_subject() -> String {
    "routers".to_string()
}

fn default_nats_queue_group() -> String {
    "worker_group_router".to_string()
}

fn default_nats_connect_timeout_secs() -> u64 {
    5
}

fn default_max_in_flight() -> usize {
    64
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Postgres
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "routermgt".to_string()
}

fn default_postgres_username() -> String {
    "routermgt".to_string()
}

fn default_postgres_password() -> String {
    "routermgt".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_closer_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    /// Load from the YAML file at `path` (skipped if missing), then apply
    /// `ROUTERMGT_*` environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::new(path, FileFormat::Yaml).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_flight == 0 {
            return Err(ConfigError::Message(
                "max_in_flight must be greater than zero".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        self.postgres_tls().map(|_| ())
    }

    /// TLS material is all-or-nothing; empty strings count as unset
    pub fn postgres_tls(&self) -> Result<Option<PostgresTlsConfig>, ConfigError> {
        let set = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        match (
            set(&self.postgres_tls_client_cert),
            set(&self.postgres_tls_client_key),
            set(&self.postgres_tls_server_ca),
        ) {
            (Some(client_cert), Some(client_key), Some(server_ca)) => Ok(Some(PostgresTlsConfig {
                client_cert,
                client_key,
                server_ca,
            })),
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::Message(
                concat!(
                    "postgres_tls_client_cert, postgres_tls_client_key and ",
                    "postgres_tls_server_ca must be set together"
                )
                .to_string(),
            )),
        }
    }

    pub fn postgres_config(&self) -> Result<PostgresConfig, ConfigError> {
        Ok(PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            tls: self.postgres_tls()?,
        })
    }
}
