mod client;
mod config;
mod conversions;
mod models;
mod router_repository;
mod tls;

pub use client::PostgresClient;
pub use config::{PostgresConfig, PostgresTlsConfig};
pub use models::RouterRow;
pub use router_repository::PostgresRouterRepository;
pub use tls::load_client_config;

/// DDL for the `routers` table; applying it is left to the deployment
pub const ROUTERS_SCHEMA: &str = include_str!("../schema/routers.sql");
