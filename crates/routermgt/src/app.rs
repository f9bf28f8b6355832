use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use routermgt_domain::{InMemoryRouterRepository, RouterRepository, RouterService};
use routermgt_nats::{
    DispatchLoggingLayer, NatsClient, QueueResponder, QueueResponderConfig, RouterDispatchService,
};
use routermgt_postgres::{PostgresClient, PostgresRouterRepository};
use routermgt_runner::Runner;
use tower::ServiceBuilder;
use tracing::info;

use crate::config::{ServiceConfig, StorageBackend};

struct Storage {
    repository: Arc<dyn RouterRepository>,
    postgres: Option<PostgresClient>,
}

async fn initialize_storage(config: &ServiceConfig) -> Result<Storage> {
    match config.storage_backend {
        StorageBackend::Memory => {
            info!("Using in-memory router storage");
            Ok(Storage {
                repository: Arc::new(InMemoryRouterRepository::new()),
                postgres: None,
            })
        }
        StorageBackend::Postgres => {
            info!(
                host = %config.postgres_host,
                port = config.postgres_port,
                database = %config.postgres_database,
                "Initializing PostgreSQL..."
            );

            let client = PostgresClient::new(&config.postgres_config()?)?;
            client
                .ping()
                .await
                .context("PostgreSQL is not reachable")?;

            Ok(Storage {
                repository: Arc::new(PostgresRouterRepository::new(client.clone())),
                postgres: Some(client),
            })
        }
    }
}

/// Connect every dependency and assemble the runner.
///
/// Any error here is a startup failure: storage unreachable, bad TLS
/// material, broker down or the subscription refused.
pub async fn build_runner(config: &ServiceConfig) -> Result<Runner> {
    let storage = initialize_storage(config).await?;
    let router_service = Arc::new(RouterService::new(storage.repository));

    info!("Initializing NATS...");
    let nats_client = NatsClient::connect(
        &config.nats_url,
        Duration::from_secs(config.nats_connect_timeout_secs),
    )
    .await?;

    let subscription = nats_client
        .queue_subscribe(&config.nats_subject, &config.nats_queue_group)
        .await?;

    let service = ServiceBuilder::new()
        .layer(DispatchLoggingLayer::new())
        .service(RouterDispatchService::new(router_service));

    let responder = QueueResponder::new(
        Box::new(subscription),
        nats_client.create_reply_publisher(),
        service,
        QueueResponderConfig {
            max_in_flight: config.max_in_flight,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        },
    );

    let mut runner = Runner::new()
        .with_app_process(move |ctx| responder.run(ctx))
        .with_closer(move || async move {
            nats_client.close().await
        })
        .with_closer_timeout(Duration::from_secs(config.closer_timeout_secs));

    if let Some(postgres) = storage.postgres {
        runner = runner.with_closer(move || async move {
            postgres.close();
            Ok(())
        });
    }

    info!(
        subject = %config.nats_subject,
        queue_group = %config.nats_queue_group,
        max_in_flight = config.max_in_flight,
        "Router management service ready"
    );

    Ok(runner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;

    fn unreachable_config(storage_backend: StorageBackend) -> ServiceConfig {
        ServiceConfig {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            nats_url: "nats://127.0.0.1:1".to_string(),
            nats_subject: "routers".to_string(),
            nats_queue_group: "worker_group_router".to_string(),
            nats_connect_timeout_secs: 1,
            max_in_flight: 4,
            request_timeout_secs: 1,
            storage_backend,
            postgres_host: "127.0.0.1".to_string(),
            postgres_port: 1,
            postgres_database: "routermgt".to_string(),
            postgres_username: "routermgt".to_string(),
            postgres_password: "routermgt".to_string(),
            postgres_max_pool_size: 1,
            postgres_tls_client_cert: None,
            postgres_tls_client_key: None,
            postgres_tls_server_ca: None,
            closer_timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_unreachable_database_fails_startup() {
        let result = build_runner(&unreachable_config(StorageBackend::Postgres)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_broker_fails_startup() {
        let result = build_runner(&unreachable_config(StorageBackend::Memory)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_tls_material_fails_startup() {
        let mut config = unreachable_config(StorageBackend::Postgres);
        config.postgres_tls_client_cert = Some("/nonexistent/client.pem".to_string());
        config.postgres_tls_client_key = Some("/nonexistent/client.key".to_string());
        config.postgres_tls_server_ca = Some("/nonexistent/ca.pem".to_string());

        let err = build_runner(&config).await.err().unwrap();
        assert!(format!("{err:#}").contains("/nonexistent/"));
    }
}
