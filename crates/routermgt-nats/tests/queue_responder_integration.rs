#![cfg(feature = "integration-tests")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use routermgt_domain::{InMemoryRouterRepository, RouterService};
use routermgt_nats::{
    DispatchLoggingLayer, NatsClient, OperationCode, PageRequestMessage, PagedRoutersReply,
    QueueResponder, QueueResponderConfig, RequestEnvelope, RouterDispatchService, RouterMessage,
    SUCCESS_MARKER,
};
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, Image};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;

const SUBJECT: &str = "routers.requests";
const QUEUE_GROUP: &str = "worker_group_router";

#[derive(Debug, Clone)]
struct Nats {
    ports: Vec<ContainerPort>,
}

impl Default for Nats {
    fn default() -> Self {
        Self {
            ports: vec![ContainerPort::Tcp(4222)],
        }
    }
}

impl Image for Nats {
    fn name(&self) -> &str {
        "nats"
    }

    fn tag(&self) -> &str {
        "latest"
    }

    fn ready_conditions(&self) -> Vec<WaitFor> {
        vec![WaitFor::seconds(3)]
    }

    fn expose_ports(&self) -> &[ContainerPort] {
        &self.ports
    }
}

async fn start_nats() -> (ContainerAsync<Nats>, String) {
    let container = Nats::default().start().await.unwrap();
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(4222).await.unwrap();
    (container, format!("nats://{host}:{port}"))
}

/// Start one responder over the shared service, counting handled requests
async fn spawn_responder(
    url: &str,
    router_service: Arc<RouterService>,
    handled: Arc<AtomicUsize>,
    ctx: CancellationToken,
) -> JoinHandle<anyhow::Result<()>> {
    let client = NatsClient::connect(url, Duration::from_secs(5)).await.unwrap();
    let subscription = client.queue_subscribe(SUBJECT, QUEUE_GROUP).await.unwrap();

    let service = ServiceBuilder::new()
        .layer(DispatchLoggingLayer::new())
        .map_response(move |response| {
            handled.fetch_add(1, Ordering::SeqCst);
            response
        })
        .service(RouterDispatchService::new(router_service));

    let responder = QueueResponder::new(
        Box::new(subscription),
        client.create_reply_publisher(),
        service,
        QueueResponderConfig {
            max_in_flight: 8,
            request_timeout: Duration::from_secs(5),
        },
    );

    tokio::spawn(responder.run(ctx))
}

fn envelope<T: serde::Serialize>(operation: OperationCode, payload: &T) -> Bytes {
    let envelope = RequestEnvelope::new(operation, "tenant-a", payload).unwrap();
    Bytes::from(envelope.encode().unwrap())
}

fn router(serial: &str) -> RouterMessage {
    RouterMessage {
        router_serial: serial.to_string(),
        operator_name: "Orange".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_request_reply_round_trip() {
    let (_container, url) = start_nats().await;
    let ctx = CancellationToken::new();
    let router_service = Arc::new(RouterService::new(Arc::new(InMemoryRouterRepository::new())));
    let handled = Arc::new(AtomicUsize::new(0));
    let responder = spawn_responder(&url, router_service, handled, ctx.clone()).await;

    let requester = async_nats::connect(&url).await.unwrap();

    let created = requester
        .request(SUBJECT, envelope(OperationCode::Create, &vec![router("SN-1")]))
        .await
        .unwrap();
    assert_eq!(created.payload.as_ref(), SUCCESS_MARKER);

    let found = requester
        .request(SUBJECT, envelope(OperationCode::Get, &router("SN-1")))
        .await
        .unwrap();
    let message: RouterMessage = serde_json::from_slice(&found.payload).unwrap();
    assert_eq!(message.operator_name, "Orange");

    let page = requester
        .request(
            SUBJECT,
            envelope(
                OperationCode::GetPaged,
                &PageRequestMessage {
                    limit: 10,
                    page: 0,
                    sort: String::new(),
                },
            ),
        )
        .await
        .unwrap();
    let reply: PagedRoutersReply = serde_json::from_slice(&page.payload).unwrap();
    assert_eq!(reply.last, 0);
    assert_eq!(reply.routers.len(), 1);

    let malformed = requester
        .request(SUBJECT, Bytes::from_static(b"{"))
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&malformed.payload).unwrap();
    assert_eq!(value["error"]["kind"], "decode");

    ctx.cancel();
    responder.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_queue_group_delivers_each_request_once() {
    let (_container, url) = start_nats().await;
    let ctx = CancellationToken::new();
    let router_service = Arc::new(RouterService::new(Arc::new(InMemoryRouterRepository::new())));
    let handled = Arc::new(AtomicUsize::new(0));

    let first = spawn_responder(&url, router_service.clone(), handled.clone(), ctx.clone()).await;
    let second = spawn_responder(&url, router_service, handled.clone(), ctx.clone()).await;

    let requester = async_nats::connect(&url).await.unwrap();
    for i in 0..20 {
        let reply = requester
            .request(
                SUBJECT,
                envelope(OperationCode::Create, &vec![router(&format!("SN-{i:02}"))]),
            )
            .await
            .unwrap();
        assert_eq!(reply.payload.as_ref(), SUCCESS_MARKER);
    }

    ctx.cancel();
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(handled.load(Ordering::SeqCst), 20);
}
