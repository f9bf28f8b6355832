use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower::Service;
use tracing::debug;

use routermgt_domain::{
    AddRoutersInput, DeleteRoutersInput, GetRouterInput, GetRouterPageInput, PageRequest, Router,
    RouterService,
};

use crate::envelope::{
    OperationCode, PageRequestMessage, PagedRoutersReply, RequestEnvelope, RouterMessage,
    SUCCESS_MARKER,
};
use crate::error::DispatchError;
use crate::middleware::{DispatchRequest, DispatchResponse};

/// Batches at least this large are logged by count instead of by serial
const BATCH_SUMMARY_THRESHOLD: usize = 5;

/// Decoded operation payload
#[derive(Debug)]
enum RouterCommand {
    Get(RouterMessage),
    GetPaged(PageRequestMessage),
    Create(Vec<RouterMessage>),
    Delete(Vec<RouterMessage>),
}

impl RouterCommand {
    fn decode(operation: OperationCode, data: &[u8]) -> Result<Self, DispatchError> {
        Ok(match operation {
            OperationCode::Get => RouterCommand::Get(decode_payload(operation, data)?),
            OperationCode::GetPaged => RouterCommand::GetPaged(decode_payload(operation, data)?),
            OperationCode::Create => RouterCommand::Create(decode_payload(operation, data)?),
            OperationCode::Delete => RouterCommand::Delete(decode_payload(operation, data)?),
        })
    }

    fn summary(&self) -> String {
        match self {
            RouterCommand::Get(router) => router.router_serial.clone(),
            RouterCommand::GetPaged(page) => format!("limit={} page={}", page.limit, page.page),
            RouterCommand::Create(routers) | RouterCommand::Delete(routers) => {
                summarize_batch(routers)
            }
        }
    }
}

fn summarize_batch(routers: &[RouterMessage]) -> String {
    if routers.len() >= BATCH_SUMMARY_THRESHOLD {
        return format!("{} routers", routers.len());
    }

    let serials: Vec<&str> = routers.iter().map(|r| r.router_serial.as_str()).collect();
    format!("[{}]", serials.join(", "))
}

fn decode_payload<T: DeserializeOwned>(
    operation: OperationCode,
    data: &[u8],
) -> Result<T, DispatchError> {
    serde_json::from_slice(data)
        .map_err(|e| DispatchError::Decode(format!("{operation} payload: {e}")))
}

fn encode_reply<T: Serialize>(value: &T) -> Result<Bytes, DispatchError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| DispatchError::Internal(format!("failed to encode reply: {e}")))
}

/// Tower service that decodes a request envelope, runs the operation against
/// the router service and encodes the reply body.
///
/// Every failure becomes an error reply, so the service itself never errors.
#[derive(Clone)]
pub struct RouterDispatchService {
    router_service: Arc<RouterService>,
}

impl RouterDispatchService {
    pub fn new(router_service: Arc<RouterService>) -> Self {
        Self { router_service }
    }

    pub async fn dispatch(&self, payload: &[u8]) -> DispatchResponse {
        let envelope = match RequestEnvelope::decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => return DispatchResponse::failed(None, None, e),
        };

        let RequestEnvelope { mtype, tenant, data } = envelope;

        let operation = match OperationCode::try_from(mtype) {
            Ok(operation) => operation,
            Err(e) => return DispatchResponse::failed(None, Some(tenant), e),
        };

        let command = match RouterCommand::decode(operation, &data) {
            Ok(command) => command,
            Err(e) => return DispatchResponse::failed(Some(operation), Some(tenant), e),
        };

        let summary = command.summary();
        debug!(operation = %operation, tenant = %tenant, request = %summary, "Dispatching");

        let response = match self.execute(&tenant, command).await {
            Ok(reply) => DispatchResponse::ok(operation, tenant, reply),
            Err(e) => DispatchResponse::failed(Some(operation), Some(tenant), e),
        };

        response.with_request_summary(Some(summary))
    }

    async fn execute(&self, tenant: &str, command: RouterCommand) -> Result<Bytes, DispatchError> {
        match command {
            RouterCommand::Create(routers) => {
                let rejected = self
                    .router_service
                    .add_routers(AddRoutersInput {
                        tenant: tenant.to_string(),
                        routers: routers.into_iter().map(Router::from).collect(),
                    })
                    .await?;

                if rejected.is_empty() {
                    return Ok(Bytes::from_static(SUCCESS_MARKER));
                }

                let rejected: Vec<RouterMessage> =
                    rejected.into_iter().map(RouterMessage::from).collect();
                encode_reply(&rejected)
            }
            RouterCommand::Get(router) => {
                let found = self
                    .router_service
                    .get_router(GetRouterInput {
                        tenant: tenant.to_string(),
                        serial: router.router_serial,
                    })
                    .await?;

                match found {
                    Some(router) => encode_reply(&RouterMessage::from(router)),
                    None => Ok(Bytes::new()),
                }
            }
            RouterCommand::GetPaged(page) => {
                let page = PageRequest::try_from(page)?;

                let result = self
                    .router_service
                    .get_router_page(GetRouterPageInput {
                        tenant: tenant.to_string(),
                        page,
                    })
                    .await?;

                encode_reply(&PagedRoutersReply {
                    last: result.last_page_index,
                    routers: result.routers.into_iter().map(RouterMessage::from).collect(),
                })
            }
            RouterCommand::Delete(routers) => {
                self.router_service
                    .delete_routers(DeleteRoutersInput {
                        tenant: tenant.to_string(),
                        serials: routers.into_iter().map(|r| r.router_serial).collect(),
                    })
                    .await?;

                Ok(Bytes::from_static(SUCCESS_MARKER))
            }
        }
    }
}

impl Service<DispatchRequest> for RouterDispatchService {
    type Response = DispatchResponse;
    type Error = anyhow::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: DispatchRequest) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.dispatch(&req.payload).await) })
    }
}
