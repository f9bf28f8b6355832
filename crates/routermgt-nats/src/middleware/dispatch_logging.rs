use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{error, info, warn, Instrument, Span};

use crate::middleware::{DispatchRequest, DispatchResponse};

/// Tower layer for logging each dispatched request
#[derive(Clone, Default)]
pub struct DispatchLoggingLayer;

impl DispatchLoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for DispatchLoggingLayer {
    type Service = DispatchLoggingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        DispatchLoggingService { inner: service }
    }
}

/// Service that logs operation, tenant, outcome and latency
#[derive(Clone)]
pub struct DispatchLoggingService<S> {
    inner: S,
}

impl<S> Service<DispatchRequest> for DispatchLoggingService<S>
where
    S: Service<DispatchRequest, Response = DispatchResponse> + Clone + Send + 'static,
    S::Error: std::fmt::Display + Send,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: DispatchRequest) -> Self::Future {
        let subject = req.subject.clone();
        let payload_size = req.payload.len();
        let start = Instant::now();
        let mut inner = self.inner.clone();

        let span = Span::current();

        Box::pin(
            async move {
                let result = inner.call(req).await;
                let duration_ms = start.elapsed().as_millis();

                match &result {
                    Ok(response) => {
                        let operation = response.operation.map(|op| op.as_str()).unwrap_or("-");
                        let tenant = response.tenant.as_deref().unwrap_or("-");
                        let request = response.request_summary.as_deref().unwrap_or("-");

                        match &response.failure {
                            None => info!(
                                subject = %subject,
                                operation = %operation,
                                tenant = %tenant,
                                request = %request,
                                payload_bytes = payload_size,
                                reply_bytes = response.payload.len(),
                                duration_ms = %duration_ms,
                                "handled {operation} for {tenant} in {duration_ms}ms"
                            ),
                            Some(failure) => warn!(
                                subject = %subject,
                                operation = %operation,
                                tenant = %tenant,
                                request = %request,
                                payload_bytes = payload_size,
                                kind = failure.kind,
                                duration_ms = %duration_ms,
                                error = %failure.message,
                                "rejected {operation} for {tenant} in {duration_ms}ms: {}",
                                failure.message
                            ),
                        }
                    }
                    Err(e) => {
                        error!(
                            subject = %subject,
                            payload_bytes = payload_size,
                            duration_ms = %duration_ms,
                            error = %e,
                            "failed to dispatch from {subject} in {duration_ms}ms: {e}"
                        );
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
