use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::{Service, ServiceExt};
use tracing::{debug, error, info, warn};

use crate::error::DispatchError;
use crate::middleware::{DispatchRequest, DispatchResponse};
use crate::traits::{InboundRequest, ReplyPublisher, RequestSubscription};

/// Limits applied to a responder
#[derive(Debug, Clone, Copy)]
pub struct QueueResponderConfig {
    /// Upper bound on requests being handled at once
    pub max_in_flight: usize,
    /// Handler deadline; an expired request gets a timeout error reply
    pub request_timeout: Duration,
}

/// Queue-group member that answers requests with a tower service.
///
/// Each request is handled on its own task while holding a permit, so at
/// most `max_in_flight` handlers run and no new request is pulled until a
/// permit frees up.
pub struct QueueResponder<S> {
    subscription: Box<dyn RequestSubscription>,
    publisher: Arc<dyn ReplyPublisher>,
    service: S,
    config: QueueResponderConfig,
}

impl<S> QueueResponder<S>
where
    S: Service<DispatchRequest, Response = DispatchResponse, Error = anyhow::Error>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    pub fn new(
        subscription: Box<dyn RequestSubscription>,
        publisher: Arc<dyn ReplyPublisher>,
        service: S,
        config: QueueResponderConfig,
    ) -> Self {
        Self {
            subscription,
            publisher,
            service,
            config,
        }
    }

    /// Answer requests until cancellation or until the subscription ends.
    ///
    /// On the way out the subscription is drained: no new deliveries arrive,
    /// but every request the client already buffered is still handled under
    /// the same in-flight bound. Then every handler is awaited and the
    /// publisher flushed so the replies reach the server before returning.
    pub async fn run(mut self, ctx: CancellationToken) -> Result<()> {
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut in_flight = JoinSet::new();

        debug!(
            max_in_flight = self.config.max_in_flight,
            request_timeout_ms = self.config.request_timeout.as_millis(),
            "starting queue responder"
        );

        let outcome = loop {
            let permit = tokio::select! {
                _ = ctx.cancelled() => break Ok(()),
                permit = permits.clone().acquire_owned() => {
                    permit.context("in-flight semaphore closed")?
                }
            };

            let request = tokio::select! {
                _ = ctx.cancelled() => break Ok(()),
                request = self.subscription.next_request() => request,
            };

            let Some(request) = request else {
                break Err(anyhow!("request subscription ended unexpectedly"));
            };

            while let Some(finished) = in_flight.try_join_next() {
                log_join_result(finished);
            }

            in_flight.spawn(handle_request(
                self.service.clone(),
                self.publisher.clone(),
                request,
                self.config.request_timeout,
                permit,
            ));
        };

        info!(
            in_flight = in_flight.len(),
            "stopping queue responder, draining subscription"
        );

        if let Err(e) = self.subscription.drain().await {
            warn!(error = %e, "failed to drain subscription");
        }

        let mut buffered = 0usize;
        loop {
            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .context("in-flight semaphore closed")?;

            let Some(request) = self.subscription.next_request().await else {
                break;
            };
            buffered += 1;

            while let Some(finished) = in_flight.try_join_next() {
                log_join_result(finished);
            }

            in_flight.spawn(handle_request(
                self.service.clone(),
                self.publisher.clone(),
                request,
                self.config.request_timeout,
                permit,
            ));
        }

        debug!(buffered, in_flight = in_flight.len(), "subscription drained");

        while let Some(finished) = in_flight.join_next().await {
            log_join_result(finished);
        }

        self.publisher.flush().await?;

        debug!("queue responder stopped");
        outcome
    }
}

async fn handle_request<S>(
    service: S,
    publisher: Arc<dyn ReplyPublisher>,
    request: InboundRequest,
    timeout: Duration,
    _permit: OwnedSemaphorePermit,
) where
    S: Service<DispatchRequest, Response = DispatchResponse, Error = anyhow::Error>,
{
    let InboundRequest {
        subject,
        reply,
        payload,
    } = request;

    let dispatch = service.oneshot(DispatchRequest::new(subject.clone(), payload));

    let body = match tokio::time::timeout(timeout, dispatch).await {
        Ok(Ok(response)) => response.payload,
        Ok(Err(e)) => {
            error!(subject = %subject, error = %e, "dispatch service failed");
            DispatchError::Internal(e.to_string()).to_reply()
        }
        Err(_) => {
            warn!(
                subject = %subject,
                timeout_ms = timeout.as_millis(),
                "request timed out"
            );
            DispatchError::Timeout(timeout).to_reply()
        }
    };

    match reply {
        Some(reply) => {
            if let Err(e) = publisher.publish_reply(reply, body).await {
                error!(subject = %subject, error = %e, "failed to publish reply");
            }
        }
        None => warn!(subject = %subject, "request has no reply subject, discarding reply"),
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "request handler panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockReplyPublisher;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::task::{Context as TaskContext, Poll};
    use tokio::sync::mpsc;

    struct ChannelSubscription {
        requests: mpsc::UnboundedReceiver<InboundRequest>,
        drained: Arc<AtomicBool>,
    }

    #[async_trait]
    impl RequestSubscription for ChannelSubscription {
        async fn next_request(&mut self) -> Option<InboundRequest> {
            self.requests.recv().await
        }

        async fn drain(&mut self) -> Result<()> {
            // Buffered requests stay readable; recv yields None once they run out
            self.requests.close();
            self.drained.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn channel_subscription() -> (
        mpsc::UnboundedSender<InboundRequest>,
        Box<dyn RequestSubscription>,
        Arc<AtomicBool>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let drained = Arc::new(AtomicBool::new(false));
        let subscription = ChannelSubscription {
            requests: rx,
            drained: drained.clone(),
        };
        (tx, Box::new(subscription), drained)
    }

    /// Publisher mock that forwards every reply into a channel
    fn recording_publisher() -> (
        Arc<dyn ReplyPublisher>,
        mpsc::UnboundedReceiver<(String, Bytes)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut publisher = MockReplyPublisher::new();
        publisher
            .expect_publish_reply()
            .returning(move |subject, payload| {
                let _ = tx.send((subject, payload));
                Ok(())
            });
        publisher.expect_flush().returning(|| Ok(()));
        (Arc::new(publisher), rx)
    }

    fn inbound(reply: Option<&str>, payload: &'static [u8]) -> InboundRequest {
        InboundRequest {
            subject: "routers".to_string(),
            reply: reply.map(str::to_string),
            payload: Bytes::from_static(payload),
        }
    }

    /// Echoes the payload after an optional delay and tracks concurrency
    #[derive(Clone)]
    struct EchoService {
        delay: Duration,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl EchoService {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                active: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Service<DispatchRequest> for EchoService {
        type Response = DispatchResponse;
        type Error = anyhow::Error;
        type Future = BoxFuture<'static, Result<DispatchResponse, anyhow::Error>>;

        fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: DispatchRequest) -> Self::Future {
            let delay = self.delay;
            let active = self.active.clone();
            let peak = self.peak.clone();
            Box::pin(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(DispatchResponse {
                    payload: req.payload,
                    operation: None,
                    tenant: None,
                    request_summary: None,
                    failure: None,
                })
            })
        }
    }

    fn config(max_in_flight: usize, request_timeout: Duration) -> QueueResponderConfig {
        QueueResponderConfig {
            max_in_flight,
            request_timeout,
        }
    }

    #[tokio::test]
    async fn test_reply_goes_to_reply_subject() {
        let (tx, subscription, _) = channel_subscription();
        let (publisher, mut replies) = recording_publisher();
        let responder = QueueResponder::new(
            subscription,
            publisher,
            EchoService::new(Duration::ZERO),
            config(4, Duration::from_secs(5)),
        );

        let ctx = CancellationToken::new();
        let handle = tokio::spawn(responder.run(ctx.clone()));

        tx.send(inbound(Some("_INBOX.1"), b"ping")).unwrap();

        let (subject, payload) = replies.recv().await.unwrap();
        assert_eq!(subject, "_INBOX.1");
        assert_eq!(payload, Bytes::from_static(b"ping"));

        ctx.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_request_without_reply_subject_is_not_published() {
        let (tx, subscription, _) = channel_subscription();
        let mut publisher = MockReplyPublisher::new();
        publisher.expect_publish_reply().never();
        publisher.expect_flush().times(1).returning(|| Ok(()));

        let service = EchoService::new(Duration::ZERO);
        let peak = service.peak.clone();
        let responder = QueueResponder::new(
            subscription,
            Arc::new(publisher),
            service,
            config(1, Duration::from_secs(5)),
        );

        let ctx = CancellationToken::new();
        let handle = tokio::spawn(responder.run(ctx.clone()));

        tx.send(inbound(None, b"fire-and-forget")).unwrap();
        while peak.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        ctx.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_timeout_replies_with_timeout_error() {
        let (tx, subscription, _) = channel_subscription();
        let (publisher, mut replies) = recording_publisher();
        let responder = QueueResponder::new(
            subscription,
            publisher,
            EchoService::new(Duration::from_secs(30)),
            config(1, Duration::from_millis(50)),
        );

        let ctx = CancellationToken::new();
        let handle = tokio::spawn(responder.run(ctx.clone()));

        tx.send(inbound(Some("_INBOX.slow"), b"slow")).unwrap();

        let (subject, payload) = replies.recv().await.unwrap();
        assert_eq!(subject, "_INBOX.slow");
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["error"]["kind"], "timeout");

        ctx.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_in_flight_handlers_are_bounded() {
        let (tx, subscription, _) = channel_subscription();
        let (publisher, mut replies) = recording_publisher();
        let service = EchoService::new(Duration::from_millis(20));
        let peak = service.peak.clone();
        let responder = QueueResponder::new(
            subscription,
            publisher,
            service,
            config(2, Duration::from_secs(5)),
        );

        let ctx = CancellationToken::new();
        let handle = tokio::spawn(responder.run(ctx.clone()));

        for i in 0..10 {
            tx.send(inbound(Some(&format!("_INBOX.{i}")), b"x")).unwrap();
        }
        for _ in 0..10 {
            replies.recv().await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);

        ctx.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_drains_subscription_and_waits_for_in_flight() {
        let (tx, subscription, drained) = channel_subscription();
        let (publisher, mut replies) = recording_publisher();
        let service = EchoService::new(Duration::from_millis(200));
        let active = service.active.clone();
        let responder = QueueResponder::new(
            subscription,
            publisher,
            service,
            config(4, Duration::from_secs(5)),
        );

        let ctx = CancellationToken::new();
        let handle = tokio::spawn(responder.run(ctx.clone()));

        tx.send(inbound(Some("_INBOX.drain"), b"in-flight")).unwrap();
        while active.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        ctx.cancel();
        handle.await.unwrap().unwrap();

        assert!(drained.load(Ordering::SeqCst));
        // The in-flight reply was published before run returned
        let (subject, _) = replies.try_recv().unwrap();
        assert_eq!(subject, "_INBOX.drain");
    }

    #[tokio::test]
    async fn test_ended_subscription_is_an_error() {
        let (tx, subscription, drained) = channel_subscription();
        let (publisher, _replies) = recording_publisher();
        let responder = QueueResponder::new(
            subscription,
            publisher,
            EchoService::new(Duration::ZERO),
            config(1, Duration::from_secs(5)),
        );

        drop(tx);
        let result = responder.run(CancellationToken::new()).await;

        assert!(result.is_err());
        assert!(drained.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_shutdown_answers_requests_already_delivered() {
        let (tx, subscription, drained) = channel_subscription();
        let (publisher, mut replies) = recording_publisher();
        let service = EchoService::new(Duration::from_millis(50));
        let active = service.active.clone();
        let peak = service.peak.clone();
        let responder = QueueResponder::new(
            subscription,
            publisher,
            service,
            config(1, Duration::from_secs(5)),
        );

        let ctx = CancellationToken::new();
        let handle = tokio::spawn(responder.run(ctx.clone()));

        for i in 0..3 {
            tx.send(inbound(Some(&format!("_INBOX.queued.{i}")), b"queued")).unwrap();
        }
        // First request is running; the other two are still buffered in the subscription
        while active.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        ctx.cancel();
        handle.await.unwrap().unwrap();

        assert!(drained.load(Ordering::SeqCst));
        let mut subjects = Vec::new();
        while let Ok((subject, _)) = replies.try_recv() {
            subjects.push(subject);
        }
        subjects.sort();
        assert_eq!(
            subjects,
            vec!["_INBOX.queued.0", "_INBOX.queued.1", "_INBOX.queued.2"]
        );
        assert_eq!(peak.load(Ordering::SeqCst), 1);

        // Sent after the drain: never delivered
        assert!(tx.send(inbound(Some("_INBOX.late"), b"late")).is_err());
    }
}
