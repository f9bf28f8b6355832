use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// A request message pulled from the queue-group subscription
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub subject: String,
    /// Where the reply goes; `None` for fire-and-forget publishes
    pub reply: Option<String>,
    pub payload: Bytes,
}

/// Trait for the request subscription
/// Abstracts the queue-group subscriber so the responder can run without a broker
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RequestSubscription: Send {
    /// Wait for the next request; `None` once the subscription has ended
    async fn next_request(&mut self) -> Option<InboundRequest>;

    /// Stop new deliveries. Requests already buffered are still returned by
    /// `next_request` until it yields `None`.
    async fn drain(&mut self) -> Result<()>;
}

/// Trait for publishing replies
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReplyPublisher: Send + Sync {
    /// Publish a reply body to a reply subject
    async fn publish_reply(&self, subject: String, payload: Bytes) -> Result<()>;

    /// Flush buffered publishes to the server
    async fn flush(&self) -> Result<()>;
}
