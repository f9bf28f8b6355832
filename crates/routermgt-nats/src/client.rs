use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_nats::Event;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::traits::{InboundRequest, ReplyPublisher, RequestSubscription};

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(100);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Delay before reconnect attempt `attempts`: 100ms doubling, capped at 10s
pub fn reconnect_delay(attempts: usize) -> Duration {
    let exponent = attempts.min(16) as u32;
    INITIAL_RECONNECT_DELAY
        .saturating_mul(2u32.saturating_pow(exponent))
        .min(MAX_RECONNECT_DELAY)
}

pub struct NatsClient {
    client: async_nats::Client,
}

impl NatsClient {
    /// Connect to the server. The initial connect is not retried; a broker that
    /// is down at startup is fatal.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        info!(url = %url, timeout_ms = timeout.as_millis(), "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .reconnect_delay_callback(reconnect_delay)
            .event_callback(|event| async move {
                match event {
                    Event::Connected => info!("NATS connection established"),
                    Event::Disconnected => warn!("NATS connection lost, reconnecting"),
                    Event::SlowConsumer(sid) => warn!(sid, "NATS slow consumer"),
                    other => debug!(event = %other, "NATS connection event"),
                }
            })
            .connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Successfully connected to NATS");
        Ok(Self { client })
    }

    /// Join `queue_group` on `subject`; each request goes to one member of the group
    pub async fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
    ) -> Result<NatsRequestSubscription> {
        info!(subject = %subject, queue_group = %queue_group, "Subscribing to request subject");

        let subscriber = self
            .client
            .queue_subscribe(subject.to_string(), queue_group.to_string())
            .await
            .with_context(|| format!("Failed to subscribe to {subject}"))?;

        Ok(NatsRequestSubscription { subscriber })
    }

    /// Create a ReplyPublisher trait object from this client
    pub fn create_reply_publisher(&self) -> Arc<dyn ReplyPublisher> {
        Arc::new(NatsReplyPublisher {
            client: self.client.clone(),
        })
    }

    pub async fn close(self) -> Result<()> {
        info!("Closing NATS connection");
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")?;
        // Connection closes when the last client handle is dropped
        Ok(())
    }
}

pub struct NatsRequestSubscription {
    subscriber: async_nats::Subscriber,
}

#[async_trait]
impl RequestSubscription for NatsRequestSubscription {
    async fn next_request(&mut self) -> Option<InboundRequest> {
        let message = self.subscriber.next().await?;

        Some(InboundRequest {
            subject: message.subject.to_string(),
            reply: message.reply.map(|reply| reply.to_string()),
            payload: message.payload,
        })
    }

    async fn drain(&mut self) -> Result<()> {
        self.subscriber
            .drain()
            .await
            .context("Failed to drain subscription")
    }
}

pub struct NatsReplyPublisher {
    client: async_nats::Client,
}

#[async_trait]
impl ReplyPublisher for NatsReplyPublisher {
    async fn publish_reply(&self, subject: String, payload: Bytes) -> Result<()> {
        self.client
            .publish(subject, payload)
            .await
            .context("Failed to publish reply")
    }

    async fn flush(&self) -> Result<()> {
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_delay_doubles_then_caps() {
        assert_eq!(reconnect_delay(0), Duration::from_millis(100));
        assert_eq!(reconnect_delay(1), Duration::from_millis(200));
        assert_eq!(reconnect_delay(3), Duration::from_millis(800));
        assert_eq!(reconnect_delay(6), Duration::from_millis(6400));
        assert_eq!(reconnect_delay(7), MAX_RECONNECT_DELAY);
        assert_eq!(reconnect_delay(usize::MAX), MAX_RECONNECT_DELAY);
    }
}
