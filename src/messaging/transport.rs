use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
};

use super::PublishError;

// ============================================================================
// Message Transport
// ============================================================================
//
// A single delivery attempt over the wire. The retry policy lives with the
// publisher, not here, which lets tests swap in a scripted transport and
// count exactly how many attempts it saw.
//
// ============================================================================

#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deliver one message. One attempt, no retries.
    async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), PublishError>;
}

pub struct KafkaTransport {
    producer: FutureProducer,
}

impl KafkaTransport {
    pub fn new(brokers: &str) -> Result<Self, PublishError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| PublishError::ClientCreation(e.to_string()))?;

        Ok(Self { producer })
    }
}

#[async_trait]
impl MessageTransport for KafkaTransport {
    async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), PublishError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        self.producer
            .send(
                record,
                rdkafka::util::Timeout::After(Duration::from_secs(5)),
            )
            .await
            .map_err(|(err, _)| PublishError::Transport {
                topic: topic.to_string(),
                reason: err.to_string(),
            })?;

        tracing::debug!(topic, key, "Message accepted by broker");
        Ok(())
    }
}
