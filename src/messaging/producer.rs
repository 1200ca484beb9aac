use std::sync::Arc;

use async_trait::async_trait;

use super::{MessageTransport, PublishError};
use crate::domain::Order;
use crate::utils::{retry_with_backoff, RetryConfig, RetryResult};

// ============================================================================
// Processed Order Publisher
// ============================================================================
//
// Announces every stored order on the processed topic, keyed by external id
// so all events for one order land on the same partition. Delivery is at
// least once: a send can fail after the broker already accepted it and the
// retry will duplicate the event, so downstream consumers must tolerate
// seeing an order more than once.
//
// ============================================================================

#[async_trait]
pub trait OrderEventPublisher: Send + Sync {
    /// Announce a stored order. Implementations retry transient send failures
    /// and return an error only once they have given up.
    async fn publish_processed(&self, order: &Order) -> Result<(), PublishError>;
}

pub struct ProcessedOrderPublisher {
    transport: Arc<dyn MessageTransport>,
    topic: String,
    retry: RetryConfig,
}

impl ProcessedOrderPublisher {
    pub fn new(transport: Arc<dyn MessageTransport>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
            retry: RetryConfig::default(),
        }
    }

    /// Override the retry policy, mainly so tests can shrink the delays.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl OrderEventPublisher for ProcessedOrderPublisher {
    async fn publish_processed(&self, order: &Order) -> Result<(), PublishError> {
        // A payload that fails to serialize will never send, no point
        // retrying it.
        let payload = serde_json::to_string(order)?;

        tracing::info!(
            external_id = %order.external_id,
            topic = %self.topic,
            "Publishing processed order"
        );

        let outcome = retry_with_backoff(self.retry.clone(), |_attempt| {
            let transport = Arc::clone(&self.transport);
            let topic = self.topic.clone();
            let key = order.external_id.clone();
            let payload = payload.clone();
            async move { transport.send(&topic, &key, &payload).await }
        })
        .await;

        match outcome {
            RetryResult::Success(()) => {
                tracing::info!(
                    external_id = %order.external_id,
                    topic = %self.topic,
                    "Processed order published"
                );
                Ok(())
            }
            RetryResult::Failed(err) => Err(PublishError::Exhausted {
                topic: self.topic.clone(),
                attempts: self.retry.max_attempts,
                reason: err.to_string(),
            }),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
