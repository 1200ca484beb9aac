use thiserror::Error;

// ============================================================================
// Messaging Layer
// ============================================================================
//
// Kafka plumbing for both directions: the transport and publisher announce
// processed orders, the consumer drains the received-orders topic and feeds
// the pipeline.
//
// ============================================================================

pub mod consumer;
pub mod producer;
pub mod transport;

pub use producer::{OrderEventPublisher, ProcessedOrderPublisher};
pub use transport::{KafkaTransport, MessageTransport};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to create kafka producer: {0}")]
    ClientCreation(String),

    #[error("Failed to serialize order event: {0}")]
    Serialize(#[from] serde_json::Error),

    /// One send attempt failed. The publisher turns a run of these into
    /// [`Exhausted`](Self::Exhausted) once every attempt has failed.
    #[error("Send to topic {topic} failed: {reason}")]
    Transport { topic: String, reason: String },

    #[error("Gave up publishing to topic {topic} after {attempts} attempts: {reason}")]
    Exhausted {
        topic: String,
        attempts: u32,
        reason: String,
    },
}
