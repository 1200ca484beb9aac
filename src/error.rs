use thiserror::Error;

use crate::domain::ValidationError;
use crate::messaging::PublishError;
use crate::store::StoreError;

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Failures surfaced by the ingestion pipeline. Both entry points consume
/// this type: the HTTP layer maps each variant to a status code, the consumer
/// re-raises it so the transport redelivers the message.
#[derive(Debug, Error)]
pub enum IngestError {
    /// An order with this external id already exists. Nothing was written.
    #[error("Order already exists: {0}")]
    DuplicateOrder(String),

    /// Lookup miss on a read operation. The value identifies what was asked
    /// for, either a storage id or an external id.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// The order's total cannot be computed: summing the line prices
    /// overflows the decimal range. Nothing was written.
    #[error("Invalid order {external_id}: {source}")]
    InvalidOrder {
        external_id: String,
        #[source]
        source: ValidationError,
    },

    /// A storage operation failed. When this comes out of ingestion the order
    /// may be partially persisted, that is deliberate: redelivery runs the
    /// duplicate check again and nothing is rolled back here.
    #[error("Storage failure for order {order}: {source}")]
    Persistence {
        order: String,
        #[source]
        source: StoreError,
    },

    /// The order and its line items are stored, but announcing it failed even
    /// after retries. Callers that care about delivery must treat this as a
    /// retriable outcome; callers that only care about storage may ignore it.
    #[error("Order {external_id} stored but publication failed: {source}")]
    PublishFailed {
        external_id: String,
        #[source]
        source: PublishError,
    },
}

impl IngestError {
    pub fn persistence(order: impl Into<String>, source: StoreError) -> Self {
        IngestError::Persistence {
            order: order.into(),
            source,
        }
    }
}
