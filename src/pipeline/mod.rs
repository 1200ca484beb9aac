use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{LineItem, NewOrder, Order, OrderDraft};
use crate::error::IngestError;
use crate::messaging::OrderEventPublisher;
use crate::store::{LineItemStore, OrderStore, StoreError};

// ============================================================================
// Order Ingestion Pipeline
// ============================================================================
//
// The one path every order takes, no matter which entry point it came in
// through. Sequencing is the contract here: duplicate check, total, status
// flip, parent insert, child inserts in input order, then publication.
// There is no transaction around the inserts; a failure mid-way leaves the
// parent and a prefix of the children behind, and on redelivery the
// duplicate check turns the second attempt into a clean rejection.
//
// ============================================================================

pub struct OrderPipeline {
    orders: Arc<dyn OrderStore>,
    line_items: Arc<dyn LineItemStore>,
    publisher: Arc<dyn OrderEventPublisher>,
}

impl OrderPipeline {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        line_items: Arc<dyn LineItemStore>,
        publisher: Arc<dyn OrderEventPublisher>,
    ) -> Self {
        Self {
            orders,
            line_items,
            publisher,
        }
    }

    /// Run one order through the full pipeline. On success the order and all
    /// its line items are stored and the processed event has gone out.
    ///
    /// A [`IngestError::PublishFailed`] result means storage succeeded and
    /// only the announcement failed; callers decide whether that is fatal.
    pub async fn ingest(&self, incoming: NewOrder) -> Result<Order, IngestError> {
        info!(
            external_id = %incoming.external_id,
            line_items = incoming.line_items.len(),
            "Processing order"
        );

        // Fast-path duplicate check. The unique constraint in the store is
        // what actually holds when two ingests race past this point.
        let exists = self
            .orders
            .exists_by_external_id(&incoming.external_id)
            .await
            .map_err(|e| IngestError::persistence(incoming.external_id.as_str(), e))?;
        if exists {
            warn!(external_id = %incoming.external_id, "Duplicate order rejected");
            return Err(IngestError::DuplicateOrder(incoming.external_id));
        }

        let total = incoming
            .line_total()
            .map_err(|source| IngestError::InvalidOrder {
                external_id: incoming.external_id.clone(),
                source,
            })?;

        let mut draft = OrderDraft::received(incoming.external_id.as_str());
        draft.set_total(total);
        draft.mark_processed();

        let order = self.orders.insert(draft).await.map_err(|e| match e {
            // A racing ingest won between the check and this insert; the
            // outcome for this caller is the same as if the check had fired.
            StoreError::UniqueViolation(id) => IngestError::DuplicateOrder(id),
            other => IngestError::persistence(incoming.external_id.as_str(), other),
        })?;

        info!(
            order_id = order.id,
            external_id = %order.external_id,
            total = %order.total,
            "Order stored"
        );

        // Children strictly after the parent, one at a time, in input order.
        for (index, item) in incoming.line_items.iter().enumerate() {
            let line = self
                .line_items
                .insert(order.id, item)
                .await
                .map_err(|e| IngestError::persistence(order.external_id.as_str(), e))?;
            debug!(
                order_id = order.id,
                line_id = line.id,
                index,
                name = %line.name,
                "Line item stored"
            );
        }

        self.publisher
            .publish_processed(&order)
            .await
            .map_err(|source| IngestError::PublishFailed {
                external_id: order.external_id.clone(),
                source,
            })?;

        info!(
            order_id = order.id,
            external_id = %order.external_id,
            "Order ingested"
        );
        Ok(order)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Order, IngestError> {
        self.orders
            .find_by_id(id)
            .await
            .map_err(|e| IngestError::persistence(id.to_string(), e))?
            .ok_or_else(|| IngestError::NotFound(id.to_string()))
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> Result<Order, IngestError> {
        self.orders
            .find_by_external_id(external_id)
            .await
            .map_err(|e| IngestError::persistence(external_id, e))?
            .ok_or_else(|| IngestError::NotFound(external_id.to_string()))
    }

    /// Lines under an order, in storage order. An unknown order id comes
    /// back as an empty list, not an error.
    pub async fn line_items_for_order(&self, order_id: i64) -> Result<Vec<LineItem>, IngestError> {
        self.line_items
            .find_by_order_id(order_id)
            .await
            .map_err(|e| IngestError::persistence(order_id.to_string(), e))
    }

    /// Number of stored orders, surfaced by the storage health endpoint.
    pub async fn order_count(&self) -> Result<u64, IngestError> {
        self.orders
            .count()
            .await
            .map_err(|e| IngestError::persistence("count", e))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
