use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Order Domain Model
// ============================================================================

/// Lifecycle of an order inside the ingestion pipeline.
///
/// Every order starts as `Received` and is flipped to `Processed` before the
/// first persist. `Error` is reserved for orders parked after an unrecoverable
/// failure; the happy path never produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Received,
    Processed,
    Error,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "RECEIVED",
            OrderStatus::Processed => "PROCESSED",
            OrderStatus::Error => "ERROR",
        }
    }

    /// Inverse of [`as_str`](Self::as_str), used when loading rows back
    /// from storage.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RECEIVED" => Some(OrderStatus::Received),
            "PROCESSED" => Some(OrderStatus::Processed),
            "ERROR" => Some(OrderStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted order. `id` is assigned by the store, `external_id` comes from
/// the upstream system and is unique across all orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: i64,
    pub external_id: String,

    // Current state
    pub total: Decimal,
    pub status: OrderStatus,

    // Audit trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order state before its first persist. The store assigns id and timestamps,
/// so the draft only carries what the pipeline has computed so far.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub external_id: String,
    pub total: Decimal,
    pub status: OrderStatus,
}

impl OrderDraft {
    /// Fresh draft in the state every incoming order starts from.
    pub fn received(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            total: Decimal::ZERO,
            status: OrderStatus::Received,
        }
    }

    pub fn set_total(&mut self, total: Decimal) {
        self.total = total;
    }

    pub fn mark_processed(&mut self) {
        self.status = OrderStatus::Processed;
    }

    pub fn mark_error(&mut self) {
        self.status = OrderStatus::Error;
    }
}

/// A persisted line item, always owned by the order identified by `order_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub order_id: i64,
    pub name: String,
    pub price: Decimal,
}

// ============================================================================
// Incoming Order Payload
// ============================================================================

/// The shape both entry points accept: the HTTP endpoint deserializes it from
/// the request body, the consumer from the message payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub external_id: String,
    pub line_items: Vec<NewLineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLineItem {
    pub name: String,
    pub price: Decimal,
}

impl NewOrder {
    /// Sum of all line prices. Decimal addition is exact and commutative, so
    /// the result does not depend on line order. An empty list sums to zero.
    /// The summation is checked: prices whose sum exceeds the decimal range
    /// are an error, not a panic.
    pub fn line_total(&self) -> Result<Decimal, ValidationError> {
        self.line_items
            .iter()
            .try_fold(Decimal::ZERO, |total, line| {
                total
                    .checked_add(line.price)
                    .ok_or(ValidationError::TotalOverflow)
            })
    }

    /// Boundary validation for the synchronous entry point. Line items may be
    /// empty, but every present line needs a name and a positive price, and
    /// the prices must sum within the decimal range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.external_id.trim().is_empty() {
            return Err(ValidationError::BlankExternalId);
        }

        for (index, line) in self.line_items.iter().enumerate() {
            if line.name.trim().is_empty() {
                return Err(ValidationError::BlankLineName { index });
            }
            if line.price <= Decimal::ZERO {
                return Err(ValidationError::NonPositivePrice {
                    index,
                    price: line.price,
                });
            }
        }

        self.line_total()?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("External id must not be blank")]
    BlankExternalId,
    #[error("Line item {index}: name must not be blank")]
    BlankLineName { index: usize },
    #[error("Line item {index}: price must be positive, got {price}")]
    NonPositivePrice { index: usize, price: Decimal },
    #[error("Line prices overflow the representable total")]
    TotalOverflow,
}

// ============================================================================
// Unit Tests
// ============================================================================
