use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{LineItem, NewLineItem, Order, OrderDraft};

// ============================================================================
// Storage Layer - Ports
// ============================================================================
//
// The pipeline talks to storage through these two traits. Two backends
// implement them: a Postgres pair for real deployments and an in-memory
// pair used when no database is configured and throughout the tests.
//
// ============================================================================

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryLineItemStore, InMemoryOrderStore};
pub use postgres::{PgLineItemStore, PgOrderStore};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The external id is already taken. Raised by the backend's uniqueness
    /// guarantee, which holds even when two writers race past the pipeline's
    /// own duplicate check.
    #[error("External id already exists: {0}")]
    UniqueViolation(String),

    #[error("Database failure: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend trouble that is not a database error, e.g. a row that cannot
    /// be mapped back into the domain model.
    #[error("Storage backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a draft as a new order row. The store assigns the id and both
    /// timestamps and returns the full record.
    async fn insert(&self, draft: OrderDraft) -> Result<Order, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, StoreError>;

    async fn find_by_external_id(&self, external_id: &str)
        -> Result<Option<Order>, StoreError>;

    async fn exists_by_external_id(&self, external_id: &str) -> Result<bool, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait LineItemStore: Send + Sync {
    /// Persist one line under an already-stored order. Callers insert lines
    /// one at a time, in input order, only after the parent insert succeeded.
    async fn insert(&self, order_id: i64, item: &NewLineItem) -> Result<LineItem, StoreError>;

    async fn find_by_order_id(&self, order_id: i64) -> Result<Vec<LineItem>, StoreError>;
}
