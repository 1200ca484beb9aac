use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use super::{LineItemStore, OrderStore, StoreError};
use crate::domain::{LineItem, NewLineItem, Order, OrderDraft};

// ============================================================================
// In-Memory Storage Backend
// ============================================================================
//
// Keeps the same contract as the Postgres backend, including the unique
// external id guarantee, but holds everything in process memory. Used when
// no DATABASE_URL is configured and as the storage double in tests.
//
// ============================================================================

fn poisoned() -> StoreError {
    StoreError::Backend("In-memory store lock poisoned".to_string())
}

pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<i64, Order>>,
    next_id: AtomicI64,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, draft: OrderDraft) -> Result<Order, StoreError> {
        // Uniqueness check and insert happen under one write lock, so two
        // racing writers cannot both get past the check.
        let mut orders = self.orders.write().map_err(|_| poisoned())?;

        if orders.values().any(|o| o.external_id == draft.external_id) {
            return Err(StoreError::UniqueViolation(draft.external_id));
        }

        let now = Utc::now();
        let order = Order {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            external_id: draft.external_id,
            total: draft.total,
            status: draft.status,
            created_at: now,
            updated_at: now,
        };
        orders.insert(order.id, order.clone());

        Ok(order)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, StoreError> {
        let orders = self.orders.read().map_err(|_| poisoned())?;
        Ok(orders.get(&id).cloned())
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        let orders = self.orders.read().map_err(|_| poisoned())?;
        Ok(orders
            .values()
            .find(|o| o.external_id == external_id)
            .cloned())
    }

    async fn exists_by_external_id(&self, external_id: &str) -> Result<bool, StoreError> {
        let orders = self.orders.read().map_err(|_| poisoned())?;
        Ok(orders.values().any(|o| o.external_id == external_id))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let orders = self.orders.read().map_err(|_| poisoned())?;
        Ok(orders.len() as u64)
    }
}

pub struct InMemoryLineItemStore {
    items: RwLock<Vec<LineItem>>,
    next_id: AtomicI64,
}

impl InMemoryLineItemStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryLineItemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineItemStore for InMemoryLineItemStore {
    async fn insert(&self, order_id: i64, item: &NewLineItem) -> Result<LineItem, StoreError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;

        let line = LineItem {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            order_id,
            name: item.name.clone(),
            price: item.price,
        };
        items.push(line.clone());

        Ok(line)
    }

    async fn find_by_order_id(&self, order_id: i64) -> Result<Vec<LineItem>, StoreError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderStatus;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn draft(external_id: &str) -> OrderDraft {
        let mut draft = OrderDraft::received(external_id);
        draft.set_total(Decimal::from_str("30.50").unwrap());
        draft.mark_processed();
        draft
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids_and_timestamps() {
        let store = InMemoryOrderStore::new();

        let first = store.insert(draft("EXT-001")).await.unwrap();
        let second = store.insert(draft("EXT-002")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.status, OrderStatus::Processed);
        assert_eq!(first.created_at, first.updated_at);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_external_id() {
        let store = InMemoryOrderStore::new();
        store.insert(draft("EXT-001")).await.unwrap();

        let err = store.insert(draft("EXT-001")).await.unwrap_err();

        assert!(matches!(err, StoreError::UniqueViolation(id) if id == "EXT-001"));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_by_id_and_external_id() {
        let store = InMemoryOrderStore::new();
        let stored = store.insert(draft("EXT-001")).await.unwrap();

        let by_id = store.find_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(by_id.external_id, "EXT-001");

        let by_ext = store
            .find_by_external_id("EXT-001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_ext.id, stored.id);

        assert!(store.find_by_id(999).await.unwrap().is_none());
        assert!(store
            .find_by_external_id("EXT-MISSING")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_exists_by_external_id() {
        let store = InMemoryOrderStore::new();
        assert!(!store.exists_by_external_id("EXT-001").await.unwrap());

        store.insert(draft("EXT-001")).await.unwrap();

        assert!(store.exists_by_external_id("EXT-001").await.unwrap());
    }

    #[tokio::test]
    async fn test_line_items_keep_insertion_order_per_order() {
        let store = InMemoryLineItemStore::new();
        let widget = NewLineItem {
            name: "Widget".to_string(),
            price: Decimal::from_str("10.50").unwrap(),
        };
        let gadget = NewLineItem {
            name: "Gadget".to_string(),
            price: Decimal::from_str("20.00").unwrap(),
        };

        store.insert(1, &widget).await.unwrap();
        store.insert(2, &widget).await.unwrap();
        store.insert(1, &gadget).await.unwrap();

        let items = store.find_by_order_id(1).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Widget");
        assert_eq!(items[1].name, "Gadget");
        assert!(items.iter().all(|item| item.order_id == 1));

        assert!(store.find_by_order_id(99).await.unwrap().is_empty());
    }
}
