use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use super::{LineItemStore, OrderStore, StoreError};
use crate::domain::{LineItem, NewLineItem, Order, OrderDraft, OrderStatus};

// ============================================================================
// Postgres Storage Backend
// ============================================================================
//
// Orders and line items live in two tables; the UNIQUE constraint on
// orders.external_id is what actually enforces idempotency, the pipeline's
// duplicate check is only the fast path. Queries are written against a
// schema the service applies itself on startup, see migrations/.
//
// ============================================================================

const SCHEMA: &str = include_str!("../../migrations/0001_create_orders.sql");

/// Open a connection pool against `url`.
pub async fn connect(url: &str) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await?;
    Ok(pool)
}

/// Apply the schema. Every statement is IF NOT EXISTS, so running this on
/// every startup is safe.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

fn row_to_order(row: &PgRow) -> Result<Order, StoreError> {
    let status_raw: String = row.try_get("status")?;
    let status = OrderStatus::parse(&status_raw).ok_or_else(|| {
        StoreError::Backend(format!("Unknown order status in storage: {status_raw}"))
    })?;

    Ok(Order {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        total: row.try_get("total")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_line_item(row: &PgRow) -> Result<LineItem, StoreError> {
    Ok(LineItem {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        name: row.try_get("name")?,
        price: row.try_get("price")?,
    })
}

fn classify_insert_error(err: sqlx::Error, external_id: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation(external_id.to_string());
        }
    }
    StoreError::Database(err)
}

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, draft: OrderDraft) -> Result<Order, StoreError> {
        let row = sqlx::query(
            "INSERT INTO orders (external_id, total, status) VALUES ($1, $2, $3) \
             RETURNING id, external_id, total, status, created_at, updated_at",
        )
        .bind(&draft.external_id)
        .bind(draft.total)
        .bind(draft.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| classify_insert_error(err, &draft.external_id))?;

        row_to_order(&row)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            "SELECT id, external_id, total, status, created_at, updated_at \
             FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_order(&r)).transpose()
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            "SELECT id, external_id, total, status, created_at, updated_at \
             FROM orders WHERE external_id = $1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_order(&r)).transpose()
    }

    async fn exists_by_external_id(&self, external_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM orders WHERE external_id = $1) AS present",
        )
        .bind(external_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("present")?)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM orders")
            .fetch_one(&self.pool)
            .await?;

        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }
}

pub struct PgLineItemStore {
    pool: PgPool,
}

impl PgLineItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LineItemStore for PgLineItemStore {
    async fn insert(&self, order_id: i64, item: &NewLineItem) -> Result<LineItem, StoreError> {
        let row = sqlx::query(
            "INSERT INTO line_items (order_id, name, price) VALUES ($1, $2, $3) \
             RETURNING id, order_id, name, price",
        )
        .bind(order_id)
        .bind(&item.name)
        .bind(item.price)
        .fetch_one(&self.pool)
        .await?;

        row_to_line_item(&row)
    }

    async fn find_by_order_id(&self, order_id: i64) -> Result<Vec<LineItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, order_id, name, price FROM line_items \
             WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_line_item).collect()
    }
}
