use kidswear_core::{
    AvailableStock, InventoryRecord, Order, OrderStatus, PaymentStatus, Product, RestockEntry,
    StockLine, StockMovement, StockOp, VariantKey,
};
use kidswear_db::{DbError, OrderInsert};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CatalogStore, StoreError};

const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";

/// [`CatalogStore`] over Postgres.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => StoreError::NotFound,
            DbError::MissingVariant(key) => StoreError::MissingVariant(key),
            DbError::VariantExists(key) => StoreError::VariantExists(key),
            DbError::InsufficientStock(shortfalls) => StoreError::InsufficientStock(shortfalls),
            DbError::StaleOrder { id, expected } => StoreError::StaleOrder { id, expected },
            DbError::Rejected(e) => StoreError::Rejected(e),
            DbError::Sqlx(e) => classify_sqlx(&e),
            DbError::Migration(_) | DbError::CorruptRow { .. } => {
                StoreError::Backend(err.to_string())
            }
        }
    }
}

fn classify_sqlx(err: &sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
        // 23503 foreign_key_violation: the referenced product does not exist
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => StoreError::NotFound,
        sqlx::Error::Database(db) => {
            // 40001 serialization_failure, 40P01 deadlock_detected
            let transient = matches!(db.code().as_deref(), Some("40001" | "40P01"))
                || db.constraint() == Some(ORDER_NUMBER_CONSTRAINT);
            if transient {
                StoreError::Conflict(db.message().to_string())
            } else {
                StoreError::Backend(err.to_string())
            }
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

impl CatalogStore for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(kidswear_db::health_check(&self.pool).await?)
    }

    async fn list_active_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(kidswear_db::list_active_products(&self.pool).await?)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(kidswear_db::get_product(&self.pool, id).await?)
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), StoreError> {
        Ok(kidswear_db::upsert_product(&self.pool, product).await?)
    }

    async fn deactivate_product(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(kidswear_db::deactivate_product(&self.pool, id).await?)
    }

    async fn available_by_product(&self) -> Result<AvailableStock, StoreError> {
        Ok(kidswear_db::available_by_product(&self.pool).await?)
    }

    async fn get_inventory(&self, key: &VariantKey) -> Result<Option<InventoryRecord>, StoreError> {
        Ok(kidswear_db::get_inventory(&self.pool, key).await?)
    }

    async fn provision_inventory(
        &self,
        record: &InventoryRecord,
    ) -> Result<InventoryRecord, StoreError> {
        Ok(kidswear_db::provision_inventory(&self.pool, record).await?)
    }

    async fn apply_stock_op(
        &self,
        op: StockOp,
        lines: &[StockLine],
        reason: Option<&str>,
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        Ok(kidswear_db::apply_stock_op(&self.pool, op, lines, reason).await?)
    }

    async fn restock_entries(
        &self,
        entries: &[RestockEntry],
        reason: Option<&str>,
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        Ok(kidswear_db::restock_entries(&self.pool, entries, reason).await?)
    }

    async fn set_stock(
        &self,
        key: &VariantKey,
        quantity: i32,
        reason: Option<&str>,
    ) -> Result<(InventoryRecord, Option<StockMovement>), StoreError> {
        Ok(kidswear_db::set_stock(&self.pool, key, quantity, reason).await?)
    }

    async fn low_stock_records(&self) -> Result<Vec<InventoryRecord>, StoreError> {
        Ok(kidswear_db::list_inventory_at_or_below_threshold(&self.pool).await?)
    }

    async fn list_movements(
        &self,
        key: &VariantKey,
        limit: i64,
    ) -> Result<Vec<StockMovement>, StoreError> {
        Ok(kidswear_db::list_movements(&self.pool, key, limit).await?)
    }

    async fn insert_order_reserving(&self, order: &Order) -> Result<OrderInsert, StoreError> {
        Ok(kidswear_db::insert_order_reserving(&self.pool, order).await?)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(kidswear_db::get_order(&self.pool, id).await?)
    }

    async fn get_order_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        Ok(kidswear_db::get_order_by_number(&self.pool, order_number).await?)
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, StoreError> {
        Ok(kidswear_db::list_orders(&self.pool, status, limit, offset).await?)
    }

    async fn update_order_status(
        &self,
        order: &Order,
        expected: OrderStatus,
        effect: Option<StockOp>,
    ) -> Result<(), StoreError> {
        Ok(kidswear_db::update_order_status(&self.pool, order, expected, effect).await?)
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<(), StoreError> {
        Ok(kidswear_db::update_payment_status(&self.pool, id, expected, next).await?)
    }
}
