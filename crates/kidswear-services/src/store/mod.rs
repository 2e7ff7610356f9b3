//! The keyed record store the services run against.
//!
//! [`PgStore`] is the production implementation over `kidswear-db`;
//! [`MemoryStore`] keeps everything behind one async mutex and backs the
//! service and router tests.

mod memory;
mod postgres;

use std::future::Future;

use kidswear_core::{
    AvailableStock, CoreError, InventoryRecord, Order, OrderStatus, PaymentStatus, Product,
    RestockEntry, Shortfall, StockLine, StockMovement, StockOp, VariantKey,
};
use thiserror::Error;
use uuid::Uuid;

pub use kidswear_db::OrderInsert;
pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A transient write conflict (serialization failure, deadlock, order
    /// number collision). Safe to retry.
    #[error("store conflict: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("inventory variant {0} is not provisioned")]
    MissingVariant(VariantKey),
    #[error("inventory variant {0} is already provisioned")]
    VariantExists(VariantKey),
    #[error("insufficient stock for {} line(s)", .0.len())]
    InsufficientStock(Vec<Shortfall>),
    /// The order changed since it was read.
    #[error("order {id} is no longer {expected}")]
    StaleOrder { id: Uuid, expected: String },
    #[error(transparent)]
    Rejected(#[from] CoreError),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Errors a caller may retry after re-reading.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict(_) | StoreError::StaleOrder { .. })
    }
}

/// Products, inventory and orders, keyed the way the services address them.
///
/// Every inventory-moving write is atomic: a batch either applies to every
/// line or to none, and an order write with a stock effect commits both or
/// neither.
pub trait CatalogStore: Send + Sync + 'static {
    fn health_check(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    // Products

    fn list_active_products(&self) -> impl Future<Output = Result<Vec<Product>, StoreError>> + Send;

    fn get_product(&self, id: Uuid)
        -> impl Future<Output = Result<Option<Product>, StoreError>> + Send;

    fn upsert_product(
        &self,
        product: &Product,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns `false` when no active product had that id.
    fn deactivate_product(&self, id: Uuid) -> impl Future<Output = Result<bool, StoreError>> + Send;

    // Inventory

    fn available_by_product(&self)
        -> impl Future<Output = Result<AvailableStock, StoreError>> + Send;

    fn get_inventory(
        &self,
        key: &VariantKey,
    ) -> impl Future<Output = Result<Option<InventoryRecord>, StoreError>> + Send;

    fn provision_inventory(
        &self,
        record: &InventoryRecord,
    ) -> impl Future<Output = Result<InventoryRecord, StoreError>> + Send;

    fn apply_stock_op(
        &self,
        op: StockOp,
        lines: &[StockLine],
        reason: Option<&str>,
    ) -> impl Future<Output = Result<Vec<InventoryRecord>, StoreError>> + Send;

    /// Restocks every entry at its own unit cost in one atomic write.
    fn restock_entries(
        &self,
        entries: &[RestockEntry],
        reason: Option<&str>,
    ) -> impl Future<Output = Result<Vec<InventoryRecord>, StoreError>> + Send;

    fn set_stock(
        &self,
        key: &VariantKey,
        quantity: i32,
        reason: Option<&str>,
    ) -> impl Future<Output = Result<(InventoryRecord, Option<StockMovement>), StoreError>> + Send;

    /// Records with stock at or below their threshold.
    fn low_stock_records(&self)
        -> impl Future<Output = Result<Vec<InventoryRecord>, StoreError>> + Send;

    /// Newest first.
    fn list_movements(
        &self,
        key: &VariantKey,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<StockMovement>, StoreError>> + Send;

    // Orders

    /// Reserves the order's lines and stores it, or returns the order already
    /// stored under the same idempotency key.
    fn insert_order_reserving(
        &self,
        order: &Order,
    ) -> impl Future<Output = Result<OrderInsert, StoreError>> + Send;

    fn get_order(&self, id: Uuid) -> impl Future<Output = Result<Option<Order>, StoreError>> + Send;

    fn get_order_by_number(
        &self,
        order_number: &str,
    ) -> impl Future<Output = Result<Option<Order>, StoreError>> + Send;

    /// Newest first.
    fn list_orders(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> impl Future<Output = Result<Vec<Order>, StoreError>> + Send;

    /// Writes `order`'s status fields if the stored status is still
    /// `expected`, applying `effect` to its lines in the same unit.
    fn update_order_status(
        &self,
        order: &Order,
        expected: OrderStatus,
        effect: Option<StockOp>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn update_payment_status(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
