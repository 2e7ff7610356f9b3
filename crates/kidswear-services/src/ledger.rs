//! Inventory ledger: the only entry point that mutates stock or reservations.

use std::sync::Arc;

use chrono::Utc;
use kidswear_core::{
    merge_restock, Availability, InventoryAlert, InventoryRecord, RestockEntry, StockLine,
    StockMovement, StockOp, VariantKey,
};
use rust_decimal::Decimal;

use crate::retry::{retry_with_backoff, BACKOFF_BASE_MS};
use crate::store::CatalogStore;
use crate::ServiceError;

pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub struct InventoryLedger<S> {
    store: Arc<S>,
    default_low_stock_threshold: i32,
    max_retries: u32,
}

impl<S> Clone for InventoryLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            default_low_stock_threshold: self.default_low_stock_threshold,
            max_retries: self.max_retries,
        }
    }
}

impl<S: CatalogStore> InventoryLedger<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            default_low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    #[must_use]
    pub fn with_default_threshold(mut self, threshold: i32) -> Self {
        self.default_low_stock_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Stock not promised to orders for one variant, clamped at zero.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for a negative request,
    /// [`ServiceError::NotFound`] for an unprovisioned variant.
    pub async fn check_availability(
        &self,
        key: &VariantKey,
        requested: i32,
    ) -> Result<Availability, ServiceError> {
        if requested < 0 {
            return Err(ServiceError::Validation(format!(
                "requested quantity must be non-negative, got {requested}"
            )));
        }
        let record = self
            .store
            .get_inventory(key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("inventory variant {key}")))?;
        Ok(record.availability(requested))
    }

    /// Reserves every line or none of them.
    ///
    /// # Errors
    ///
    /// [`ServiceError::CapacityConflict`] listing every line that cannot be
    /// covered; [`ServiceError::NotFound`] for an unprovisioned variant.
    pub async fn reserve_stock(
        &self,
        lines: &[StockLine],
    ) -> Result<Vec<InventoryRecord>, ServiceError> {
        let records = self.apply(StockOp::Reserve, lines, None).await.map_err(|e| {
            if let ServiceError::CapacityConflict(shortfalls) = &e {
                for s in shortfalls {
                    tracing::info!(
                        product_id = %s.key.product_id,
                        size = %s.key.size,
                        color_index = s.key.color_index,
                        requested = s.requested,
                        available = s.available,
                        "reservation refused"
                    );
                }
            }
            e
        })?;
        tracing::info!(lines = lines.len(), "stock reserved");
        Ok(records)
    }

    /// Releases reservations; reserved quantity never drops below zero.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unprovisioned variant.
    pub async fn release_reserved_stock(
        &self,
        lines: &[StockLine],
    ) -> Result<Vec<InventoryRecord>, ServiceError> {
        let records = self.apply(StockOp::Release, lines, None).await?;
        tracing::info!(lines = lines.len(), "reservations released");
        Ok(records)
    }

    /// Sets absolute stock for one variant and logs the delta.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] if `quantity` is negative or below the
    /// reserved quantity; [`ServiceError::NotFound`] for an unprovisioned
    /// variant.
    pub async fn update_stock(
        &self,
        key: &VariantKey,
        quantity: i32,
        reason: Option<&str>,
    ) -> Result<InventoryRecord, ServiceError> {
        let store = &*self.store;
        let (record, movement) = retry_with_backoff(self.max_retries, BACKOFF_BASE_MS, move || {
            async move { store.set_stock(key, quantity, reason).await }
        })
        .await?;
        tracing::info!(
            product_id = %key.product_id,
            size = %key.size,
            color_index = key.color_index,
            stock_quantity = record.stock_quantity,
            delta = movement.as_ref().map_or(0, |m| m.delta),
            reason = reason.unwrap_or(""),
            "stock adjusted"
        );
        Ok(record)
    }

    /// Adds delivered quantities, each entry at its own unit cost.
    ///
    /// The whole delivery is one atomic write: either every entry lands or
    /// none does.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for non-positive quantities, negative
    /// costs or a stock overflow; [`ServiceError::NotFound`] for an
    /// unprovisioned variant.
    pub async fn restock_items(
        &self,
        entries: &[RestockEntry],
    ) -> Result<Vec<InventoryRecord>, ServiceError> {
        let entries = merge_restock(entries)?;
        let store = &*self.store;
        let batch = &entries;
        let updated = retry_with_backoff(self.max_retries, BACKOFF_BASE_MS, move || async move {
            store.restock_entries(batch, Some("restock")).await
        })
        .await?;
        tracing::info!(entries = entries.len(), "stock restocked");
        Ok(updated)
    }

    /// Records at or below their low-stock threshold, most severe first.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Unavailable`] if the store cannot be reached.
    pub async fn get_inventory_alerts(&self) -> Result<Vec<InventoryAlert>, ServiceError> {
        let mut alerts: Vec<InventoryAlert> = self
            .store
            .low_stock_records()
            .await?
            .iter()
            .filter_map(InventoryRecord::alert)
            .collect();
        alerts.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then(a.stock_quantity.cmp(&b.stock_quantity))
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(alerts)
    }

    /// Creates the inventory record for a variant stocked for the first time.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for negative values or an already
    /// provisioned variant; [`ServiceError::NotFound`] for an unknown product.
    pub async fn provision(
        &self,
        key: VariantKey,
        stock_quantity: i32,
        low_stock_threshold: Option<i32>,
        cost_per_unit: Option<Decimal>,
    ) -> Result<InventoryRecord, ServiceError> {
        let record = InventoryRecord::provision(
            key,
            stock_quantity,
            low_stock_threshold.unwrap_or(self.default_low_stock_threshold),
            cost_per_unit,
            Utc::now(),
        )?;
        let record = self.store.provision_inventory(&record).await?;
        tracing::info!(
            product_id = %record.key.product_id,
            size = %record.key.size,
            color_index = record.key.color_index,
            stock_quantity = record.stock_quantity,
            "inventory provisioned"
        );
        Ok(record)
    }

    /// Most recent movement-log entries for one variant.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Unavailable`] if the store cannot be reached.
    pub async fn movements(
        &self,
        key: &VariantKey,
        limit: i64,
    ) -> Result<Vec<StockMovement>, ServiceError> {
        Ok(self.store.list_movements(key, limit.clamp(1, 500)).await?)
    }

    async fn apply(
        &self,
        op: StockOp,
        lines: &[StockLine],
        reason: Option<&str>,
    ) -> Result<Vec<InventoryRecord>, ServiceError> {
        let store = &*self.store;
        Ok(
            retry_with_backoff(self.max_retries, BACKOFF_BASE_MS, move || async move {
                store.apply_stock_op(op, lines, reason).await
            })
            .await?,
        )
    }
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod tests;
