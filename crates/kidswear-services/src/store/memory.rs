use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use kidswear_core::{
    apply_batch, apply_restock, merge_lines, merge_restock, AvailableStock, BatchRejection,
    InventoryRecord, MovementKind, Order, OrderStatus, PaymentStatus, Product, RestockEntry,
    StockLine, StockMovement, StockOp, VariantKey,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CatalogStore, OrderInsert, StoreError};

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<Uuid, StoredProduct>,
    inventory: BTreeMap<VariantKey, InventoryRecord>,
    movements: Vec<StockMovement>,
    orders: Vec<Order>,
}

#[derive(Debug)]
struct StoredProduct {
    product: Product,
    active: bool,
}

/// [`CatalogStore`] held in process memory behind a single async mutex.
///
/// Every operation runs under the lock, so batches and order writes are
/// trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl From<BatchRejection> for StoreError {
    fn from(rejection: BatchRejection) -> Self {
        match rejection {
            BatchRejection::Missing(key) => StoreError::MissingVariant(key),
            BatchRejection::Insufficient(shortfalls) => StoreError::InsufficientStock(shortfalls),
            BatchRejection::Invalid(err) => StoreError::Rejected(err),
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an unreachable backend: every call fails with
    /// [`StoreError::Unavailable`] until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    async fn lock(&self) -> Result<tokio::sync::MutexGuard<'_, State>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(self.state.lock().await)
    }
}

impl State {
    fn apply(
        &mut self,
        op: StockOp,
        lines: &[StockLine],
        reason: Option<&str>,
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        let lines = merge_lines(lines)?;
        let movements = apply_batch(&mut self.inventory, op, &lines, reason, Utc::now())?;
        self.movements.extend(movements);
        Ok(lines
            .iter()
            .filter_map(|line| self.inventory.get(&line.key).cloned())
            .collect())
    }

    fn order_index(&self, id: Uuid) -> Result<usize, StoreError> {
        self.orders
            .iter()
            .position(|o| o.id == id)
            .ok_or(StoreError::NotFound)
    }
}

impl CatalogStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().await.map(|_| ())
    }

    async fn list_active_products(&self) -> Result<Vec<Product>, StoreError> {
        let state = self.lock().await?;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.active)
            .map(|p| p.product.clone())
            .collect();
        products.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .products
            .get(&id)
            .filter(|p| p.active)
            .map(|p| p.product.clone()))
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), StoreError> {
        product.validate()?;
        let mut state = self.lock().await?;
        let mut product = product.clone();
        let created_at = state
            .products
            .get(&product.id)
            .and_then(|existing| existing.product.created_at);
        product.created_at = created_at.or(product.created_at).or_else(|| Some(Utc::now()));
        state.products.insert(
            product.id,
            StoredProduct {
                product,
                active: true,
            },
        );
        Ok(())
    }

    async fn deactivate_product(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.lock().await?;
        Ok(match state.products.get_mut(&id) {
            Some(stored) if stored.active => {
                stored.active = false;
                true
            }
            _ => false,
        })
    }

    async fn available_by_product(&self) -> Result<AvailableStock, StoreError> {
        let state = self.lock().await?;
        let mut totals = AvailableStock::new();
        for record in state.inventory.values() {
            *totals.entry(record.key.product_id).or_insert(0) += i64::from(record.available());
        }
        Ok(totals)
    }

    async fn get_inventory(&self, key: &VariantKey) -> Result<Option<InventoryRecord>, StoreError> {
        Ok(self.lock().await?.inventory.get(key).cloned())
    }

    async fn provision_inventory(
        &self,
        record: &InventoryRecord,
    ) -> Result<InventoryRecord, StoreError> {
        let mut state = self.lock().await?;
        if !state.products.contains_key(&record.key.product_id) {
            return Err(StoreError::NotFound);
        }
        if state.inventory.contains_key(&record.key) {
            return Err(StoreError::VariantExists(record.key.clone()));
        }
        let mut stored = record.clone();
        stored.reserved_quantity = 0;
        state.inventory.insert(stored.key.clone(), stored.clone());
        Ok(stored)
    }

    async fn apply_stock_op(
        &self,
        op: StockOp,
        lines: &[StockLine],
        reason: Option<&str>,
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        self.lock().await?.apply(op, lines, reason)
    }

    async fn restock_entries(
        &self,
        entries: &[RestockEntry],
        reason: Option<&str>,
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        let mut state = self.lock().await?;
        let entries = merge_restock(entries)?;
        let movements = apply_restock(&mut state.inventory, &entries, reason, Utc::now())?;
        state.movements.extend(movements);
        Ok(entries
            .iter()
            .filter_map(|entry| state.inventory.get(&entry.key).cloned())
            .collect())
    }

    async fn set_stock(
        &self,
        key: &VariantKey,
        quantity: i32,
        reason: Option<&str>,
    ) -> Result<(InventoryRecord, Option<StockMovement>), StoreError> {
        let mut state = self.lock().await?;
        let now = Utc::now();
        let record = state
            .inventory
            .get_mut(key)
            .ok_or_else(|| StoreError::MissingVariant(key.clone()))?;
        let delta = record.set_stock(quantity, now)?;
        let record = record.clone();

        let movement = (delta != 0).then(|| StockMovement {
            key: key.clone(),
            delta,
            kind: MovementKind::Adjustment,
            reason: reason.map(str::to_string),
            created_at: now,
        });
        if let Some(m) = &movement {
            state.movements.push(m.clone());
        }
        Ok((record, movement))
    }

    async fn low_stock_records(&self) -> Result<Vec<InventoryRecord>, StoreError> {
        let state = self.lock().await?;
        let mut records: Vec<InventoryRecord> = state
            .inventory
            .values()
            .filter(|r| r.stock_quantity <= r.low_stock_threshold)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.stock_quantity);
        Ok(records)
    }

    async fn list_movements(
        &self,
        key: &VariantKey,
        limit: i64,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .movements
            .iter()
            .rev()
            .filter(|m| &m.key == key)
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn insert_order_reserving(&self, order: &Order) -> Result<OrderInsert, StoreError> {
        let mut state = self.lock().await?;
        if let Some(key) = &order.idempotency_key {
            let existing = state
                .orders
                .iter()
                .find(|o| o.idempotency_key.as_ref() == Some(key));
            if let Some(existing) = existing {
                return Ok(OrderInsert::Existing(existing.clone()));
            }
        }
        if state
            .orders
            .iter()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(StoreError::Conflict(format!(
                "order number {} already taken",
                order.order_number
            )));
        }

        state.apply(
            StockOp::Reserve,
            &order.stock_lines(),
            Some(&order.order_number),
        )?;
        state.orders.push(order.clone());
        Ok(OrderInsert::Created(order.clone()))
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let state = self.lock().await?;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn get_order_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .orders
            .iter()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let state = self.lock().await?;
        let mut orders: Vec<&Order> = state
            .orders
            .iter()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(orders
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn update_order_status(
        &self,
        order: &Order,
        expected: OrderStatus,
        effect: Option<StockOp>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock().await?;
        let idx = state.order_index(order.id)?;
        if state.orders[idx].status != expected {
            return Err(StoreError::StaleOrder {
                id: order.id,
                expected: expected.to_string(),
            });
        }

        if let Some(op) = effect {
            state.apply(op, &order.stock_lines(), Some(&order.order_number))?;
        }

        let stored = &mut state.orders[idx];
        stored.status = order.status;
        stored.tracking_number.clone_from(&order.tracking_number);
        stored.estimated_delivery = order.estimated_delivery;
        stored.delivered_at = order.delivered_at;
        stored.notes.clone_from(&order.notes);
        stored.updated_at = order.updated_at;
        Ok(())
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.lock().await?;
        let idx = state.order_index(id)?;
        let stored = &mut state.orders[idx];
        if stored.payment_status != expected {
            return Err(StoreError::StaleOrder {
                id,
                expected: expected.to_string(),
            });
        }
        stored.payment_status = next;
        stored.updated_at = Utc::now();
        Ok(())
    }
}
