//! Order fulfillment: checkout, status and payment transitions, cancellation.
//!
//! Every order write that moves inventory commits together with its stock
//! effect: creation reserves, shipment commits the sale, cancellation
//! releases (or restocks once shipped), and a return restocks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kidswear_core::{
    generate_order_number, Locale, NewOrder, Order, OrderLine, OrderStatus, PaymentStatus,
    PricingPolicy, Product, StockOp,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::DEFAULT_MAX_RETRIES;
use crate::retry::{retry_with_backoff, BACKOFF_BASE_MS};
use crate::store::{CatalogStore, OrderInsert, StoreError};
use crate::ServiceError;

/// Requested change for `update_order_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    #[must_use]
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            tracking_number: None,
            estimated_delivery: None,
        }
    }
}

/// Result of `create_order`.
#[derive(Debug, Clone)]
pub struct Placement {
    pub order: Order,
    /// `true` when an earlier checkout with the same idempotency key already
    /// created this order.
    pub replayed: bool,
}

/// Stock effect of moving an order from `from` to `to`.
fn stock_effect(from: OrderStatus, to: OrderStatus) -> Option<StockOp> {
    match to {
        _ if from == to => None,
        OrderStatus::Shipped => Some(StockOp::CommitSale),
        OrderStatus::Returned => Some(StockOp::Return),
        OrderStatus::Cancelled if from.has_shipped() => Some(StockOp::CancelRestock),
        OrderStatus::Cancelled => Some(StockOp::Release),
        _ => None,
    }
}

pub struct OrderCoordinator<S> {
    store: Arc<S>,
    pricing: PricingPolicy,
    max_retries: u32,
}

impl<S> Clone for OrderCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            pricing: self.pricing,
            max_retries: self.max_retries,
        }
    }
}

impl<S: CatalogStore> OrderCoordinator<S> {
    #[must_use]
    pub fn new(store: Arc<S>, pricing: PricingPolicy) -> Self {
        Self {
            store,
            pricing,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    /// Prices the cart from the live catalog, reserves every line and stores
    /// the order, atomically.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for malformed input or a size/color the
    /// product does not offer; [`ServiceError::NotFound`] for an unknown or
    /// inactive product or an unprovisioned variant;
    /// [`ServiceError::CapacityConflict`] listing every short line.
    pub async fn create_order(&self, input: NewOrder) -> Result<Placement, ServiceError> {
        input.validate()?;

        let mut lines = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let product = self
                .store
                .get_product(item.product_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("product {}", item.product_id)))?;
            check_variant(&product, &item.size, item.color_index)?;
            lines.push(OrderLine::new(
                product.id,
                product.name.get(Locale::default()).to_string(),
                item.size.clone(),
                item.color_index,
                product.price,
                item.quantity,
            ));
        }
        // Checkout never takes a discount from the request body.
        let totals = self.pricing.totals(&lines, Decimal::ZERO)?;

        let store = &*self.store;
        let (input, lines) = (&input, &lines);
        let order_id = Uuid::new_v4();
        let inserted = retry_with_backoff(self.max_retries, BACKOFF_BASE_MS, move || async move {
            let now = Utc::now();
            let order = Order {
                id: order_id,
                order_number: generate_order_number(now),
                customer: input.customer.clone(),
                customer_id: input.customer_id.clone(),
                shipping_address: input.shipping_address.clone(),
                items: lines.clone(),
                totals,
                payment_method: input.payment_method,
                payment_status: PaymentStatus::Pending,
                status: OrderStatus::Pending,
                notes: input.notes.clone(),
                tracking_number: None,
                estimated_delivery: None,
                delivered_at: None,
                idempotency_key: input.idempotency_key.clone(),
                created_at: now,
                updated_at: now,
            };
            store.insert_order_reserving(&order).await
        })
        .await
        .inspect_err(|e| {
            if let StoreError::InsufficientStock(shortfalls) = e {
                tracing::info!(lines = shortfalls.len(), "checkout refused: insufficient stock");
            }
        })?;

        let placement = match inserted {
            OrderInsert::Created(order) => Placement {
                order,
                replayed: false,
            },
            OrderInsert::Existing(order) => Placement {
                order,
                replayed: true,
            },
        };
        tracing::info!(
            order_number = %placement.order.order_number,
            total_amount = %placement.order.totals.total_amount,
            items = placement.order.items.len(),
            replayed = placement.replayed,
            "order placed"
        );
        Ok(placement)
    }

    /// Moves an order along its state machine, applying the stock effect of
    /// the move. A write to the current status is a no-op.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown order;
    /// [`ServiceError::Validation`] for a transition the state machine does
    /// not allow.
    pub async fn update_order_status(
        &self,
        id: Uuid,
        update: StatusUpdate,
    ) -> Result<Order, ServiceError> {
        self.transition(id, update.status, |order| {
            if let Some(tracking) = &update.tracking_number {
                order.tracking_number = Some(tracking.clone());
            }
            if let Some(eta) = update.estimated_delivery {
                order.estimated_delivery = Some(eta);
            }
        })
        .await
    }

    /// Cancels an order, appending `reason` to its notes.
    ///
    /// Before shipment the reservation is released; after shipment the goods
    /// are restocked. Either way available stock rises by the ordered
    /// quantity.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown order;
    /// [`ServiceError::Validation`] if the order is delivered or returned.
    pub async fn cancel_order(
        &self,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<Order, ServiceError> {
        self.transition(id, OrderStatus::Cancelled, |order| {
            if let Some(reason) = reason {
                order.append_note(&format!("Cancelled: {reason}"));
            }
        })
        .await
    }

    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown order;
    /// [`ServiceError::Validation`] for a transition the payment state
    /// machine does not allow.
    pub async fn update_payment_status(
        &self,
        id: Uuid,
        next: PaymentStatus,
    ) -> Result<Order, ServiceError> {
        let store = &*self.store;
        let order = retry_with_backoff(self.max_retries, BACKOFF_BASE_MS, move || async move {
            let mut order = store.get_order(id).await?.ok_or(StoreError::NotFound)?;
            let from = order.payment_status;
            if from.transition(next)? != from {
                store.update_payment_status(id, from, next).await?;
                order.payment_status = next;
                order.updated_at = Utc::now();
            }
            Ok(order)
        })
        .await
        .map_err(|e| not_found_as_order(e, id))?;

        tracing::info!(
            order_number = %order.order_number,
            payment_status = %order.payment_status,
            "payment status updated"
        );
        Ok(order)
    }

    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown order.
    pub async fn get_order(&self, id: Uuid) -> Result<Order, ServiceError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {id}")))
    }

    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown order number.
    pub async fn get_order_by_number(&self, order_number: &str) -> Result<Order, ServiceError> {
        self.store
            .get_order_by_number(order_number)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_number}")))
    }

    /// Customer-facing lookup. The phone on the order must match `phone`;
    /// a mismatch reads the same as an unknown order number.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown number or a wrong phone.
    pub async fn track_order(
        &self,
        order_number: &str,
        phone: &str,
    ) -> Result<Order, ServiceError> {
        self.store
            .get_order_by_number(order_number)
            .await?
            .filter(|order| order.customer.phone_matches(phone))
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_number}")))
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Unavailable`] if the store cannot be reached.
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, ServiceError> {
        Ok(self
            .store
            .list_orders(status, limit.clamp(1, 200), offset.max(0))
            .await?)
    }

    async fn transition<F>(
        &self,
        id: Uuid,
        next: OrderStatus,
        annotate: F,
    ) -> Result<Order, ServiceError>
    where
        F: Fn(&mut Order) + Send + Sync,
    {
        let store = &*self.store;
        let annotate = &annotate;
        let (order, from) =
            retry_with_backoff(self.max_retries, BACKOFF_BASE_MS, move || async move {
                let mut order = store.get_order(id).await?.ok_or(StoreError::NotFound)?;
                let from = order.status;
                if from.transition(next)? == from {
                    return Ok((order, from));
                }

                let now = Utc::now();
                order.status = next;
                order.updated_at = now;
                if next == OrderStatus::Delivered {
                    order.delivered_at = Some(now);
                }
                annotate(&mut order);

                store
                    .update_order_status(&order, from, stock_effect(from, next))
                    .await?;
                Ok((order, from))
            })
            .await
            .map_err(|e| not_found_as_order(e, id))?;

        tracing::info!(
            order_number = %order.order_number,
            from = %from,
            to = %order.status,
            "order status updated"
        );
        Ok(order)
    }
}

fn not_found_as_order(err: StoreError, id: Uuid) -> ServiceError {
    match err {
        StoreError::NotFound => ServiceError::NotFound(format!("order {id}")),
        other => other.into(),
    }
}

fn check_variant(product: &Product, size: &str, color_index: i32) -> Result<(), ServiceError> {
    if !product.has_size(size) {
        return Err(ServiceError::Validation(format!(
            "product {} is not offered in size '{size}'",
            product.id
        )));
    }
    let color_ok = if product.colors.is_empty() {
        color_index == 0
    } else {
        product.color(color_index).is_some()
    };
    if !color_ok {
        return Err(ServiceError::Validation(format!(
            "product {} has no color #{color_index}",
            product.id
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
