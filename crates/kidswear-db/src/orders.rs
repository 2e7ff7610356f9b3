//! Database operations for `orders`.
//!
//! Order writes that move inventory (creation, shipment, cancellation,
//! return) run the stock change and the order write in one transaction.

use chrono::{DateTime, Utc};
use kidswear_core::{
    CustomerInfo, Order, OrderLine, OrderStatus, OrderTotals, PaymentStatus, ShippingAddress,
    StockOp,
};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::inventory::apply_in_tx;
use crate::{corrupt, DbError};

const ORDER_COLUMNS: &str = "id, order_number, idempotency_key, customer_name, customer_phone, \
     customer_email, customer_id, shipping_address, items, subtotal, shipping_cost, tax_amount, \
     discount_amount, total_amount, payment_method, payment_status, status, notes, \
     tracking_number, estimated_delivery, delivered_at, created_at, updated_at";

const IDEMPOTENCY_CONSTRAINT: &str = "orders_idempotency_key_key";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub idempotency_key: Option<String>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub customer_id: Option<String>,
    pub shipping_address: Json<ShippingAddress>,
    /// Line items frozen at checkout.
    pub items: Json<Vec<OrderLine>>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_method: String,
    pub payment_status: String,
    pub status: String,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    /// # Errors
    ///
    /// Returns [`DbError::CorruptRow`] if a stored enum value is unknown.
    pub fn into_order(self) -> Result<Order, DbError> {
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            customer: CustomerInfo {
                name: self.customer_name,
                phone: self.customer_phone,
                email: self.customer_email,
            },
            customer_id: self.customer_id,
            shipping_address: self.shipping_address.0,
            items: self.items.0,
            totals: OrderTotals {
                subtotal: self.subtotal,
                shipping_cost: self.shipping_cost,
                tax_amount: self.tax_amount,
                discount_amount: self.discount_amount,
                total_amount: self.total_amount,
            },
            payment_method: self.payment_method.parse().map_err(corrupt("orders"))?,
            payment_status: self.payment_status.parse().map_err(corrupt("orders"))?,
            status: self.status.parse().map_err(corrupt("orders"))?,
            notes: self.notes,
            tracking_number: self.tracking_number,
            estimated_delivery: self.estimated_delivery,
            delivered_at: self.delivered_at,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Outcome of [`insert_order_reserving`].
#[derive(Debug, Clone)]
pub enum OrderInsert {
    Created(Order),
    /// An order with the same idempotency key already existed; nothing was
    /// reserved or written.
    Existing(Order),
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order(pool: &PgPool, id: Uuid) -> Result<Option<Order>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(OrderRow::into_order).transpose()
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order_by_number(
    pool: &PgPool,
    order_number: &str,
) -> Result<Option<Order>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
    ))
    .bind(order_number)
    .fetch_optional(pool)
    .await?;

    row.map(OrderRow::into_order).transpose()
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order_by_idempotency_key(
    pool: &PgPool,
    key: &str,
) -> Result<Option<Order>, DbError> {
    let mut conn = pool.acquire().await?;
    fetch_by_idempotency_key(&mut *conn, key).await
}

/// Lists orders newest first, optionally restricted to one status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders(
    pool: &PgPool,
    status: Option<OrderStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Order>, DbError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE ($1::TEXT IS NULL OR status = $1) \
         ORDER BY created_at DESC, id \
         LIMIT $2 OFFSET $3"
    ))
    .bind(status.map(OrderStatus::as_str))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(OrderRow::into_order).collect()
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Reserves stock for every line and inserts the order, atomically.
///
/// When the order carries an idempotency key that is already taken, the
/// stored order is returned as [`OrderInsert::Existing`] instead.
///
/// # Errors
///
/// Returns [`DbError::InsufficientStock`] (with every short line) or
/// [`DbError::MissingVariant`] when the reservation is refused; nothing is
/// written in that case. Returns [`DbError::Sqlx`] on database failure,
/// including an `order_number` collision.
pub async fn insert_order_reserving(pool: &PgPool, order: &Order) -> Result<OrderInsert, DbError> {
    let mut tx = pool.begin().await?;

    if let Some(key) = &order.idempotency_key {
        if let Some(existing) = fetch_by_idempotency_key(&mut *tx, key).await? {
            return Ok(OrderInsert::Existing(existing));
        }
    }

    apply_in_tx(
        &mut *tx,
        StockOp::Reserve,
        &order.stock_lines(),
        Some(&order.order_number),
        order.created_at,
    )
    .await?;

    match insert_order(&mut *tx, order).await {
        Ok(()) => {}
        // A concurrent checkout with the same key won the race.
        Err(DbError::Sqlx(sqlx::Error::Database(db)))
            if db.constraint() == Some(IDEMPOTENCY_CONSTRAINT) =>
        {
            tx.rollback().await?;
            let key = order.idempotency_key.as_deref().unwrap_or_default();
            return get_order_by_idempotency_key(pool, key)
                .await?
                .map(OrderInsert::Existing)
                .ok_or(DbError::NotFound);
        }
        Err(e) => return Err(e),
    }

    tx.commit().await?;
    Ok(OrderInsert::Created(order.clone()))
}

/// Persists a status change made from `expected`, together with its stock
/// effect, atomically.
///
/// The write only applies if the stored status still equals `expected`.
///
/// # Errors
///
/// Returns [`DbError::StaleOrder`] if the stored status moved on,
/// [`DbError::MissingVariant`] if an order line's variant was never
/// provisioned, or [`DbError::Sqlx`] on database failure.
pub async fn update_order_status(
    pool: &PgPool,
    order: &Order,
    expected: OrderStatus,
    effect: Option<StockOp>,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE orders SET \
             status = $2, tracking_number = $3, estimated_delivery = $4, \
             delivered_at = $5, notes = $6, updated_at = $7 \
         WHERE id = $1 AND status = $8",
    )
    .bind(order.id)
    .bind(order.status.as_str())
    .bind(&order.tracking_number)
    .bind(order.estimated_delivery)
    .bind(order.delivered_at)
    .bind(&order.notes)
    .bind(order.updated_at)
    .bind(expected.as_str())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::StaleOrder {
            id: order.id,
            expected: expected.to_string(),
        });
    }

    if let Some(op) = effect {
        apply_in_tx(
            &mut *tx,
            op,
            &order.stock_lines(),
            Some(&order.order_number),
            order.updated_at,
        )
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Moves payment status from `expected` to `next`.
///
/// # Errors
///
/// Returns [`DbError::StaleOrder`] if the stored payment status is not
/// `expected`, or [`DbError::Sqlx`] on database failure.
pub async fn update_payment_status(
    pool: &PgPool,
    id: Uuid,
    expected: PaymentStatus,
    next: PaymentStatus,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE orders SET payment_status = $2, updated_at = NOW() \
         WHERE id = $1 AND payment_status = $3",
    )
    .bind(id)
    .bind(next.as_str())
    .bind(expected.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::StaleOrder {
            id,
            expected: expected.to_string(),
        });
    }

    Ok(())
}

async fn fetch_by_idempotency_key(
    conn: &mut PgConnection,
    key: &str,
) -> Result<Option<Order>, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE idempotency_key = $1"
    ))
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(OrderRow::into_order).transpose()
}

async fn insert_order(conn: &mut PgConnection, order: &Order) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO orders \
             (id, order_number, idempotency_key, customer_name, customer_phone, \
              customer_email, customer_id, shipping_address, items, subtotal, shipping_cost, \
              tax_amount, discount_amount, total_amount, payment_method, payment_status, \
              status, notes, tracking_number, estimated_delivery, delivered_at, \
              created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                 $17, $18, $19, $20, $21, $22, $23)",
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(&order.idempotency_key)
    .bind(&order.customer.name)
    .bind(&order.customer.phone)
    .bind(&order.customer.email)
    .bind(&order.customer_id)
    .bind(Json(&order.shipping_address))
    .bind(Json(&order.items))
    .bind(order.totals.subtotal)
    .bind(order.totals.shipping_cost)
    .bind(order.totals.tax_amount)
    .bind(order.totals.discount_amount)
    .bind(order.totals.total_amount)
    .bind(order.payment_method.as_str())
    .bind(order.payment_status.as_str())
    .bind(order.status.as_str())
    .bind(&order.notes)
    .bind(&order.tracking_number)
    .bind(order.estimated_delivery)
    .bind(order.delivered_at)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
