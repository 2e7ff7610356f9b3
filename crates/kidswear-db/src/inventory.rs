//! Database operations for `inventory` and `stock_movements`.
//!
//! Every mutation locks the affected rows with `SELECT ... FOR UPDATE` in
//! variant-key order, applies the shared record rules from `kidswear-core`
//! in memory, and writes the result back inside the same transaction.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use kidswear_core::{
    apply_batch, apply_restock, merge_lines, merge_restock, BatchRejection, InventoryRecord,
    MovementKind, RestockEntry, StockLine, StockMovement, StockOp, VariantKey,
};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{corrupt, DbError};

const INVENTORY_COLUMNS: &str = "id, product_id, size, color_index, stock_quantity, \
     reserved_quantity, low_stock_threshold, cost_per_unit, last_updated, last_restocked";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `inventory` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InventoryRow {
    pub id: i64,
    pub product_id: Uuid,
    pub size: String,
    pub color_index: i32,
    pub stock_quantity: i32,
    pub reserved_quantity: i32,
    pub low_stock_threshold: i32,
    pub cost_per_unit: Option<Decimal>,
    pub last_updated: DateTime<Utc>,
    pub last_restocked: Option<DateTime<Utc>>,
}

impl From<InventoryRow> for InventoryRecord {
    fn from(row: InventoryRow) -> Self {
        InventoryRecord {
            key: VariantKey::new(row.product_id, row.size, row.color_index),
            stock_quantity: row.stock_quantity,
            reserved_quantity: row.reserved_quantity,
            low_stock_threshold: row.low_stock_threshold,
            cost_per_unit: row.cost_per_unit,
            last_updated: row.last_updated,
            last_restocked: row.last_restocked,
        }
    }
}

/// A row from the `stock_movements` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MovementRow {
    pub id: i64,
    pub product_id: Uuid,
    pub size: String,
    pub color_index: i32,
    pub delta: i32,
    pub kind: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MovementRow {
    /// # Errors
    ///
    /// Returns [`DbError::CorruptRow`] if the stored kind is unknown.
    pub fn into_movement(self) -> Result<StockMovement, DbError> {
        let kind: MovementKind = self.kind.parse().map_err(corrupt("stock_movements"))?;
        Ok(StockMovement {
            key: VariantKey::new(self.product_id, self.size, self.color_index),
            delta: self.delta,
            kind,
            reason: self.reason,
            created_at: self.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fetches the record for one variant.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_inventory(
    pool: &PgPool,
    key: &VariantKey,
) -> Result<Option<InventoryRecord>, DbError> {
    let row = sqlx::query_as::<_, InventoryRow>(&format!(
        "SELECT {INVENTORY_COLUMNS} FROM inventory \
         WHERE product_id = $1 AND size = $2 AND color_index = $3"
    ))
    .bind(key.product_id)
    .bind(&key.size)
    .bind(key.color_index)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(InventoryRecord::from))
}

/// Records whose stock is at or below their low-stock threshold.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_inventory_at_or_below_threshold(
    pool: &PgPool,
) -> Result<Vec<InventoryRecord>, DbError> {
    let rows = sqlx::query_as::<_, InventoryRow>(&format!(
        "SELECT {INVENTORY_COLUMNS} FROM inventory \
         WHERE stock_quantity <= low_stock_threshold \
         ORDER BY stock_quantity, product_id, size, color_index"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(InventoryRecord::from).collect())
}

/// Available units per product, summed across variants and clamped at zero
/// per variant.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn available_by_product(pool: &PgPool) -> Result<HashMap<Uuid, i64>, DbError> {
    let rows = sqlx::query_as::<_, (Uuid, i64)>(
        "SELECT product_id, \
                COALESCE(SUM(GREATEST(stock_quantity - reserved_quantity, 0)), 0)::BIGINT \
         FROM inventory GROUP BY product_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Most recent movements for one variant, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_movements(
    pool: &PgPool,
    key: &VariantKey,
    limit: i64,
) -> Result<Vec<StockMovement>, DbError> {
    let rows = sqlx::query_as::<_, MovementRow>(
        "SELECT id, product_id, size, color_index, delta, kind, reason, created_at \
         FROM stock_movements \
         WHERE product_id = $1 AND size = $2 AND color_index = $3 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $4",
    )
    .bind(key.product_id)
    .bind(&key.size)
    .bind(key.color_index)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(MovementRow::into_movement).collect()
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Creates the record for a variant that has never been stocked.
///
/// # Errors
///
/// Returns [`DbError::VariantExists`] if the variant already has a record,
/// or [`DbError::Sqlx`] if the insert fails (including an unknown product).
pub async fn provision_inventory(
    pool: &PgPool,
    record: &InventoryRecord,
) -> Result<InventoryRecord, DbError> {
    let mut conn = pool.acquire().await?;
    provision_on(&mut *conn, record)
        .await?
        .ok_or_else(|| DbError::VariantExists(record.key.clone()))
}

/// Inserts the record unless the variant already has one.
pub(crate) async fn provision_on(
    conn: &mut PgConnection,
    record: &InventoryRecord,
) -> Result<Option<InventoryRecord>, DbError> {
    let row = sqlx::query_as::<_, InventoryRow>(&format!(
        "INSERT INTO inventory \
             (product_id, size, color_index, stock_quantity, reserved_quantity, \
              low_stock_threshold, cost_per_unit, last_updated) \
         VALUES ($1, $2, $3, $4, 0, $5, $6, $7) \
         ON CONFLICT (product_id, size, color_index) DO NOTHING \
         RETURNING {INVENTORY_COLUMNS}"
    ))
    .bind(record.key.product_id)
    .bind(&record.key.size)
    .bind(record.key.color_index)
    .bind(record.stock_quantity)
    .bind(record.low_stock_threshold)
    .bind(record.cost_per_unit)
    .bind(record.last_updated)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(InventoryRecord::from))
}

/// Applies a batch stock operation in its own transaction, all-or-nothing.
///
/// Returns the updated records in variant-key order.
///
/// # Errors
///
/// Returns [`DbError::MissingVariant`] or [`DbError::InsufficientStock`] when
/// the batch is refused (nothing is written), [`DbError::Rejected`] for
/// malformed lines, or [`DbError::Sqlx`] on database failure.
pub async fn apply_stock_op(
    pool: &PgPool,
    op: StockOp,
    lines: &[StockLine],
    reason: Option<&str>,
) -> Result<Vec<InventoryRecord>, DbError> {
    let mut tx = pool.begin().await?;
    let records = apply_in_tx(&mut *tx, op, lines, reason, Utc::now()).await?;
    tx.commit().await?;
    Ok(records)
}

/// Restocks every entry at its own unit cost in one transaction.
///
/// Returns the updated records in variant-key order.
///
/// # Errors
///
/// Returns [`DbError::MissingVariant`] for an unprovisioned variant,
/// [`DbError::Rejected`] for malformed entries or a stock overflow (nothing
/// is written), or [`DbError::Sqlx`] on database failure.
pub async fn restock_entries(
    pool: &PgPool,
    entries: &[RestockEntry],
    reason: Option<&str>,
) -> Result<Vec<InventoryRecord>, DbError> {
    let entries = merge_restock(entries)?;
    let mut tx = pool.begin().await?;

    let mut records = BTreeMap::new();
    for entry in &entries {
        match lock_one(&mut *tx, &entry.key).await? {
            Some(record) => {
                records.insert(entry.key.clone(), record);
            }
            None => return Err(DbError::MissingVariant(entry.key.clone())),
        }
    }

    let movements =
        apply_restock(&mut records, &entries, reason, Utc::now()).map_err(rejection_to_db)?;
    for record in records.values() {
        write_record(&mut *tx, record).await?;
    }
    insert_movements(&mut *tx, &movements).await?;
    tx.commit().await?;

    Ok(records.into_values().collect())
}

/// Sets the absolute stock of one variant and logs the delta.
///
/// # Errors
///
/// Returns [`DbError::MissingVariant`] for an unprovisioned variant,
/// [`DbError::Rejected`] if the new quantity is negative or below the
/// reserved quantity, or [`DbError::Sqlx`] on database failure.
pub async fn set_stock(
    pool: &PgPool,
    key: &VariantKey,
    quantity: i32,
    reason: Option<&str>,
) -> Result<(InventoryRecord, Option<StockMovement>), DbError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let mut record = lock_one(&mut *tx, key)
        .await?
        .ok_or_else(|| DbError::MissingVariant(key.clone()))?;
    let delta = record.set_stock(quantity, now)?;
    write_record(&mut *tx, &record).await?;

    let movement = (delta != 0).then(|| StockMovement {
        key: key.clone(),
        delta,
        kind: MovementKind::Adjustment,
        reason: reason.map(str::to_string),
        created_at: now,
    });
    if let Some(m) = &movement {
        insert_movements(&mut *tx, std::slice::from_ref(m)).await?;
    }

    tx.commit().await?;
    Ok((record, movement))
}

// ---------------------------------------------------------------------------
// Transaction building blocks, shared with order writes
// ---------------------------------------------------------------------------

pub(crate) async fn apply_in_tx(
    conn: &mut PgConnection,
    op: StockOp,
    lines: &[StockLine],
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<InventoryRecord>, DbError> {
    let lines = merge_lines(lines)?;

    let mut records = BTreeMap::new();
    for line in &lines {
        match lock_one(conn, &line.key).await? {
            Some(record) => {
                records.insert(line.key.clone(), record);
            }
            None => return Err(DbError::MissingVariant(line.key.clone())),
        }
    }

    let movements = apply_batch(&mut records, op, &lines, reason, now).map_err(rejection_to_db)?;

    for record in records.values() {
        write_record(conn, record).await?;
    }
    insert_movements(conn, &movements).await?;

    Ok(records.into_values().collect())
}

fn rejection_to_db(rejection: BatchRejection) -> DbError {
    match rejection {
        BatchRejection::Missing(key) => DbError::MissingVariant(key),
        BatchRejection::Insufficient(shortfalls) => DbError::InsufficientStock(shortfalls),
        BatchRejection::Invalid(err) => DbError::Rejected(err),
    }
}

async fn lock_one(
    conn: &mut PgConnection,
    key: &VariantKey,
) -> Result<Option<InventoryRecord>, DbError> {
    let row = sqlx::query_as::<_, InventoryRow>(&format!(
        "SELECT {INVENTORY_COLUMNS} FROM inventory \
         WHERE product_id = $1 AND size = $2 AND color_index = $3 \
         FOR UPDATE"
    ))
    .bind(key.product_id)
    .bind(&key.size)
    .bind(key.color_index)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(InventoryRecord::from))
}

async fn write_record(conn: &mut PgConnection, record: &InventoryRecord) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE inventory SET \
             stock_quantity = $4, reserved_quantity = $5, cost_per_unit = $6, \
             last_updated = $7, last_restocked = $8 \
         WHERE product_id = $1 AND size = $2 AND color_index = $3",
    )
    .bind(record.key.product_id)
    .bind(&record.key.size)
    .bind(record.key.color_index)
    .bind(record.stock_quantity)
    .bind(record.reserved_quantity)
    .bind(record.cost_per_unit)
    .bind(record.last_updated)
    .bind(record.last_restocked)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_movements(
    conn: &mut PgConnection,
    movements: &[StockMovement],
) -> Result<(), DbError> {
    for m in movements {
        sqlx::query(
            "INSERT INTO stock_movements \
                 (product_id, size, color_index, delta, kind, reason, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(m.key.product_id)
        .bind(&m.key.size)
        .bind(m.key.color_index)
        .bind(m.delta)
        .bind(m.kind.as_str())
        .bind(&m.reason)
        .bind(m.created_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
