//! Inventory record rules shared by every store implementation.
//!
//! A record tracks absolute stock and the share of it promised to pending
//! orders. `reserved_quantity <= stock_quantity` holds after every mutation
//! defined here; available quantity is always derived, never stored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Identifies one stockable variant: a product in one size and one color.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantKey {
    pub product_id: Uuid,
    pub size: String,
    pub color_index: i32,
}

impl VariantKey {
    #[must_use]
    pub fn new(product_id: Uuid, size: impl Into<String>, color_index: i32) -> Self {
        Self {
            product_id,
            size: size.into(),
            color_index,
        }
    }
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / size {} / color #{}",
            self.product_id, self.size, self.color_index
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    #[serde(flatten)]
    pub key: VariantKey,
    pub stock_quantity: i32,
    pub reserved_quantity: i32,
    pub low_stock_threshold: i32,
    pub cost_per_unit: Option<Decimal>,
    pub last_updated: DateTime<Utc>,
    pub last_restocked: Option<DateTime<Utc>>,
}

impl InventoryRecord {
    /// A freshly provisioned record with nothing reserved.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for negative stock or threshold.
    pub fn provision(
        key: VariantKey,
        stock_quantity: i32,
        low_stock_threshold: i32,
        cost_per_unit: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        if stock_quantity < 0 {
            return Err(CoreError::Validation(format!(
                "stock quantity must be non-negative, got {stock_quantity}"
            )));
        }
        if low_stock_threshold < 0 {
            return Err(CoreError::Validation(format!(
                "low-stock threshold must be non-negative, got {low_stock_threshold}"
            )));
        }
        Ok(Self {
            key,
            stock_quantity,
            reserved_quantity: 0,
            low_stock_threshold,
            cost_per_unit,
            last_updated: now,
            last_restocked: None,
        })
    }

    /// Stock not promised to any order, clamped at zero.
    #[must_use]
    pub fn available(&self) -> i32 {
        (self.stock_quantity - self.reserved_quantity).max(0)
    }

    #[must_use]
    pub fn availability(&self, requested: i32) -> Availability {
        let available_qty = self.available();
        Availability {
            in_stock: available_qty > 0 && available_qty >= requested,
            available_qty,
        }
    }

    /// Reserves `qty` only if that many units are available.
    ///
    /// # Errors
    ///
    /// Returns the shortfall when fewer than `qty` units are available.
    pub fn try_reserve(&mut self, qty: i32, now: DateTime<Utc>) -> Result<(), Shortfall> {
        let available = self.available();
        if available < qty {
            return Err(Shortfall {
                key: self.key.clone(),
                requested: qty,
                available,
            });
        }
        self.reserved_quantity += qty;
        self.last_updated = now;
        Ok(())
    }

    /// Releases up to `qty` reserved units. Never drops below zero.
    pub fn release(&mut self, qty: i32, now: DateTime<Utc>) {
        self.reserved_quantity = (self.reserved_quantity - qty).max(0);
        self.last_updated = now;
    }

    /// Sets absolute stock and returns the signed delta.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if `qty` is negative or below the
    /// currently reserved quantity.
    pub fn set_stock(&mut self, qty: i32, now: DateTime<Utc>) -> Result<i32, CoreError> {
        if qty < 0 {
            return Err(CoreError::Validation(format!(
                "stock quantity must be non-negative, got {qty}"
            )));
        }
        if qty < self.reserved_quantity {
            return Err(CoreError::Validation(format!(
                "cannot set stock to {qty} while {} units are reserved",
                self.reserved_quantity
            )));
        }
        let delta = qty - self.stock_quantity;
        self.stock_quantity = qty;
        self.last_updated = now;
        Ok(delta)
    }

    /// Adds delivered units, optionally updating unit cost.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the new stock would not fit in
    /// an `i32`. The record is unchanged on error.
    pub fn restock(
        &mut self,
        qty: i32,
        cost_per_unit: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.stock_quantity = self.stock_after_restock(qty)?;
        if cost_per_unit.is_some() {
            self.cost_per_unit = cost_per_unit;
        }
        self.last_updated = now;
        self.last_restocked = Some(now);
        Ok(())
    }

    fn stock_after_restock(&self, qty: i32) -> Result<i32, CoreError> {
        self.stock_quantity.checked_add(qty).ok_or_else(|| {
            CoreError::Validation(format!(
                "restocking {qty} units of {} overflows its stock of {}",
                self.key, self.stock_quantity
            ))
        })
    }

    /// Converts a reservation into a shipped sale: both stock and reserved
    /// drop by `qty`. Returns the units actually removed from stock.
    pub fn commit_sale(&mut self, qty: i32, now: DateTime<Utc>) -> i32 {
        let removed = qty.min(self.stock_quantity).max(0);
        self.stock_quantity -= removed;
        self.reserved_quantity = (self.reserved_quantity - qty).max(0).min(self.stock_quantity);
        self.last_updated = now;
        removed
    }

    /// Alert tier for this record, if its stock is at or below threshold.
    #[must_use]
    pub fn alert(&self) -> Option<InventoryAlert> {
        let severity = AlertSeverity::classify(self.stock_quantity, self.low_stock_threshold)?;
        Some(InventoryAlert {
            key: self.key.clone(),
            stock_quantity: self.stock_quantity,
            reserved_quantity: self.reserved_quantity,
            low_stock_threshold: self.low_stock_threshold,
            severity,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub in_stock: bool,
    pub available_qty: i32,
}

/// One variant and a quantity, as used by reserve and release batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    #[serde(flatten)]
    pub key: VariantKey,
    pub quantity: i32,
}

impl StockLine {
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] unless `quantity` is positive.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.quantity <= 0 {
            return Err(CoreError::Validation(format!(
                "quantity for {} must be positive, got {}",
                self.key, self.quantity
            )));
        }
        Ok(())
    }
}

/// A line that could not be reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    #[serde(flatten)]
    pub key: VariantKey,
    pub requested: i32,
    pub available: i32,
}

impl std::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: requested {}, only {} available",
            self.key, self.requested, self.available
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    OutOfStock,
    Critical,
    Low,
}

impl AlertSeverity {
    /// `out_of_stock` at zero, `critical` at or below half the threshold,
    /// `low` at or below the threshold; `None` above it.
    #[must_use]
    pub fn classify(stock_quantity: i32, threshold: i32) -> Option<Self> {
        if stock_quantity <= 0 {
            Some(Self::OutOfStock)
        } else if stock_quantity > threshold {
            None
        } else if i64::from(stock_quantity) * 2 <= i64::from(threshold) {
            Some(Self::Critical)
        } else {
            Some(Self::Low)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAlert {
    #[serde(flatten)]
    pub key: VariantKey,
    pub stock_quantity: i32,
    pub reserved_quantity: i32,
    pub low_stock_threshold: i32,
    pub severity: AlertSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Adjustment,
    Restock,
    Sale,
    Return,
    CancelRestock,
}

impl MovementKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::Adjustment => "adjustment",
            MovementKind::Restock => "restock",
            MovementKind::Sale => "sale",
            MovementKind::Return => "return",
            MovementKind::CancelRestock => "cancel_restock",
        }
    }
}

impl std::str::FromStr for MovementKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adjustment" => Ok(Self::Adjustment),
            "restock" => Ok(Self::Restock),
            "sale" => Ok(Self::Sale),
            "return" => Ok(Self::Return),
            "cancel_restock" => Ok(Self::CancelRestock),
            _ => Err(CoreError::UnknownValue {
                kind: "movement kind",
                value: s.to_string(),
            }),
        }
    }
}

/// Append-only audit entry for a change in absolute stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    #[serde(flatten)]
    pub key: VariantKey,
    pub delta: i32,
    pub kind: MovementKind,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A stock change applied to a whole batch of lines at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum StockOp {
    Reserve,
    Release,
    /// Shipment: reserved units leave stock.
    CommitSale,
    Restock {
        cost_per_unit: Option<Decimal>,
    },
    /// Delivered goods sent back by the customer.
    Return,
    /// Shipped order cancelled; the goods come back to the shelf.
    CancelRestock,
}

impl StockOp {
    /// Movement-log kind for ops that change absolute stock.
    #[must_use]
    pub fn movement_kind(self) -> Option<MovementKind> {
        match self {
            StockOp::Reserve | StockOp::Release => None,
            StockOp::CommitSale => Some(MovementKind::Sale),
            StockOp::Restock { .. } => Some(MovementKind::Restock),
            StockOp::Return => Some(MovementKind::Return),
            StockOp::CancelRestock => Some(MovementKind::CancelRestock),
        }
    }
}

/// Why a batch was refused. Nothing in the batch was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchRejection {
    Missing(VariantKey),
    Insufficient(Vec<Shortfall>),
    /// A line the records cannot absorb, such as stock overflow.
    Invalid(CoreError),
}

impl From<CoreError> for BatchRejection {
    fn from(err: CoreError) -> Self {
        BatchRejection::Invalid(err)
    }
}

/// One delivered quantity, with the unit cost it arrived at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockEntry {
    #[serde(flatten)]
    pub key: VariantKey,
    pub quantity: i32,
    #[serde(default)]
    pub cost_per_unit: Option<Decimal>,
}

/// Validates lines, sums duplicate variants and returns them in key order.
///
/// Key order doubles as the row-lock order for stores that lock.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] for non-positive quantities, negative
/// color indexes, or a summed quantity that overflows.
pub fn merge_lines(lines: &[StockLine]) -> Result<Vec<StockLine>, CoreError> {
    let mut merged: BTreeMap<VariantKey, i32> = BTreeMap::new();
    for line in lines {
        line.validate()?;
        if line.key.color_index < 0 {
            return Err(CoreError::Validation(format!(
                "color index must be non-negative, got {}",
                line.key.color_index
            )));
        }
        let qty = merged.entry(line.key.clone()).or_insert(0);
        *qty = qty.checked_add(line.quantity).ok_or_else(|| {
            CoreError::Validation(format!("quantity for {} overflows", line.key))
        })?;
    }
    Ok(merged
        .into_iter()
        .map(|(key, quantity)| StockLine { key, quantity })
        .collect())
}

/// Applies `op` to every line, all-or-nothing.
///
/// `lines` should come from [`merge_lines`]. Returns the movement-log entries
/// for ops that change absolute stock.
///
/// # Errors
///
/// Returns [`BatchRejection::Missing`] for the first unprovisioned variant, or
/// [`BatchRejection::Insufficient`] listing every line a reservation cannot
/// cover. `records` is untouched on error.
pub fn apply_batch(
    records: &mut BTreeMap<VariantKey, InventoryRecord>,
    op: StockOp,
    lines: &[StockLine],
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<StockMovement>, BatchRejection> {
    if let Some(line) = lines.iter().find(|l| !records.contains_key(&l.key)) {
        return Err(BatchRejection::Missing(line.key.clone()));
    }

    if op == StockOp::Reserve {
        let shortfalls: Vec<Shortfall> = lines
            .iter()
            .filter_map(|line| {
                let available = records.get(&line.key).map_or(0, InventoryRecord::available);
                (available < line.quantity).then(|| Shortfall {
                    key: line.key.clone(),
                    requested: line.quantity,
                    available,
                })
            })
            .collect();
        if !shortfalls.is_empty() {
            return Err(BatchRejection::Insufficient(shortfalls));
        }
    }

    if matches!(
        op,
        StockOp::Restock { .. } | StockOp::Return | StockOp::CancelRestock
    ) {
        for line in lines {
            if let Some(record) = records.get(&line.key) {
                record.stock_after_restock(line.quantity)?;
            }
        }
    }

    let mut movements = Vec::new();
    for line in lines {
        let Some(record) = records.get_mut(&line.key) else {
            continue;
        };
        let delta = match op {
            StockOp::Reserve => {
                record
                    .try_reserve(line.quantity, now)
                    .map_err(|s| BatchRejection::Insufficient(vec![s]))?;
                0
            }
            StockOp::Release => {
                record.release(line.quantity, now);
                0
            }
            StockOp::CommitSale => -record.commit_sale(line.quantity, now),
            StockOp::Restock { cost_per_unit } => {
                record.restock(line.quantity, cost_per_unit, now)?;
                line.quantity
            }
            StockOp::Return | StockOp::CancelRestock => {
                record.restock(line.quantity, None, now)?;
                line.quantity
            }
        };
        if let Some(kind) = op.movement_kind().filter(|_| delta != 0) {
            movements.push(StockMovement {
                key: line.key.clone(),
                delta,
                kind,
                reason: reason.map(str::to_string),
                created_at: now,
            });
        }
    }
    Ok(movements)
}

/// Validates restock entries and sums duplicate variants, in key order.
///
/// When a variant appears more than once, the last given unit cost wins.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] for non-positive quantities, negative
/// color indexes or unit costs, or a summed quantity that overflows.
pub fn merge_restock(entries: &[RestockEntry]) -> Result<Vec<RestockEntry>, CoreError> {
    let mut merged: BTreeMap<VariantKey, (i32, Option<Decimal>)> = BTreeMap::new();
    for entry in entries {
        StockLine {
            key: entry.key.clone(),
            quantity: entry.quantity,
        }
        .validate()?;
        if entry.key.color_index < 0 {
            return Err(CoreError::Validation(format!(
                "color index must be non-negative, got {}",
                entry.key.color_index
            )));
        }
        if entry.cost_per_unit.is_some_and(|c| c.is_sign_negative()) {
            return Err(CoreError::Validation(format!(
                "cost per unit for {} must be non-negative",
                entry.key
            )));
        }
        let (qty, cost) = merged.entry(entry.key.clone()).or_insert((0, None));
        *qty = qty.checked_add(entry.quantity).ok_or_else(|| {
            CoreError::Validation(format!("quantity for {} overflows", entry.key))
        })?;
        if entry.cost_per_unit.is_some() {
            *cost = entry.cost_per_unit;
        }
    }
    Ok(merged
        .into_iter()
        .map(|(key, (quantity, cost_per_unit))| RestockEntry {
            key,
            quantity,
            cost_per_unit,
        })
        .collect())
}

/// Restocks every entry at its own unit cost, all-or-nothing.
///
/// `entries` should come from [`merge_restock`].
///
/// # Errors
///
/// Returns [`BatchRejection::Missing`] for the first unprovisioned variant or
/// [`BatchRejection::Invalid`] if any entry would overflow its stock.
/// `records` is untouched on error.
pub fn apply_restock(
    records: &mut BTreeMap<VariantKey, InventoryRecord>,
    entries: &[RestockEntry],
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<StockMovement>, BatchRejection> {
    for entry in entries {
        let record = records
            .get(&entry.key)
            .ok_or_else(|| BatchRejection::Missing(entry.key.clone()))?;
        record.stock_after_restock(entry.quantity)?;
    }

    let mut movements = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(record) = records.get_mut(&entry.key) {
            record.restock(entry.quantity, entry.cost_per_unit, now)?;
            movements.push(StockMovement {
                key: entry.key.clone(),
                delta: entry.quantity,
                kind: MovementKind::Restock,
                reason: reason.map(str::to_string),
                created_at: now,
            });
        }
    }
    Ok(movements)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(stock: i32, reserved: i32, threshold: i32) -> InventoryRecord {
        let mut r = InventoryRecord::provision(
            VariantKey::new(Uuid::new_v4(), "4T", 0),
            stock,
            threshold,
            None,
            Utc::now(),
        )
        .expect("provision");
        r.reserved_quantity = reserved;
        r
    }

    #[test]
    fn reserve_beyond_available_is_rejected() {
        let mut r = record(5, 0, 3);
        r.try_reserve(3, Utc::now()).expect("first reservation");
        assert_eq!(r.reserved_quantity, 3);
        assert_eq!(r.available(), 2);

        let shortfall = r.try_reserve(3, Utc::now()).unwrap_err();
        assert_eq!(shortfall.requested, 3);
        assert_eq!(shortfall.available, 2);
        assert_eq!(r.reserved_quantity, 3);
        assert_eq!(r.available(), 2);
    }

    #[test]
    fn release_clamps_at_zero() {
        let mut r = record(5, 2, 3);
        r.release(2, Utc::now());
        r.release(2, Utc::now());
        assert_eq!(r.reserved_quantity, 0);
    }

    #[test]
    fn available_is_clamped_for_anomalous_rows() {
        let r = record(2, 5, 3);
        assert_eq!(r.available(), 0);
        assert_eq!(
            r.availability(1),
            Availability {
                in_stock: false,
                available_qty: 0
            }
        );
    }

    #[test]
    fn set_stock_below_reserved_is_rejected() {
        let mut r = record(10, 4, 3);
        assert!(r.set_stock(3, Utc::now()).is_err());
        assert_eq!(r.set_stock(4, Utc::now()), Ok(-6));
        assert!(r.set_stock(-1, Utc::now()).is_err());
    }

    #[test]
    fn restock_then_reset_returns_to_prior_state() {
        let mut r = record(7, 2, 3);
        let before = r.available();
        r.restock(5, Some(Decimal::new(1250, 2)), Utc::now())
            .expect("restock");
        assert_eq!(r.stock_quantity, 12);
        assert!(r.last_restocked.is_some());
        assert_eq!(r.cost_per_unit, Some(Decimal::new(1250, 2)));
        r.set_stock(7, Utc::now()).expect("reset");
        assert_eq!(r.available(), before);
    }

    #[test]
    fn commit_sale_moves_reserved_out_of_stock() {
        let mut r = record(5, 2, 1);
        assert_eq!(r.commit_sale(2, Utc::now()), 2);
        assert_eq!(r.stock_quantity, 3);
        assert_eq!(r.reserved_quantity, 0);
        assert_eq!(r.available(), 3);
    }

    #[test]
    fn alert_tiers() {
        assert_eq!(AlertSeverity::classify(0, 5), Some(AlertSeverity::OutOfStock));
        assert_eq!(AlertSeverity::classify(2, 5), Some(AlertSeverity::Critical));
        assert_eq!(AlertSeverity::classify(3, 5), Some(AlertSeverity::Low));
        assert_eq!(AlertSeverity::classify(5, 5), Some(AlertSeverity::Low));
        assert_eq!(AlertSeverity::classify(6, 5), None);
        assert_eq!(AlertSeverity::classify(0, 0), Some(AlertSeverity::OutOfStock));
        assert_eq!(AlertSeverity::classify(1, 0), None);
    }

    #[test]
    fn stock_line_requires_positive_quantity() {
        let line = StockLine {
            key: VariantKey::new(Uuid::new_v4(), "S", 0),
            quantity: 0,
        };
        assert!(line.validate().is_err());
    }

    #[test]
    fn invariant_holds_across_mixed_operation_sequences() {
        let mut r = record(6, 0, 2);
        let now = Utc::now();
        let ops: [(u8, i32); 12] = [
            (0, 4),
            (0, 3),
            (1, 1),
            (2, 2),
            (0, 5),
            (3, 3),
            (1, 10),
            (2, 9),
            (0, 9),
            (4, 4),
            (2, 0),
            (0, 1),
        ];
        for (op, qty) in ops {
            match op {
                0 => {
                    let _ = r.try_reserve(qty, now);
                }
                1 => r.release(qty, now),
                2 => {
                    let _ = r.set_stock(qty, now);
                }
                3 => r.restock(qty, None, now).expect("restock"),
                _ => {
                    r.commit_sale(qty, now);
                }
            }
            assert!(r.reserved_quantity >= 0);
            assert!(r.reserved_quantity <= r.stock_quantity, "after op {op}/{qty}: {r:?}");
        }
    }

    fn ledger(records: &[InventoryRecord]) -> BTreeMap<VariantKey, InventoryRecord> {
        records.iter().map(|r| (r.key.clone(), r.clone())).collect()
    }

    #[test]
    fn merge_lines_sums_duplicates_in_key_order() {
        let id = Uuid::new_v4();
        let lines = vec![
            StockLine {
                key: VariantKey::new(id, "4T", 1),
                quantity: 1,
            },
            StockLine {
                key: VariantKey::new(id, "2T", 0),
                quantity: 2,
            },
            StockLine {
                key: VariantKey::new(id, "4T", 1),
                quantity: 3,
            },
        ];
        let merged = merge_lines(&lines).expect("valid lines");
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].key.size, "2T");
        assert_eq!(merged[1].quantity, 4);
    }

    #[test]
    fn batch_reserve_is_all_or_nothing() {
        let a = record(5, 0, 2);
        let b = record(1, 0, 2);
        let mut records = ledger(&[a.clone(), b.clone()]);
        let lines = merge_lines(&[
            StockLine {
                key: a.key.clone(),
                quantity: 3,
            },
            StockLine {
                key: b.key.clone(),
                quantity: 2,
            },
        ])
        .expect("valid lines");

        let err = apply_batch(&mut records, StockOp::Reserve, &lines, None, Utc::now())
            .unwrap_err();
        let BatchRejection::Insufficient(shortfalls) = err else {
            panic!("expected shortfall, got {err:?}");
        };
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].key, b.key);
        assert_eq!(shortfalls[0].available, 1);
        assert_eq!(records[&a.key].reserved_quantity, 0);
        assert_eq!(records[&b.key].reserved_quantity, 0);
    }

    #[test]
    fn batch_with_unprovisioned_variant_is_rejected() {
        let a = record(5, 0, 2);
        let mut records = ledger(std::slice::from_ref(&a));
        let ghost = VariantKey::new(Uuid::new_v4(), "XL", 0);
        let lines = vec![
            StockLine {
                key: a.key.clone(),
                quantity: 1,
            },
            StockLine {
                key: ghost.clone(),
                quantity: 1,
            },
        ];
        assert_eq!(
            apply_batch(&mut records, StockOp::Release, &lines, None, Utc::now()),
            Err(BatchRejection::Missing(ghost))
        );
    }

    #[test]
    fn stock_changing_ops_log_movements() {
        let a = record(5, 2, 2);
        let mut records = ledger(std::slice::from_ref(&a));
        let lines = vec![StockLine {
            key: a.key.clone(),
            quantity: 2,
        }];

        let sale = apply_batch(&mut records, StockOp::CommitSale, &lines, Some("KW-1"), Utc::now())
            .expect("commit");
        assert_eq!(sale.len(), 1);
        assert_eq!(sale[0].delta, -2);
        assert_eq!(sale[0].kind, MovementKind::Sale);
        assert_eq!(records[&a.key].stock_quantity, 3);

        let back = apply_batch(&mut records, StockOp::Return, &lines, None, Utc::now())
            .expect("return");
        assert_eq!(back[0].delta, 2);
        assert_eq!(records[&a.key].stock_quantity, 5);

        let quiet = apply_batch(&mut records, StockOp::Release, &lines, None, Utc::now())
            .expect("release");
        assert!(quiet.is_empty());
    }

    #[test]
    fn randomized_sequences_keep_reserved_within_stock() {
        use rand::Rng;

        let mut rng = rand::rng();
        for _ in 0..200 {
            let mut r = record(rng.random_range(0..20), 0, 3);
            let now = Utc::now();
            for _ in 0..40 {
                let qty = rng.random_range(0..12);
                match rng.random_range(0..5) {
                    0 => {
                        let _ = r.try_reserve(qty, now);
                    }
                    1 => r.release(qty, now),
                    2 => {
                        let _ = r.set_stock(qty, now);
                    }
                    3 => r.restock(qty, None, now).expect("restock"),
                    _ => {
                        r.commit_sale(qty, now);
                    }
                }
                assert!(r.reserved_quantity >= 0, "{r:?}");
                assert!(r.reserved_quantity <= r.stock_quantity, "{r:?}");
                assert!(r.available() >= 0);
            }
        }
    }

    #[test]
    fn restock_past_i32_max_leaves_the_record_unchanged() {
        let mut r = record(5, 1, 2);
        let err = r.restock(i32::MAX, None, Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(r.stock_quantity, 5);
        assert!(r.last_restocked.is_none());
    }

    #[test]
    fn overflowing_return_rejects_the_whole_batch() {
        let a = record(5, 0, 2);
        let b = record(i32::MAX - 1, 0, 2);
        let mut records = ledger(&[a.clone(), b.clone()]);
        let lines = merge_lines(&[
            StockLine {
                key: a.key.clone(),
                quantity: 3,
            },
            StockLine {
                key: b.key.clone(),
                quantity: 2,
            },
        ])
        .expect("valid lines");

        let err = apply_batch(&mut records, StockOp::Return, &lines, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, BatchRejection::Invalid(CoreError::Validation(_))));
        assert_eq!(records[&a.key].stock_quantity, 5);
        assert_eq!(records[&b.key].stock_quantity, i32::MAX - 1);
    }

    #[test]
    fn restock_entries_keep_their_own_unit_cost() {
        let a = record(5, 0, 2);
        let b = record(1, 0, 2);
        let mut records = ledger(&[a.clone(), b.clone()]);
        let entries = merge_restock(&[
            RestockEntry {
                key: a.key.clone(),
                quantity: 4,
                cost_per_unit: Some(Decimal::new(1200, 2)),
            },
            RestockEntry {
                key: b.key.clone(),
                quantity: 6,
                cost_per_unit: Some(Decimal::new(3450, 2)),
            },
            RestockEntry {
                key: a.key.clone(),
                quantity: 1,
                cost_per_unit: None,
            },
        ])
        .expect("valid entries");
        assert_eq!(entries.len(), 2);

        let movements =
            apply_restock(&mut records, &entries, Some("restock"), Utc::now()).expect("restock");
        assert_eq!(movements.len(), 2);
        assert_eq!(records[&a.key].stock_quantity, 10);
        assert_eq!(records[&a.key].cost_per_unit, Some(Decimal::new(1200, 2)));
        assert_eq!(records[&b.key].stock_quantity, 7);
        assert_eq!(records[&b.key].cost_per_unit, Some(Decimal::new(3450, 2)));
    }

    #[test]
    fn restock_with_one_overflowing_entry_applies_nothing() {
        let a = record(5, 0, 2);
        let b = record(10, 0, 2);
        let mut records = ledger(&[a.clone(), b.clone()]);
        let entries = merge_restock(&[
            RestockEntry {
                key: a.key.clone(),
                quantity: 4,
                cost_per_unit: Some(Decimal::ONE),
            },
            RestockEntry {
                key: b.key.clone(),
                quantity: i32::MAX,
                cost_per_unit: None,
            },
        ])
        .expect("valid entries");

        let err = apply_restock(&mut records, &entries, None, Utc::now()).unwrap_err();
        assert!(matches!(err, BatchRejection::Invalid(_)));
        assert_eq!(records[&a.key].stock_quantity, 5);
        assert_eq!(records[&a.key].cost_per_unit, None);
        assert_eq!(records[&b.key].stock_quantity, 10);
    }

    #[test]
    fn negative_unit_cost_is_rejected_before_merging() {
        let entry = RestockEntry {
            key: VariantKey::new(Uuid::new_v4(), "4T", 0),
            quantity: 1,
            cost_per_unit: Some(Decimal::NEGATIVE_ONE),
        };
        assert!(merge_restock(&[entry]).is_err());
    }
}
