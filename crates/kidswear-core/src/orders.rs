use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inventory::{StockLine, VariantKey};
use crate::CoreError;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{6,18}[0-9]$").expect("valid phone regex"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

// ---------------------------------------------------------------------------
// Status machines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }

    /// Position on the happy path, `None` for cancelled/returned.
    fn step(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Processing => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled | OrderStatus::Returned => None,
        }
    }

    /// States from which the order can still be cancelled.
    #[must_use]
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::Confirmed
                | OrderStatus::Processing
                | OrderStatus::Shipped
        )
    }

    /// Whether the order's reserved stock has already left the warehouse.
    #[must_use]
    pub fn has_shipped(self) -> bool {
        matches!(
            self,
            OrderStatus::Shipped | OrderStatus::Delivered | OrderStatus::Returned
        )
    }

    /// Transition table.
    ///
    /// Forward moves up to `shipped` may skip steps; `delivered` only follows
    /// `shipped`; `cancelled` follows any cancellable state; `returned` only
    /// follows `delivered`.
    #[must_use]
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        match next {
            OrderStatus::Cancelled => self.is_cancellable(),
            OrderStatus::Returned => self == OrderStatus::Delivered,
            OrderStatus::Delivered => self == OrderStatus::Shipped,
            _ => match (self.step(), next.step()) {
                (Some(from), Some(to)) => to > from && from < 3,
                _ => false,
            },
        }
    }

    /// # Errors
    ///
    /// Returns [`CoreError::IllegalTransition`] when the table forbids the move.
    pub fn transition(self, next: OrderStatus) -> Result<OrderStatus, CoreError> {
        if self == next || self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::IllegalTransition {
                kind: "order status",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "returned" => Ok(OrderStatus::Returned),
            _ => Err(CoreError::UnknownValue {
                kind: "order status",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// # Errors
    ///
    /// Returns [`CoreError::IllegalTransition`] unless the move is
    /// `pending → completed | failed` or `completed → refunded`.
    pub fn transition(self, next: PaymentStatus) -> Result<PaymentStatus, CoreError> {
        let allowed = self == next
            || matches!(
                (self, next),
                (
                    PaymentStatus::Pending,
                    PaymentStatus::Completed | PaymentStatus::Failed
                ) | (PaymentStatus::Completed, PaymentStatus::Refunded)
            );
        if allowed {
            Ok(next)
        } else {
            Err(CoreError::IllegalTransition {
                kind: "payment status",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(CoreError::UnknownValue {
                kind: "payment status",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
    BankTransfer,
}

impl PaymentMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash_on_delivery" => Ok(PaymentMethod::CashOnDelivery),
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            _ => Err(CoreError::UnknownValue {
                kind: "payment method",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Checkout input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl CustomerInfo {
    /// Compares phone numbers by their digits only, so `052-123-4567` and
    /// `0521234567` match. An input without digits never matches.
    #[must_use]
    pub fn phone_matches(&self, candidate: &str) -> bool {
        let digits = |s: &str| s.chars().filter(char::is_ascii_digit).collect::<String>();
        let wanted = digits(candidate);
        !wanted.is_empty() && wanted == digits(&self.phone)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A cart entry as submitted at checkout. Prices are looked up, not trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub size: String,
    pub color_index: i32,
    pub quantity: i32,
}

impl CartLine {
    #[must_use]
    pub fn key(&self) -> VariantKey {
        VariantKey::new(self.product_id, self.size.clone(), self.color_index)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer: CustomerInfo,
    /// Opaque subject from the identity provider, when signed in.
    #[serde(default)]
    pub customer_id: Option<String>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
    /// Client-chosen key making checkout retries safe.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl NewOrder {
    /// Rejects malformed checkout input before anything is written.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] naming the first problem found.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |msg: &str| Err(CoreError::Validation(msg.to_string()));

        if self.customer.name.trim().is_empty() {
            return invalid("customer name is required");
        }
        if !PHONE_RE.is_match(self.customer.phone.trim()) {
            return Err(CoreError::Validation(format!(
                "customer phone '{}' is not a valid phone number",
                self.customer.phone
            )));
        }
        if let Some(email) = self.customer.email.as_deref().map(str::trim) {
            if !email.is_empty() && !EMAIL_RE.is_match(email) {
                return Err(CoreError::Validation(format!(
                    "customer email '{email}' is not valid"
                )));
            }
        }
        if self.shipping_address.street.trim().is_empty() {
            return invalid("shipping street is required");
        }
        if self.shipping_address.city.trim().is_empty() {
            return invalid("shipping city is required");
        }
        if self.items.is_empty() {
            return invalid("order must contain at least one item");
        }
        for line in &self.items {
            if line.quantity <= 0 {
                return Err(CoreError::Validation(format!(
                    "quantity for {} must be positive, got {}",
                    line.key(),
                    line.quantity
                )));
            }
            if line.color_index < 0 {
                return Err(CoreError::Validation(format!(
                    "color index must be non-negative, got {}",
                    line.color_index
                )));
            }
        }
        if self
            .idempotency_key
            .as_deref()
            .is_some_and(|k| k.trim().is_empty() || k.len() > 128)
        {
            return invalid("idempotency key must be 1-128 characters");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Decimal,
    pub shipping_flat_fee: Decimal,
    /// Fraction of the subtotal, e.g. `0.17`.
    pub tax_rate: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Decimal::from(300),
            shipping_flat_fee: Decimal::from(30),
            tax_rate: Decimal::new(17, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

impl PricingPolicy {
    #[must_use]
    pub fn shipping_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal >= self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.shipping_flat_fee
        }
    }

    /// Computes order totals; `total = subtotal + shipping + tax - discount`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the discount exceeds the
    /// pre-discount total.
    pub fn totals(&self, lines: &[OrderLine], discount: Decimal) -> Result<OrderTotals, CoreError> {
        let subtotal: Decimal = lines.iter().map(|l| l.line_total).sum();
        let shipping_cost = self.shipping_for(subtotal);
        let tax_amount = (subtotal * self.tax_rate)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let gross = subtotal + shipping_cost + tax_amount;
        if discount > gross {
            return Err(CoreError::Validation(format!(
                "discount {discount} exceeds order total {gross}"
            )));
        }
        Ok(OrderTotals {
            subtotal,
            shipping_cost,
            tax_amount,
            discount_amount: discount,
            total_amount: gross - discount,
        })
    }
}

// ---------------------------------------------------------------------------
// Persisted order
// ---------------------------------------------------------------------------

/// A line frozen at order time. `unit_price` does not follow later catalog
/// price changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub size: String,
    pub color_index: i32,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

impl OrderLine {
    #[must_use]
    pub fn new(
        product_id: Uuid,
        product_name: String,
        size: String,
        color_index: i32,
        unit_price: Decimal,
        quantity: i32,
    ) -> Self {
        Self {
            product_id,
            product_name,
            size,
            color_index,
            unit_price,
            quantity,
            line_total: unit_price * Decimal::from(quantity),
        }
    }

    #[must_use]
    pub fn stock_line(&self) -> StockLine {
        StockLine {
            key: VariantKey::new(self.product_id, self.size.clone(), self.color_index),
            quantity: self.quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer: CustomerInfo,
    pub customer_id: Option<String>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderLine>,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn stock_lines(&self) -> Vec<StockLine> {
        self.items.iter().map(OrderLine::stock_line).collect()
    }

    /// Appends a line to the order notes.
    pub fn append_note(&mut self, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}\n{note}"),
            _ => note.to_string(),
        });
    }
}

/// Human-readable order number, e.g. `KW-20261019-7QF3ZK`.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| {
            let idx = rng.random_range(0..ORDER_NUMBER_ALPHABET.len());
            char::from(ORDER_NUMBER_ALPHABET[idx])
        })
        .collect();
    format!("KW-{}-{suffix}", now.format("%Y%m%d"))
}
