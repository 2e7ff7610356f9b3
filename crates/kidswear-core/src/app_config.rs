use std::net::SocketAddr;
use std::path::PathBuf;

use rust_decimal::Decimal;

use crate::categories::CategoryRules;
use crate::orders::PricingPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub catalog_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub free_shipping_threshold: Decimal,
    pub shipping_flat_fee: Decimal,
    pub tax_rate: Decimal,
    pub low_stock_default: i32,
    pub new_arrival_days: i64,
    pub deals_min_discount_percent: Decimal,
    pub store_max_retries: u32,
    pub alert_scan_cron: String,
}

impl AppConfig {
    /// Pricing rules applied by checkout.
    #[must_use]
    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy {
            free_shipping_threshold: self.free_shipping_threshold,
            shipping_flat_fee: self.shipping_flat_fee,
            tax_rate: self.tax_rate,
        }
    }

    /// Tunables the category registry is built from.
    #[must_use]
    pub fn category_rules(&self) -> CategoryRules {
        CategoryRules {
            new_arrival_days: self.new_arrival_days,
            deals_min_discount_percent: self.deals_min_discount_percent,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("catalog_path", &self.catalog_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("free_shipping_threshold", &self.free_shipping_threshold)
            .field("shipping_flat_fee", &self.shipping_flat_fee)
            .field("tax_rate", &self.tax_rate)
            .field("low_stock_default", &self.low_stock_default)
            .field("new_arrival_days", &self.new_arrival_days)
            .field(
                "deals_min_discount_percent",
                &self.deals_min_discount_percent,
            )
            .field("store_max_retries", &self.store_max_retries)
            .field("alert_scan_cron", &self.alert_scan_cron)
            .finish()
    }
}
