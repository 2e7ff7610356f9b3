//! Domain model and rule engines for the kidswear storefront: products,
//! category classification, catalog search, inventory records and orders.

pub mod app_config;
pub mod catalog;
pub mod categories;
pub mod classifier;
pub mod config;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod search;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use catalog::{load_catalog, CatalogEntry, CatalogFile, InventorySeed};
pub use categories::{
    CategoryDefinition, CategoryKind, CategoryRegistry, CategoryRules, NEW_ARRIVALS_SLUG,
};
pub use classifier::{CategoryValidation, Classifier};
pub use config::{load_app_config, load_app_config_from_env};
pub use inventory::{
    apply_batch, apply_restock, merge_lines, merge_restock, AlertSeverity, Availability,
    BatchRejection, InventoryAlert, InventoryRecord, MovementKind, RestockEntry, Shortfall,
    StockLine, StockMovement, StockOp, VariantKey,
};
pub use orders::{
    generate_order_number, CartLine, CustomerInfo, NewOrder, Order, OrderLine, OrderStatus,
    OrderTotals, PaymentMethod, PaymentStatus, PricingPolicy, ShippingAddress,
};
pub use products::{BasicCategory, ColorVariant, DiscountValue, Locale, LocalizedText, Product};
pub use search::{
    search, AvailableStock, Facets, ProductFilters, SearchRequest, SearchResult, SortMode,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read catalog file {path}: {source}")]
    CatalogFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog file: {0}")]
    CatalogFileParse(#[from] serde_yaml::Error),
    #[error("catalog validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unknown {kind} value: '{value}'")]
    UnknownValue { kind: &'static str, value: String },
    #[error("illegal {kind} transition from {from} to {to}")]
    IllegalTransition {
        kind: &'static str,
        from: String,
        to: String,
    },
}
