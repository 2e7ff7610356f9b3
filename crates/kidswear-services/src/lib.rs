//! Storefront services over a [`CatalogStore`]: the inventory ledger, the
//! order fulfillment coordinator and catalog search.

pub mod coordinator;
mod error;
pub mod ledger;
mod retry;
pub mod search;
pub mod store;

#[cfg(test)]
pub(crate) mod fixtures;

use std::sync::Arc;

use kidswear_core::{AppConfig, CategoryRegistry, PricingPolicy};

pub use coordinator::{OrderCoordinator, Placement, StatusUpdate};
pub use error::ServiceError;
pub use ledger::InventoryLedger;
pub use search::CatalogSearch;
pub use store::{CatalogStore, MemoryStore, OrderInsert, PgStore, StoreError};

/// The three services wired to one store and one category registry.
pub struct Services<S> {
    pub store: Arc<S>,
    pub ledger: InventoryLedger<S>,
    pub orders: OrderCoordinator<S>,
    pub catalog: CatalogSearch<S>,
}

impl<S> Clone for Services<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ledger: self.ledger.clone(),
            orders: self.orders.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

impl<S: CatalogStore> Services<S> {
    /// Builds the services with the pricing, category rules and retry budget
    /// from `config`.
    #[must_use]
    pub fn from_config(store: Arc<S>, config: &AppConfig) -> Self {
        let registry = Arc::new(CategoryRegistry::new(config.category_rules()));
        Self {
            ledger: InventoryLedger::new(Arc::clone(&store))
                .with_default_threshold(config.low_stock_default)
                .with_max_retries(config.store_max_retries),
            orders: OrderCoordinator::new(Arc::clone(&store), config.pricing_policy())
                .with_max_retries(config.store_max_retries),
            catalog: CatalogSearch::new(Arc::clone(&store), registry),
            store,
        }
    }

    /// Default pricing and category rules.
    #[must_use]
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self {
            ledger: InventoryLedger::new(Arc::clone(&store)),
            orders: OrderCoordinator::new(Arc::clone(&store), PricingPolicy::default()),
            catalog: CatalogSearch::new(
                Arc::clone(&store),
                Arc::new(CategoryRegistry::default()),
            ),
            store,
        }
    }
}
