use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use kidswear_core::{load_catalog, Product, VariantKey};
use kidswear_services::{CatalogStore, MemoryStore, Services};
use uuid::Uuid;

use crate::api::{build_app, default_rate_limit_state, AppState};
use crate::middleware::AuthState;

pub(crate) struct Shop {
    pub services: Services<MemoryStore>,
    pub products: Vec<Product>,
}

impl Shop {
    pub(crate) fn product(&self, sku: &str) -> &Product {
        self.products
            .iter()
            .find(|p| p.sku.as_deref() == Some(sku))
            .unwrap_or_else(|| panic!("seed catalog has no {sku}"))
    }

    pub(crate) fn key(&self, sku: &str, size: &str, color_index: i32) -> VariantKey {
        VariantKey::new(self.product(sku).id, size, color_index)
    }

    pub(crate) fn app(&self, api_keys: &str) -> axum::Router {
        let auth = AuthState::from_keys(api_keys, true).expect("auth");
        build_app(
            AppState {
                services: self.services.clone(),
            },
            auth,
            default_rate_limit_state(),
        )
    }
}

/// The shipped seed catalog, loaded into a fresh in-memory store.
pub(crate) async fn seeded_shop() -> Shop {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/catalog.yaml");
    let catalog = load_catalog(&path).expect("seed catalog");
    let services = Services::with_defaults(Arc::new(MemoryStore::new()));

    let mut products = Vec::with_capacity(catalog.products.len());
    for entry in &catalog.products {
        let product = entry.to_product(Uuid::new_v4(), Utc::now());
        services
            .store
            .upsert_product(&product)
            .await
            .expect("upsert product");
        for seed in &entry.inventory {
            services
                .ledger
                .provision(
                    VariantKey::new(product.id, seed.size.clone(), seed.color_index),
                    seed.stock,
                    seed.low_stock_threshold,
                    seed.cost_per_unit,
                )
                .await
                .expect("provision");
        }
        products.push(product);
    }
    Shop { services, products }
}
