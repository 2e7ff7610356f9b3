use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::products::{BasicCategory, ColorVariant, DiscountValue, LocalizedText, Product};
use crate::ConfigError;

/// Initial stock for one variant of a seeded product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySeed {
    pub size: String,
    #[serde(default)]
    pub color_index: i32,
    pub stock: i32,
    #[serde(default)]
    pub low_stock_threshold: Option<i32>,
    #[serde(default)]
    pub cost_per_unit: Option<Decimal>,
}

/// A product as written in the seed file. The SKU is the stable key; ids
/// are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub sku: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    pub category: BasicCategory,
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<ColorVariant>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub age_groups: Vec<String>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_sale: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub discount: Option<DiscountValue>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub inventory: Vec<InventorySeed>,
}

impl CatalogEntry {
    #[must_use]
    pub fn to_product(&self, id: Uuid, created_at: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            original_price: self.original_price,
            category: self.category,
            sizes: self.sizes.clone(),
            colors: self.colors.clone(),
            tags: self.tags.clone(),
            brand: self.brand.clone(),
            age_groups: self.age_groups.clone(),
            sku: Some(self.sku.clone()),
            is_new: self.is_new,
            is_sale: self.is_sale,
            featured: self.featured,
            discount: self.discount.clone(),
            sort_order: self.sort_order,
            created_at: Some(created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<CatalogEntry>,
}

/// Load and validate the seed catalog from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_catalog(path: &Path) -> Result<CatalogFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CatalogFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let catalog: CatalogFile =
        serde_yaml::from_str(&content).map_err(ConfigError::CatalogFileParse)?;

    validate_catalog(&catalog)?;

    Ok(catalog)
}

fn validate_catalog(catalog: &CatalogFile) -> Result<(), ConfigError> {
    let mut seen_skus = HashSet::new();

    for entry in &catalog.products {
        if entry.sku.trim().is_empty() {
            return Err(ConfigError::Validation(
                "product sku must be non-empty".to_string(),
            ));
        }
        if !seen_skus.insert(entry.sku.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate product sku: '{}'",
                entry.sku
            )));
        }

        entry
            .to_product(Uuid::nil(), Utc::now())
            .validate()
            .map_err(|e| ConfigError::Validation(format!("product '{}': {e}", entry.sku)))?;

        let mut seen_variants = HashSet::new();
        for seed in &entry.inventory {
            if !entry.sizes.contains(&seed.size) {
                return Err(ConfigError::Validation(format!(
                    "product '{}' stocks unknown size '{}'",
                    entry.sku, seed.size
                )));
            }
            let color_ok = usize::try_from(seed.color_index)
                .is_ok_and(|i| i < entry.colors.len().max(1));
            if !color_ok {
                return Err(ConfigError::Validation(format!(
                    "product '{}' stocks unknown color index {}",
                    entry.sku, seed.color_index
                )));
            }
            if seed.stock < 0 || seed.low_stock_threshold.is_some_and(|t| t < 0) {
                return Err(ConfigError::Validation(format!(
                    "product '{}' has negative stock or threshold for size '{}'",
                    entry.sku, seed.size
                )));
            }
            if !seen_variants.insert((seed.size.as_str(), seed.color_index)) {
                return Err(ConfigError::Validation(format!(
                    "product '{}' stocks size '{}' color {} twice",
                    entry.sku, seed.size, seed.color_index
                )));
            }
        }
    }

    Ok(())
}
