use chrono::Utc;
use kidswear_core::{CatalogEntry, InventoryRecord, VariantKey};
use sqlx::PgPool;
use uuid::Uuid;

use crate::inventory::provision_on;
use crate::products::{product_id_by_sku_on, upsert_product_on};
use crate::DbError;

/// Counts reported by [`seed_catalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub products: usize,
    pub variants_provisioned: usize,
    /// Variants that already had an inventory record; their stock is left alone.
    pub variants_existing: usize,
}

/// Upsert catalog entries keyed by SKU and provision their inventory.
///
/// All writes run inside a single transaction; if any operation fails the
/// entire batch is rolled back. Re-running the seed never resets stock of a
/// variant that is already provisioned.
///
/// # Errors
///
/// Returns [`DbError::Rejected`] for an invalid product or stock entry, or
/// [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_catalog(
    pool: &PgPool,
    entries: &[CatalogEntry],
    default_low_stock_threshold: i32,
) -> Result<SeedSummary, DbError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    for entry in entries {
        let id = product_id_by_sku_on(&mut *tx, &entry.sku)
            .await?
            .unwrap_or_else(Uuid::new_v4);
        upsert_product_on(&mut *tx, &entry.to_product(id, now)).await?;
        summary.products += 1;

        for seed in &entry.inventory {
            let record = InventoryRecord::provision(
                VariantKey::new(id, seed.size.clone(), seed.color_index),
                seed.stock,
                seed.low_stock_threshold.unwrap_or(default_low_stock_threshold),
                seed.cost_per_unit,
                now,
            )?;
            if provision_on(&mut *tx, &record).await?.is_some() {
                summary.variants_provisioned += 1;
            } else {
                summary.variants_existing += 1;
            }
        }
    }

    tx.commit().await?;
    Ok(summary)
}
