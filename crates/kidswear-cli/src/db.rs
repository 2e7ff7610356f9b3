//! Database maintenance commands.

use std::path::Path;

use sqlx::PgPool;

pub(crate) async fn run_ping(pool: &PgPool) -> anyhow::Result<()> {
    kidswear_db::health_check(pool).await?;
    println!("database: ok");
    Ok(())
}

pub(crate) async fn run_migrate(pool: &PgPool) -> anyhow::Result<()> {
    let applied = kidswear_db::run_migrations(pool).await?;
    println!("migrations applied: {applied}");
    Ok(())
}

/// Loads `path` and upserts it. Stock of already-provisioned variants is
/// left untouched, so re-seeding a live database is safe.
pub(crate) async fn run_seed(
    pool: &PgPool,
    path: &Path,
    default_low_stock_threshold: i32,
) -> anyhow::Result<()> {
    let catalog = kidswear_core::load_catalog(path)?;
    tracing::info!(
        path = %path.display(),
        products = catalog.products.len(),
        "seeding catalog"
    );
    let summary =
        kidswear_db::seed_catalog(pool, &catalog.products, default_low_stock_threshold).await?;
    println!(
        "seeded {} products: {} variants provisioned, {} already present",
        summary.products, summary.variants_provisioned, summary.variants_existing
    );
    Ok(())
}
