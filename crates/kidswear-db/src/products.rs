//! Database operations for `products`.

use chrono::{DateTime, Utc};
use kidswear_core::{ColorVariant, DiscountValue, LocalizedText, Product};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{corrupt, DbError};

const PRODUCT_COLUMNS: &str = "id, sku, name_he, name_ar, name_en, \
     description_he, description_ar, description_en, price, original_price, category, \
     sizes, colors, tags, brand, age_groups, is_new, is_sale, featured, discount, \
     sort_order, is_active, created_at, updated_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub sku: Option<String>,
    pub name_he: String,
    pub name_ar: String,
    pub name_en: String,
    pub description_he: String,
    pub description_ar: String,
    pub description_en: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    /// One of `boys`, `girls`, `baby`, `unisex` (enforced by a CHECK).
    pub category: String,
    pub sizes: Vec<String>,
    pub colors: Json<Vec<ColorVariant>>,
    pub tags: Vec<String>,
    pub brand: Option<String>,
    pub age_groups: Vec<String>,
    pub is_new: bool,
    pub is_sale: bool,
    pub featured: bool,
    pub discount: Option<Json<DiscountValue>>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    /// Converts the row into the domain type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::CorruptRow`] if the stored category is unknown.
    pub fn into_product(self) -> Result<Product, DbError> {
        let category = self.category.parse().map_err(corrupt("products"))?;
        Ok(Product {
            id: self.id,
            name: LocalizedText {
                he: self.name_he,
                ar: self.name_ar,
                en: self.name_en,
            },
            description: LocalizedText {
                he: self.description_he,
                ar: self.description_ar,
                en: self.description_en,
            },
            price: self.price,
            original_price: self.original_price,
            category,
            sizes: self.sizes,
            colors: self.colors.0,
            tags: self.tags,
            brand: self.brand,
            age_groups: self.age_groups,
            sku: self.sku,
            is_new: self.is_new,
            is_sale: self.is_sale,
            featured: self.featured,
            discount: self.discount.map(|d| d.0),
            sort_order: self.sort_order,
            created_at: Some(self.created_at),
        })
    }
}

// ---------------------------------------------------------------------------
// products operations
// ---------------------------------------------------------------------------

/// Inserts or replaces a product and re-activates it.
///
/// Conflicts on `id` overwrite every catalog attribute; `created_at` keeps
/// its original value.
///
/// # Errors
///
/// Returns [`DbError::Rejected`] if the product fails validation, or
/// [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_product(pool: &PgPool, product: &Product) -> Result<(), DbError> {
    let mut conn = pool.acquire().await?;
    upsert_product_on(&mut *conn, product).await
}

pub(crate) async fn upsert_product_on(
    conn: &mut PgConnection,
    product: &Product,
) -> Result<(), DbError> {
    product.validate()?;

    sqlx::query(
        "INSERT INTO products \
             (id, sku, name_he, name_ar, name_en, description_he, description_ar, \
              description_en, price, original_price, category, sizes, colors, tags, brand, \
              age_groups, is_new, is_sale, featured, discount, sort_order, is_active, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
                 $16, $17, $18, $19, $20, $21, true, COALESCE($22, NOW())) \
         ON CONFLICT (id) DO UPDATE SET \
             sku            = EXCLUDED.sku, \
             name_he        = EXCLUDED.name_he, \
             name_ar        = EXCLUDED.name_ar, \
             name_en        = EXCLUDED.name_en, \
             description_he = EXCLUDED.description_he, \
             description_ar = EXCLUDED.description_ar, \
             description_en = EXCLUDED.description_en, \
             price          = EXCLUDED.price, \
             original_price = EXCLUDED.original_price, \
             category       = EXCLUDED.category, \
             sizes          = EXCLUDED.sizes, \
             colors         = EXCLUDED.colors, \
             tags           = EXCLUDED.tags, \
             brand          = EXCLUDED.brand, \
             age_groups     = EXCLUDED.age_groups, \
             is_new         = EXCLUDED.is_new, \
             is_sale        = EXCLUDED.is_sale, \
             featured       = EXCLUDED.featured, \
             discount       = EXCLUDED.discount, \
             sort_order     = EXCLUDED.sort_order, \
             is_active      = true, \
             updated_at     = NOW()",
    )
    .bind(product.id)
    .bind(&product.sku)
    .bind(&product.name.he)
    .bind(&product.name.ar)
    .bind(&product.name.en)
    .bind(&product.description.he)
    .bind(&product.description.ar)
    .bind(&product.description.en)
    .bind(product.price)
    .bind(product.original_price)
    .bind(product.category.as_str())
    .bind(&product.sizes)
    .bind(Json(&product.colors))
    .bind(&product.tags)
    .bind(&product.brand)
    .bind(&product.age_groups)
    .bind(product.is_new)
    .bind(product.is_sale)
    .bind(product.featured)
    .bind(product.discount.as_ref().map(Json))
    .bind(product.sort_order)
    .bind(product.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Fetches an active product by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id: Uuid) -> Result<Option<Product>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND is_active"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(ProductRow::into_product).transpose()
}

/// Lists every active product in declared display order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_products(pool: &PgPool) -> Result<Vec<Product>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active \
         ORDER BY sort_order, created_at, id"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(ProductRow::into_product).collect()
}

/// Soft-deletes a product. Returns `false` if no active product had that id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn deactivate_product(pool: &PgPool, id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE products SET is_active = false, updated_at = NOW() \
         WHERE id = $1 AND is_active",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Looks up a product id by SKU, active or not.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn product_id_by_sku(pool: &PgPool, sku: &str) -> Result<Option<Uuid>, DbError> {
    let mut conn = pool.acquire().await?;
    product_id_by_sku_on(&mut *conn, sku).await
}

pub(crate) async fn product_id_by_sku_on(
    conn: &mut PgConnection,
    sku: &str,
) -> Result<Option<Uuid>, DbError> {
    let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM products WHERE sku = $1")
        .bind(sku)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id)
}
