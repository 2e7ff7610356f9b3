//! Shared builders for the service tests.

use std::sync::Arc;

use chrono::Utc;
use kidswear_core::{
    BasicCategory, CartLine, ColorVariant, CustomerInfo, InventoryRecord, LocalizedText,
    NewOrder, PaymentMethod, Product, ShippingAddress, VariantKey,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::store::{CatalogStore, MemoryStore};

pub(crate) fn text(en: &str) -> LocalizedText {
    LocalizedText {
        he: format!("{en} (he)"),
        ar: format!("{en} (ar)"),
        en: en.to_string(),
    }
}

pub(crate) fn product(name: &str, category: BasicCategory, price: i64) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: text(name),
        description: text("soft cotton"),
        price: Decimal::from(price),
        original_price: None,
        category,
        sizes: vec!["2T".to_string(), "3T".to_string()],
        colors: vec![
            ColorVariant {
                name: text("Navy"),
                hex: "#1F2A44".to_string(),
                images: vec![],
            },
            ColorVariant {
                name: text("Sun"),
                hex: "#FACC15".to_string(),
                images: vec![],
            },
        ],
        tags: vec![],
        brand: Some("Sprout".to_string()),
        age_groups: vec![],
        sku: None,
        is_new: false,
        is_sale: false,
        featured: false,
        discount: None,
        sort_order: 0,
        created_at: Some(Utc::now()),
    }
}

/// Stores `product` and provisions each `(size, color_index, stock)` variant.
pub(crate) async fn stock_product(
    store: &MemoryStore,
    product: &Product,
    variants: &[(&str, i32, i32)],
) -> Vec<VariantKey> {
    store.upsert_product(product).await.expect("upsert product");
    let mut keys = Vec::new();
    for &(size, color_index, stock) in variants {
        let key = VariantKey::new(product.id, size, color_index);
        let record =
            InventoryRecord::provision(key.clone(), stock, 4, None, Utc::now()).expect("record");
        store
            .provision_inventory(&record)
            .await
            .expect("provision inventory");
        keys.push(key);
    }
    keys
}

/// A store holding one product with a single `2T`/color 0 variant.
pub(crate) async fn single_variant(stock: i32) -> (Arc<MemoryStore>, Product, VariantKey) {
    let store = Arc::new(MemoryStore::new());
    let tee = product("Rocket Tee", BasicCategory::Boys, 125);
    let key = stock_product(&store, &tee, &[("2T", 0, stock)])
        .await
        .remove(0);
    (store, tee, key)
}

pub(crate) fn checkout(lines: Vec<CartLine>) -> NewOrder {
    NewOrder {
        customer: CustomerInfo {
            name: "Dana Levi".to_string(),
            phone: "052-123-4567".to_string(),
            email: Some("dana@example.com".to_string()),
        },
        customer_id: None,
        shipping_address: ShippingAddress {
            street: "Herzl 10".to_string(),
            city: "Haifa".to_string(),
            postal_code: Some("3303110".to_string()),
            notes: None,
        },
        items: lines,
        payment_method: PaymentMethod::CashOnDelivery,
        notes: None,
        idempotency_key: None,
    }
}

pub(crate) fn cart_line(key: &VariantKey, quantity: i32) -> CartLine {
    CartLine {
        product_id: key.product_id,
        size: key.size.clone(),
        color_index: key.color_index,
        quantity,
    }
}
