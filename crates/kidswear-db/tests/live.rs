//! Live integration tests for kidswear-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/kidswear-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::Utc;
use kidswear_core::{
    generate_order_number, load_catalog, BasicCategory, ColorVariant, CustomerInfo,
    InventoryRecord, LocalizedText, MovementKind, Order, OrderLine, OrderStatus, PaymentMethod,
    PaymentStatus, PricingPolicy, Product, RestockEntry, ShippingAddress, StockLine, StockOp,
    VariantKey,
};
use kidswear_db::{
    apply_stock_op, available_by_product, deactivate_product, get_inventory, get_order,
    get_product, insert_order_reserving, list_active_products,
    list_inventory_at_or_below_threshold, list_movements, list_orders, product_id_by_sku,
    provision_inventory, restock_entries, seed_catalog, set_stock, update_order_status,
    update_payment_status, upsert_product, DbError, OrderInsert,
};
use rust_decimal::Decimal;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn text(en: &str) -> LocalizedText {
    LocalizedText {
        he: format!("{en} he"),
        ar: format!("{en} ar"),
        en: en.to_string(),
    }
}

fn make_product(name: &str, category: BasicCategory) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: text(name),
        description: text("description"),
        price: Decimal::from(125),
        original_price: None,
        category,
        sizes: vec!["2T".to_string(), "4T".to_string()],
        colors: vec![ColorVariant {
            name: text("Navy"),
            hex: "#1F2A44".to_string(),
            images: vec![],
        }],
        tags: vec!["summer".to_string()],
        brand: Some("Sprout".to_string()),
        age_groups: vec![],
        sku: Some(format!("SKU-{name}")),
        is_new: false,
        is_sale: false,
        featured: false,
        discount: None,
        sort_order: 0,
        created_at: None,
    }
}

/// Insert a product with one provisioned variant and return its key.
async fn stocked_variant(pool: &sqlx::PgPool, stock: i32) -> VariantKey {
    let product = make_product(&format!("p-{}", Uuid::new_v4()), BasicCategory::Boys);
    upsert_product(pool, &product)
        .await
        .expect("upsert_product failed");
    let key = VariantKey::new(product.id, "2T", 0);
    let record = InventoryRecord::provision(key.clone(), stock, 3, None, Utc::now())
        .expect("valid record");
    provision_inventory(pool, &record)
        .await
        .expect("provision_inventory failed");
    key
}

fn line(key: &VariantKey, quantity: i32) -> StockLine {
    StockLine {
        key: key.clone(),
        quantity,
    }
}

fn make_order(keys: &[&VariantKey], idempotency_key: Option<&str>) -> Order {
    let items: Vec<OrderLine> = keys
        .iter()
        .map(|k| {
            OrderLine::new(
                k.product_id,
                "Tee".to_string(),
                k.size.clone(),
                k.color_index,
                Decimal::from(125),
                1,
            )
        })
        .collect();
    let totals = PricingPolicy::default()
        .totals(&items, Decimal::ZERO)
        .expect("totals");
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        order_number: generate_order_number(now),
        customer: CustomerInfo {
            name: "Dana".to_string(),
            phone: "052-123-4567".to_string(),
            email: None,
        },
        customer_id: None,
        shipping_address: ShippingAddress {
            street: "Herzl 10".to_string(),
            city: "Haifa".to_string(),
            postal_code: None,
            notes: None,
        },
        items,
        totals,
        payment_method: PaymentMethod::CashOnDelivery,
        payment_status: PaymentStatus::Pending,
        status: OrderStatus::Pending,
        notes: None,
        tracking_number: None,
        estimated_delivery: None,
        delivered_at: None,
        idempotency_key: idempotency_key.map(str::to_string),
        created_at: now,
        updated_at: now,
    }
}

async fn reserved(pool: &sqlx::PgPool, key: &VariantKey) -> (i32, i32) {
    let record = get_inventory(pool, key)
        .await
        .expect("get_inventory failed")
        .expect("record exists");
    (record.stock_quantity, record.reserved_quantity)
}

// ---------------------------------------------------------------------------
// Section 1: Products
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn product_upsert_get_and_deactivate(pool: sqlx::PgPool) {
    let mut product = make_product("Rocket Tee", BasicCategory::Boys);
    upsert_product(&pool, &product).await.expect("insert");

    product.price = Decimal::from(99);
    upsert_product(&pool, &product).await.expect("update");

    let stored = get_product(&pool, product.id)
        .await
        .expect("get_product failed")
        .expect("product exists");
    assert_eq!(stored.price, Decimal::from(99));
    assert_eq!(stored.name, product.name);

    assert_eq!(
        product_id_by_sku(&pool, "SKU-Rocket Tee").await.expect("lookup"),
        Some(product.id)
    );

    assert!(deactivate_product(&pool, product.id).await.expect("deactivate"));
    assert!(!deactivate_product(&pool, product.id).await.expect("deactivate twice"));
    assert!(get_product(&pool, product.id).await.expect("get").is_none());
    assert!(list_active_products(&pool).await.expect("list").is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn invalid_product_is_rejected_before_write(pool: sqlx::PgPool) {
    let mut product = make_product("Broken", BasicCategory::Girls);
    product.original_price = Some(Decimal::from(10));
    let err = upsert_product(&pool, &product).await.unwrap_err();
    assert!(matches!(err, DbError::Rejected(_)), "{err:?}");
}

// ---------------------------------------------------------------------------
// Section 2: Inventory
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn provisioning_twice_is_refused(pool: sqlx::PgPool) {
    let key = stocked_variant(&pool, 5).await;
    let record = InventoryRecord::provision(key.clone(), 9, 3, None, Utc::now()).expect("valid");
    let err = provision_inventory(&pool, &record).await.unwrap_err();
    assert!(matches!(err, DbError::VariantExists(_)));
    assert_eq!(reserved(&pool, &key).await, (5, 0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn second_reservation_beyond_available_is_rejected(pool: sqlx::PgPool) {
    let key = stocked_variant(&pool, 5).await;

    apply_stock_op(&pool, StockOp::Reserve, &[line(&key, 3)], None)
        .await
        .expect("first reservation");
    assert_eq!(reserved(&pool, &key).await, (5, 3));

    let err = apply_stock_op(&pool, StockOp::Reserve, &[line(&key, 3)], None)
        .await
        .unwrap_err();
    let DbError::InsufficientStock(shortfalls) = err else {
        panic!("expected InsufficientStock, got {err:?}");
    };
    assert_eq!(shortfalls[0].available, 2);
    assert_eq!(reserved(&pool, &key).await, (5, 3));
}

#[sqlx::test(migrations = "../../migrations")]
async fn reservation_batch_is_all_or_nothing(pool: sqlx::PgPool) {
    let plenty = stocked_variant(&pool, 10).await;
    let scarce = stocked_variant(&pool, 1).await;

    let err = apply_stock_op(
        &pool,
        StockOp::Reserve,
        &[line(&plenty, 2), line(&scarce, 2)],
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::InsufficientStock(ref s) if s.len() == 1));
    assert_eq!(reserved(&pool, &plenty).await, (10, 0));
    assert_eq!(reserved(&pool, &scarce).await, (1, 0));
}

#[sqlx::test(migrations = "../../migrations")]
async fn unprovisioned_variant_is_not_found(pool: sqlx::PgPool) {
    let key = stocked_variant(&pool, 5).await;
    let ghost = VariantKey::new(key.product_id, "4T", 0);
    let err = apply_stock_op(&pool, StockOp::Release, &[line(&ghost, 1)], None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::MissingVariant(k) if k == ghost));
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_reservations_never_oversell(pool: sqlx::PgPool) {
    let key = stocked_variant(&pool, 5).await;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let pool = pool.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            apply_stock_op(&pool, StockOp::Reserve, &[line(&key, 1)], None).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.expect("task panicked").is_ok() {
            succeeded += 1;
        }
    }
    assert_eq!(succeeded, 5);
    assert_eq!(reserved(&pool, &key).await, (5, 5));
}

#[sqlx::test(migrations = "../../migrations")]
async fn set_stock_logs_adjustment_and_guards_reserved(pool: sqlx::PgPool) {
    let key = stocked_variant(&pool, 8).await;
    apply_stock_op(&pool, StockOp::Reserve, &[line(&key, 4)], None)
        .await
        .expect("reserve");

    let err = set_stock(&pool, &key, 3, Some("miscount")).await.unwrap_err();
    assert!(matches!(err, DbError::Rejected(_)));

    let (record, movement) = set_stock(&pool, &key, 6, Some("cycle count"))
        .await
        .expect("set_stock");
    assert_eq!(record.stock_quantity, 6);
    let movement = movement.expect("delta logged");
    assert_eq!(movement.delta, -2);

    let log = list_movements(&pool, &key, 10).await.expect("movements");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, MovementKind::Adjustment);
    assert_eq!(log[0].reason.as_deref(), Some("cycle count"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn restock_and_alert_listing(pool: sqlx::PgPool) {
    let low = stocked_variant(&pool, 2).await;
    let fine = stocked_variant(&pool, 40).await;

    let alerts = list_inventory_at_or_below_threshold(&pool)
        .await
        .expect("alerts");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].key, low);

    apply_stock_op(
        &pool,
        StockOp::Restock {
            cost_per_unit: Some(Decimal::new(1150, 2)),
        },
        &[line(&low, 10)],
        Some("supplier delivery"),
    )
    .await
    .expect("restock");

    let record = get_inventory(&pool, &low).await.expect("get").expect("exists");
    assert_eq!(record.stock_quantity, 12);
    assert_eq!(record.cost_per_unit, Some(Decimal::new(1150, 2)));
    assert!(record.last_restocked.is_some());
    assert!(list_inventory_at_or_below_threshold(&pool)
        .await
        .expect("alerts")
        .is_empty());

    let available = available_by_product(&pool).await.expect("available");
    assert_eq!(available.get(&fine.product_id), Some(&40));
}

#[sqlx::test(migrations = "../../migrations")]
async fn mixed_cost_restock_commits_together_or_not_at_all(pool: sqlx::PgPool) {
    let first = stocked_variant(&pool, 4).await;
    let second = stocked_variant(&pool, 6).await;
    let ghost = VariantKey::new(Uuid::new_v4(), "2T", 0);
    let entry = |key: &VariantKey, quantity: i32, cents: i64| RestockEntry {
        key: key.clone(),
        quantity,
        cost_per_unit: Some(Decimal::new(cents, 2)),
    };

    let err = restock_entries(
        &pool,
        &[entry(&first, 5, 1100), entry(&ghost, 5, 1300)],
        Some("delivery"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::MissingVariant(ref k) if *k == ghost), "{err:?}");

    let err = restock_entries(
        &pool,
        &[entry(&first, 5, 1100), entry(&second, i32::MAX, 1300)],
        Some("delivery"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::Rejected(_)), "{err:?}");

    let untouched = get_inventory(&pool, &first).await.expect("get").expect("exists");
    assert_eq!(untouched.stock_quantity, 4);
    assert_eq!(untouched.cost_per_unit, None);
    assert!(list_movements(&pool, &first, 10).await.expect("log").is_empty());

    let updated = restock_entries(
        &pool,
        &[entry(&first, 5, 1100), entry(&second, 2, 1300)],
        Some("delivery"),
    )
    .await
    .expect("restock");
    assert_eq!(updated.len(), 2);
    let a = get_inventory(&pool, &first).await.expect("get").expect("exists");
    let b = get_inventory(&pool, &second).await.expect("get").expect("exists");
    assert_eq!((a.stock_quantity, a.cost_per_unit), (9, Some(Decimal::new(1100, 2))));
    assert_eq!((b.stock_quantity, b.cost_per_unit), (8, Some(Decimal::new(1300, 2))));
    let log = list_movements(&pool, &second, 10).await.expect("log");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, MovementKind::Restock);
    assert_eq!(log[0].delta, 2);
}

// ---------------------------------------------------------------------------
// Section 3: Orders
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn order_insert_reserves_and_is_idempotent(pool: sqlx::PgPool) {
    let a = stocked_variant(&pool, 3).await;
    let b = stocked_variant(&pool, 3).await;

    let order = make_order(&[&a, &b], Some("checkout-1"));
    let first = insert_order_reserving(&pool, &order).await.expect("insert");
    assert!(matches!(first, OrderInsert::Created(_)));
    assert_eq!(reserved(&pool, &a).await, (3, 1));

    let retry = make_order(&[&a, &b], Some("checkout-1"));
    let OrderInsert::Existing(existing) = insert_order_reserving(&pool, &retry)
        .await
        .expect("retry")
    else {
        panic!("expected the stored order");
    };
    assert_eq!(existing.id, order.id);
    assert_eq!(reserved(&pool, &a).await, (3, 1));

    let stored = get_order(&pool, order.id).await.expect("get").expect("exists");
    assert_eq!(stored.order_number, order.order_number);
    assert_eq!(stored.totals, order.totals);
}

#[sqlx::test(migrations = "../../migrations")]
async fn order_insert_with_shortfall_writes_nothing(pool: sqlx::PgPool) {
    let a = stocked_variant(&pool, 0).await;
    let order = make_order(&[&a], None);
    let err = insert_order_reserving(&pool, &order).await.unwrap_err();
    assert!(matches!(err, DbError::InsufficientStock(_)));
    assert!(get_order(&pool, order.id).await.expect("get").is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancel_releases_and_shipment_commits(pool: sqlx::PgPool) {
    let a = stocked_variant(&pool, 4).await;
    let b = stocked_variant(&pool, 4).await;

    let mut cancelled = make_order(&[&a, &b], None);
    insert_order_reserving(&pool, &cancelled).await.expect("insert");
    cancelled.status = OrderStatus::Cancelled;
    update_order_status(&pool, &cancelled, OrderStatus::Pending, Some(StockOp::Release))
        .await
        .expect("cancel");
    assert_eq!(reserved(&pool, &a).await, (4, 0));
    assert_eq!(reserved(&pool, &b).await, (4, 0));

    let mut shipped = make_order(&[&a], None);
    insert_order_reserving(&pool, &shipped).await.expect("insert");
    shipped.status = OrderStatus::Shipped;
    update_order_status(&pool, &shipped, OrderStatus::Pending, Some(StockOp::CommitSale))
        .await
        .expect("ship");
    assert_eq!(reserved(&pool, &a).await, (3, 0));

    let stale = update_order_status(&pool, &shipped, OrderStatus::Pending, None)
        .await
        .unwrap_err();
    assert!(matches!(stale, DbError::StaleOrder { .. }));

    let shipped_list = list_orders(&pool, Some(OrderStatus::Shipped), 10, 0)
        .await
        .expect("list");
    assert_eq!(shipped_list.len(), 1);
    assert_eq!(list_orders(&pool, None, 10, 0).await.expect("list").len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn payment_status_update_is_conditional(pool: sqlx::PgPool) {
    let a = stocked_variant(&pool, 4).await;
    let order = make_order(&[&a], None);
    insert_order_reserving(&pool, &order).await.expect("insert");

    update_payment_status(&pool, order.id, PaymentStatus::Pending, PaymentStatus::Completed)
        .await
        .expect("complete");
    let err = update_payment_status(
        &pool,
        order.id,
        PaymentStatus::Pending,
        PaymentStatus::Failed,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::StaleOrder { .. }));
}

// ---------------------------------------------------------------------------
// Section 4: Seed
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn seed_catalog_is_repeatable(pool: sqlx::PgPool) {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/catalog.yaml");
    let entries = load_catalog(&path)
        .unwrap_or_else(|e| panic!("catalog failed to load: {e}"))
        .products;
    let variants: usize = entries.iter().map(|e| e.inventory.len()).sum();

    let first = seed_catalog(&pool, &entries, 5).await.expect("seed");
    assert_eq!(first.products, entries.len());
    assert_eq!(first.variants_provisioned, variants);

    let entry = &entries[0];
    let id = product_id_by_sku(&pool, &entry.sku)
        .await
        .expect("lookup")
        .expect("seeded");
    let seed = &entry.inventory[0];
    let key = VariantKey::new(id, seed.size.clone(), seed.color_index);
    set_stock(&pool, &key, 1, None).await.expect("sell down");

    let second = seed_catalog(&pool, &entries, 5).await.expect("reseed");
    assert_eq!(second.variants_provisioned, 0);
    assert_eq!(second.variants_existing, variants);
    assert_eq!(reserved(&pool, &key).await, (1, 0));
    assert_eq!(
        list_active_products(&pool).await.expect("list").len(),
        entries.len()
    );
}
