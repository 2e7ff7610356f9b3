use super::*;
use crate::fixtures::{product, single_variant, stock_product};
use crate::store::MemoryStore;
use kidswear_core::{AlertSeverity, BasicCategory, MovementKind};
use rand::Rng;

fn line(key: &VariantKey, quantity: i32) -> StockLine {
    StockLine {
        key: key.clone(),
        quantity,
    }
}

#[tokio::test]
async fn second_reservation_beyond_available_is_rejected() {
    let (store, _, key) = single_variant(5).await;
    let ledger = InventoryLedger::new(store);

    ledger
        .reserve_stock(&[line(&key, 3)])
        .await
        .expect("first reservation");
    let availability = ledger.check_availability(&key, 1).await.expect("check");
    assert_eq!(availability.available_qty, 2);

    let err = ledger.reserve_stock(&[line(&key, 3)]).await.unwrap_err();
    let ServiceError::CapacityConflict(shortfalls) = err else {
        panic!("expected CapacityConflict, got {err:?}");
    };
    assert_eq!(shortfalls.len(), 1);
    assert_eq!(shortfalls[0].requested, 3);
    assert_eq!(shortfalls[0].available, 2);

    let availability = ledger.check_availability(&key, 3).await.expect("check");
    assert!(!availability.in_stock);
    assert_eq!(availability.available_qty, 2);
}

#[tokio::test]
async fn reservation_batch_is_all_or_nothing() {
    let store = Arc::new(MemoryStore::new());
    let tee = product("Tee", BasicCategory::Girls, 40);
    let keys = stock_product(&store, &tee, &[("2T", 0, 10), ("3T", 1, 1)]).await;
    let ledger = InventoryLedger::new(Arc::clone(&store));

    let err = ledger
        .reserve_stock(&[line(&keys[0], 4), line(&keys[1], 2)])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::CapacityConflict(ref s) if s.len() == 1));

    let first = ledger.check_availability(&keys[0], 1).await.expect("check");
    assert_eq!(first.available_qty, 10, "no partial reservation");
}

#[tokio::test]
async fn unprovisioned_variant_is_not_found() {
    let (store, _, key) = single_variant(5).await;
    let ledger = InventoryLedger::new(store);
    let ghost = VariantKey::new(key.product_id, "6T", 0);

    assert!(matches!(
        ledger.check_availability(&ghost, 1).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        ledger.reserve_stock(&[line(&ghost, 1)]).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        ledger.update_stock(&ghost, 3, None).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn negative_inputs_are_validation_failures() {
    let (store, _, key) = single_variant(5).await;
    let ledger = InventoryLedger::new(store);

    assert!(matches!(
        ledger.check_availability(&key, -1).await,
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        ledger.reserve_stock(&[line(&key, 0)]).await,
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        ledger.update_stock(&key, -2, None).await,
        Err(ServiceError::Validation(_))
    ));
}

#[tokio::test]
async fn release_clamps_at_zero() {
    let (store, _, key) = single_variant(5).await;
    let ledger = InventoryLedger::new(Arc::clone(&store));

    ledger.reserve_stock(&[line(&key, 2)]).await.expect("reserve");
    ledger
        .release_reserved_stock(&[line(&key, 2)])
        .await
        .expect("release");
    let records = ledger
        .release_reserved_stock(&[line(&key, 2)])
        .await
        .expect("release again");
    assert_eq!(records[0].reserved_quantity, 0);
    assert_eq!(records[0].stock_quantity, 5);
}

#[tokio::test]
async fn update_stock_below_reserved_is_rejected() {
    let (store, _, key) = single_variant(8).await;
    let ledger = InventoryLedger::new(Arc::clone(&store));
    ledger.reserve_stock(&[line(&key, 4)]).await.expect("reserve");

    let err = ledger.update_stock(&key, 3, Some("miscount")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let record = ledger
        .update_stock(&key, 6, Some("cycle count"))
        .await
        .expect("update");
    assert_eq!(record.stock_quantity, 6);

    let log = ledger.movements(&key, 10).await.expect("movements");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, MovementKind::Adjustment);
    assert_eq!(log[0].delta, -2);
}

#[tokio::test]
async fn restock_then_reset_restores_available() {
    let (store, _, key) = single_variant(5).await;
    let ledger = InventoryLedger::new(Arc::clone(&store));
    ledger.reserve_stock(&[line(&key, 1)]).await.expect("reserve");
    let before = ledger.check_availability(&key, 1).await.expect("check");

    let restocked = ledger
        .restock_items(&[RestockEntry {
            key: key.clone(),
            quantity: 7,
            cost_per_unit: Some(Decimal::new(1250, 2)),
        }])
        .await
        .expect("restock");
    assert_eq!(restocked[0].stock_quantity, 12);
    assert_eq!(restocked[0].cost_per_unit, Some(Decimal::new(1250, 2)));
    assert!(restocked[0].last_restocked.is_some());

    ledger.update_stock(&key, 5, None).await.expect("reset");
    let after = ledger.check_availability(&key, 1).await.expect("check");
    assert_eq!(before, after);
}

#[tokio::test]
async fn restock_checks_every_variant_before_writing() {
    let (store, _, key) = single_variant(5).await;
    let ledger = InventoryLedger::new(Arc::clone(&store));
    let ghost = VariantKey::new(key.product_id, "9T", 0);

    let err = ledger
        .restock_items(&[
            RestockEntry {
                key: key.clone(),
                quantity: 3,
                cost_per_unit: None,
            },
            RestockEntry {
                key: ghost,
                quantity: 3,
                cost_per_unit: None,
            },
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    let record = store.get_inventory(&key).await.expect("get").expect("exists");
    assert_eq!(record.stock_quantity, 5);
}

#[tokio::test]
async fn restock_overflowing_stock_is_a_validation_error() {
    let (store, _, key) = single_variant(5).await;
    let ledger = InventoryLedger::new(Arc::clone(&store));

    let err = ledger
        .restock_items(&[RestockEntry {
            key: key.clone(),
            quantity: i32::MAX,
            cost_per_unit: None,
        }])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "{err:?}");
    let record = store.get_inventory(&key).await.expect("get").expect("exists");
    assert_eq!(record.stock_quantity, 5);
    assert!(ledger.movements(&key, 10).await.expect("movements").is_empty());
}

#[tokio::test]
async fn mixed_cost_delivery_lands_in_one_write() {
    let store = Arc::new(MemoryStore::new());
    let tee = product("Tee", BasicCategory::Boys, 40);
    stock_product(&store, &tee, &[("2T", 0, 5), ("3T", 0, 10)]).await;
    let small = VariantKey::new(tee.id, "2T", 0);
    let large = VariantKey::new(tee.id, "3T", 0);
    let ledger = InventoryLedger::new(Arc::clone(&store));

    // Distinct unit costs; the second entry cannot be absorbed.
    let err = ledger
        .restock_items(&[
            RestockEntry {
                key: small.clone(),
                quantity: 4,
                cost_per_unit: Some(Decimal::new(1200, 2)),
            },
            RestockEntry {
                key: large.clone(),
                quantity: i32::MAX,
                cost_per_unit: Some(Decimal::new(1500, 2)),
            },
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)), "{err:?}");
    let record = store.get_inventory(&small).await.expect("get").expect("exists");
    assert_eq!(record.stock_quantity, 5);
    assert_eq!(record.cost_per_unit, None);
    assert!(ledger.movements(&small, 10).await.expect("movements").is_empty());

    let updated = ledger
        .restock_items(&[
            RestockEntry {
                key: small.clone(),
                quantity: 4,
                cost_per_unit: Some(Decimal::new(1200, 2)),
            },
            RestockEntry {
                key: large.clone(),
                quantity: 2,
                cost_per_unit: Some(Decimal::new(1500, 2)),
            },
        ])
        .await
        .expect("restock");
    assert_eq!(updated.len(), 2);
    assert_eq!(updated[0].key, small);
    assert_eq!(updated[0].stock_quantity, 9);
    assert_eq!(updated[0].cost_per_unit, Some(Decimal::new(1200, 2)));
    assert_eq!(updated[1].stock_quantity, 12);
    assert_eq!(updated[1].cost_per_unit, Some(Decimal::new(1500, 2)));
}

#[tokio::test]
async fn restock_against_unavailable_store_changes_nothing() {
    let (store, _, key) = single_variant(5).await;
    let ledger = InventoryLedger::new(Arc::clone(&store));

    store.set_unavailable(true);
    let err = ledger
        .restock_items(&[RestockEntry {
            key: key.clone(),
            quantity: 3,
            cost_per_unit: None,
        }])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)), "{err:?}");
    store.set_unavailable(false);

    let record = store.get_inventory(&key).await.expect("get").expect("exists");
    assert_eq!(record.stock_quantity, 5);
}

#[tokio::test]
async fn alerts_are_tiered_and_most_severe_first() {
    let store = Arc::new(MemoryStore::new());
    let tee = product("Tee", BasicCategory::Baby, 40);
    // Fixture threshold is 4: 0 is out, 2 is critical, 3 is low, 9 is fine.
    stock_product(&store, &tee, &[("2T", 0, 3), ("2T", 1, 0), ("3T", 0, 2), ("3T", 1, 9)]).await;
    let ledger = InventoryLedger::new(store);

    let alerts = ledger.get_inventory_alerts().await.expect("alerts");
    let tiers: Vec<AlertSeverity> = alerts.iter().map(|a| a.severity).collect();
    assert_eq!(
        tiers,
        vec![
            AlertSeverity::OutOfStock,
            AlertSeverity::Critical,
            AlertSeverity::Low
        ]
    );
}

#[tokio::test]
async fn provision_is_explicit_and_once() {
    let store = Arc::new(MemoryStore::new());
    let tee = product("Tee", BasicCategory::Unisex, 40);
    stock_product(&store, &tee, &[]).await;
    let ledger = InventoryLedger::new(store).with_default_threshold(7);
    let key = VariantKey::new(tee.id, "2T", 0);

    let record = ledger
        .provision(key.clone(), 3, None, None)
        .await
        .expect("provision");
    assert_eq!(record.low_stock_threshold, 7);

    let err = ledger.provision(key, 3, None, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let unknown = VariantKey::new(uuid::Uuid::new_v4(), "2T", 0);
    let err = ledger.provision(unknown, 3, None, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn unreachable_store_degrades_to_unavailable() {
    let (store, _, key) = single_variant(5).await;
    let ledger = InventoryLedger::new(Arc::clone(&store));
    store.set_unavailable(true);

    assert!(matches!(
        ledger.check_availability(&key, 1).await,
        Err(ServiceError::Unavailable(_))
    ));
    assert!(matches!(
        ledger.get_inventory_alerts().await,
        Err(ServiceError::Unavailable(_))
    ));
}

#[tokio::test]
async fn concurrent_reservations_never_oversell() {
    let (store, _, key) = single_variant(5).await;
    let ledger = InventoryLedger::new(Arc::clone(&store));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let ledger = ledger.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            ledger.reserve_stock(&[line(&key, 1)]).await
        }));
    }
    let mut succeeded = 0;
    for handle in handles {
        if handle.await.expect("task panicked").is_ok() {
            succeeded += 1;
        }
    }
    assert_eq!(succeeded, 5);
    let record = store.get_inventory(&key).await.expect("get").expect("exists");
    assert_eq!(record.reserved_quantity, 5);
}

#[tokio::test]
async fn random_operation_sequences_keep_reserved_within_stock() {
    let (store, _, key) = single_variant(10).await;
    let ledger = InventoryLedger::new(Arc::clone(&store));
    let mut rng = rand::rng();

    for _ in 0..300 {
        let qty = rng.random_range(1..=6);
        // Business refusals are expected; only the invariant matters here.
        let _ = match rng.random_range(0..4) {
            0 => ledger.reserve_stock(&[line(&key, qty)]).await.map(|_| ()),
            1 => ledger
                .release_reserved_stock(&[line(&key, qty)])
                .await
                .map(|_| ()),
            2 => ledger
                .update_stock(&key, rng.random_range(0..=20), None)
                .await
                .map(|_| ()),
            _ => ledger
                .restock_items(&[RestockEntry {
                    key: key.clone(),
                    quantity: qty,
                    cost_per_unit: None,
                }])
                .await
                .map(|_| ()),
        };
        let record = store.get_inventory(&key).await.expect("get").expect("exists");
        assert!(record.reserved_quantity >= 0);
        assert!(record.reserved_quantity <= record.stock_quantity);
    }
}
