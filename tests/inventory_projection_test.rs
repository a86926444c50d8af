mod common;

use common::{actor, TestLedger};
use rust_decimal_macros::dec;
use stock_ledger::{
    queries::inventory_queries::{
        InventoryStatsQuery, LowStockQuery, OutOfStockQuery, OverstockQuery, Query,
    },
    services::inventory::NewInventoryInput,
};
use uuid::Uuid;

fn input(product_id: Uuid, quantity: i32, min_stock: i32, max_stock: Option<i32>) -> NewInventoryInput {
    NewInventoryInput {
        product_id,
        quantity: Some(quantity),
        min_stock: Some(min_stock),
        max_stock,
        location: None,
    }
}

#[tokio::test]
async fn low_stock_membership_tracks_adjustments() {
    let ledger = TestLedger::new().await;
    let product = ledger.seed_product("SKU-LOW", "Scarce widget", dec!(4.00), true).await;
    ledger
        .service
        .create_inventory(input(product, 20, 10, None))
        .await
        .unwrap();

    let low = LowStockQuery.execute(ledger.db.as_ref()).await.unwrap();
    assert!(!low.iter().any(|(level, _)| level.product_id == product));

    ledger
        .service
        .adjust_stock(product, -12, "cycle count", actor())
        .await
        .unwrap();
    let low = LowStockQuery.execute(ledger.db.as_ref()).await.unwrap();
    assert!(low.iter().any(|(level, _)| level.product_id == product));

    ledger
        .service
        .add_stock(product, 15, Some("restock".to_string()), actor())
        .await
        .unwrap();
    let low = LowStockQuery.execute(ledger.db.as_ref()).await.unwrap();
    assert!(!low.iter().any(|(level, _)| level.product_id == product));
}

#[tokio::test]
async fn low_stock_is_ordered_most_urgent_first() {
    let ledger = TestLedger::new().await;
    let nearly_out = ledger.seed_product("SKU-A", "Nearly out", dec!(1.00), true).await;
    let getting_low = ledger.seed_product("SKU-B", "Getting low", dec!(1.00), true).await;
    ledger
        .service
        .create_inventory(input(nearly_out, 1, 10, None))
        .await
        .unwrap();
    ledger
        .service
        .create_inventory(input(getting_low, 7, 10, None))
        .await
        .unwrap();

    let low = LowStockQuery.execute(ledger.db.as_ref()).await.unwrap();
    let ids: Vec<Uuid> = low.iter().map(|(level, _)| level.product_id).collect();
    assert_eq!(ids, vec![nearly_out, getting_low]);
}

#[tokio::test]
async fn out_of_stock_and_overstock_views() {
    let ledger = TestLedger::new().await;
    let empty = ledger.seed_product("SKU-EMPTY", "Sold out", dec!(2.00), true).await;
    let flooded = ledger.seed_product("SKU-FLOOD", "Overstocked", dec!(2.00), true).await;
    let normal = ledger.seed_product("SKU-NORM", "Healthy", dec!(2.00), true).await;

    ledger.service.create_inventory(input(empty, 0, 5, None)).await.unwrap();
    ledger
        .service
        .create_inventory(input(flooded, 120, 5, Some(100)))
        .await
        .unwrap();
    ledger
        .service
        .create_inventory(input(normal, 50, 5, Some(100)))
        .await
        .unwrap();

    let out = OutOfStockQuery.execute(ledger.db.as_ref()).await.unwrap();
    let out_ids: Vec<Uuid> = out.iter().map(|(level, _)| level.product_id).collect();
    assert_eq!(out_ids, vec![empty]);

    let over = OverstockQuery.execute(ledger.db.as_ref()).await.unwrap();
    let over_ids: Vec<Uuid> = over.iter().map(|(level, _)| level.product_id).collect();
    assert_eq!(over_ids, vec![flooded]);
}

#[tokio::test]
async fn statistics_are_recomputed_from_current_state() {
    let ledger = TestLedger::new().await;
    let cheap = ledger.seed_product("SKU-CHEAP", "Cheap part", dec!(1.50), true).await;
    let pricey = ledger.seed_product("SKU-PRICEY", "Pricey part", dec!(100.00), true).await;
    let empty = ledger.seed_product("SKU-NONE", "Empty part", dec!(10.00), true).await;

    ledger.service.create_inventory(input(cheap, 40, 10, None)).await.unwrap();
    ledger.service.create_inventory(input(pricey, 4, 10, None)).await.unwrap();
    ledger.service.create_inventory(input(empty, 0, 10, None)).await.unwrap();

    let stats = InventoryStatsQuery { top_n: 2 }
        .execute(ledger.db.as_ref())
        .await
        .unwrap();

    assert_eq!(stats.total_products, 3);
    // 40 x 1.50 + 4 x 100.00 + 0 x 10.00
    assert_eq!(stats.total_value, dec!(460.00));
    assert_eq!(stats.low_stock_count, 2); // pricey (4 <= 10) and empty (0 <= 10)
    assert_eq!(stats.out_of_stock_count, 1);
    assert!((stats.average_quantity - 44.0 / 3.0).abs() < 1e-9);

    assert_eq!(stats.top_by_value.len(), 2);
    assert_eq!(stats.top_by_value[0].product_id, pricey);
    assert_eq!(stats.top_by_value[0].total_value, dec!(400.00));
    assert_eq!(stats.top_by_value[1].product_id, cheap);

    // No movements yet: creation baselines are not audited.
    assert!(stats.recent_movements.is_empty());

    // Mutate and recompute; the view must follow the ledger immediately.
    ledger
        .service
        .remove_stock(pricey, 4, None, actor(), Some(Uuid::new_v4()))
        .await
        .unwrap();
    let stats = InventoryStatsQuery { top_n: 2 }
        .execute(ledger.db.as_ref())
        .await
        .unwrap();
    assert_eq!(stats.total_value, dec!(60.00));
    assert_eq!(stats.out_of_stock_count, 2);
    assert_eq!(stats.recent_movements.len(), 1);
    assert_eq!(stats.recent_movements[0].quantity_delta, -4);
}

#[tokio::test]
async fn recent_movements_are_capped_and_newest_first() {
    let ledger = TestLedger::new().await;
    let product = ledger.seed_product("SKU-BUSY", "Busy part", dec!(1.00), true).await;
    ledger.service.create_inventory(input(product, 0, 5, None)).await.unwrap();

    for i in 1..=12 {
        ledger
            .service
            .add_stock(product, i, Some(format!("receipt {i}")), actor())
            .await
            .unwrap();
    }

    let stats = InventoryStatsQuery::default()
        .execute(ledger.db.as_ref())
        .await
        .unwrap();
    assert_eq!(stats.recent_movements.len(), 10);
    assert_eq!(stats.recent_movements[0].quantity, 12);
    assert_eq!(stats.recent_movements[9].quantity, 3);
}
