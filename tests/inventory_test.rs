mod common;

use assert_matches::assert_matches;
use common::{dec, TestApp};
use phonestore_api::{
    entities::{accessory, phone_variant, ModelType, MovementType},
    errors::ServiceError,
    services::{
        inventory::{AdjustStock, RestockItem, RestockMany},
        stock_movements::MovementFilter,
    },
};
use proptest::prelude::*;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

fn adjustment(
    product_id: Uuid,
    model_type: ModelType,
    variant_id: Option<Uuid>,
    delta: i32,
) -> AdjustStock {
    AdjustStock {
        product_id,
        model_type,
        variant_id,
        delta,
        movement_type: MovementType::Adjustment,
        reference: None,
        note: None,
    }
}

fn restock_item(
    product_id: Uuid,
    model_type: ModelType,
    variant_id: Option<Uuid>,
    quantity: i32,
) -> RestockItem {
    RestockItem {
        product_id,
        model_type,
        variant_id,
        quantity,
    }
}

async fn movement_count(app: &TestApp, product_id: Uuid) -> u64 {
    let filter = MovementFilter {
        product_id: Some(product_id),
        ..Default::default()
    };
    let (_, total) = app
        .services()
        .movements
        .list_movements(&filter, 1, 1)
        .await
        .expect("list movements");
    total
}

#[tokio::test]
async fn initial_stock_is_recorded_in_the_ledger() {
    let app = TestApp::new().await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 7).await;

    let history = app
        .services()
        .movements
        .product_history(cable.accessory.id, None, 10)
        .await
        .unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].movement_type, MovementType::Initial);
    assert_eq!(history[0].previous_stock, 0);
    assert_eq!(history[0].new_stock, 7);
    assert_eq!(history[0].quantity, 7);
}

#[tokio::test]
async fn adjustment_writes_exactly_one_movement() {
    let app = TestApp::new().await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 5).await;
    let id = cable.accessory.id;
    let staff = Uuid::new_v4();

    let result = app
        .services()
        .inventory
        .adjust_stock(adjustment(id, ModelType::Accessory, None, -2), Some(staff))
        .await
        .unwrap();

    assert_eq!(result.previous_stock, 5);
    assert_eq!(result.new_stock, 3);
    assert_eq!(movement_count(&app, id).await, 2);

    let history = app
        .services()
        .movements
        .product_history(id, Some(MovementType::Adjustment), 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, result.movement_id);
    assert_eq!(history[0].quantity, 2);
    assert_eq!(history[0].reference, "manual_adjustment");
    assert_eq!(history[0].handled_by, Some(staff));
}

#[tokio::test]
async fn adjustment_cannot_take_stock_below_zero() {
    let app = TestApp::new().await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 2).await;
    let id = cable.accessory.id;

    let err = app
        .services()
        .inventory
        .adjust_stock(adjustment(id, ModelType::Accessory, None, -3), None)
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ServiceError::InsufficientStock(ref msg) if msg.contains("has 2, requested 3")
    );
    let after = app.services().catalog.get_accessory(id).await.unwrap();
    assert_eq!(after.accessory.stock, 2);
    assert_eq!(movement_count(&app, id).await, 1);
}

#[tokio::test]
async fn adjustment_input_is_validated() {
    let app = TestApp::new().await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 2).await;
    let id = cable.accessory.id;
    let inventory = &app.services().inventory;

    let err = inventory
        .adjust_stock(adjustment(id, ModelType::Accessory, None, 0), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let mut as_sale = adjustment(id, ModelType::Accessory, None, -1);
    as_sale.movement_type = MovementType::Sale;
    let err = inventory.adjust_stock(as_sale, None).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = inventory
        .adjust_stock(adjustment(id, ModelType::Accessory, Some(Uuid::new_v4()), 1), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = inventory
        .adjust_stock(adjustment(Uuid::new_v4(), ModelType::Phone, None, 1), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn variant_adjustment_keeps_phone_total_in_sync() {
    let app = TestApp::new().await;
    let phone = app
        .seed_phone("iPhone 15", &[("128GB", "Black", 3), ("256GB", "Blue", 2)])
        .await;
    let phone_id = phone.phone.id;
    let blue = phone.variants.iter().find(|v| v.color == "Blue").unwrap().id;

    let result = app
        .services()
        .inventory
        .adjust_stock(adjustment(phone_id, ModelType::Phone, Some(blue), 4), None)
        .await
        .unwrap();
    assert_eq!(result.variant_id, Some(blue));
    assert_eq!(result.previous_stock, 2);
    assert_eq!(result.new_stock, 6);
    assert_eq!(result.product_stock, 9);

    let after = app.services().catalog.get_phone(phone_id).await.unwrap();
    let sum: i32 = after.variants.iter().map(|v| v.stock).sum();
    assert_eq!(after.phone.stock, sum);
    assert_eq!(after.phone.stock, 9);
}

#[tokio::test]
async fn adjusting_multi_variant_phone_requires_variant() {
    let app = TestApp::new().await;
    let phone = app
        .seed_phone("iPhone 15", &[("128GB", "Black", 3), ("256GB", "Blue", 2)])
        .await;

    let err = app
        .services()
        .inventory
        .adjust_stock(adjustment(phone.phone.id, ModelType::Phone, None, 1), None)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::VariantRequired(_));
}

#[tokio::test]
async fn restock_many_is_all_or_nothing() {
    let app = TestApp::new().await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 1).await;
    let id = cable.accessory.id;

    let err = app
        .services()
        .inventory
        .restock_many(
            RestockMany {
                items: vec![
                    restock_item(id, ModelType::Accessory, None, 5),
                    restock_item(Uuid::new_v4(), ModelType::Accessory, None, 5),
                ],
                supplier_id: None,
                note: None,
            },
            None,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(ref msg) if msg.starts_with("line 2:"));
    let after = app.services().catalog.get_accessory(id).await.unwrap();
    assert_eq!(after.accessory.stock, 1);
    assert_eq!(movement_count(&app, id).await, 1);
}

#[tokio::test]
async fn restock_from_supplier_links_products() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Mobile Wholesale").await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 1).await;
    let phone = app.seed_phone("iPhone 15", &[("128GB", "Black", 0)]).await;

    let adjustments = app
        .services()
        .inventory
        .restock_many(
            RestockMany {
                items: vec![
                    restock_item(cable.accessory.id, ModelType::Accessory, None, 9),
                    restock_item(phone.phone.id, ModelType::Phone, None, 2),
                ],
                supplier_id: Some(supplier.id),
                note: Some("weekly delivery".to_string()),
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(adjustments.len(), 2);
    assert_eq!(adjustments[0].new_stock, 10);
    assert_eq!(adjustments[1].variant_id, Some(phone.variants[0].id));
    assert_eq!(adjustments[1].product_stock, 2);

    let details = app.services().suppliers.get_supplier(supplier.id).await.unwrap();
    assert_eq!(details.supplied_products.len(), 2);
    assert!(details
        .supplied_products
        .iter()
        .all(|p| p.last_restock_date.is_some()));

    let history = app
        .services()
        .movements
        .product_history(cable.accessory.id, Some(MovementType::Restock), 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].reference, "supplier_restock");
    assert_eq!(history[0].reference_id, Some(supplier.id));
}

#[tokio::test]
async fn restock_from_unknown_supplier_is_rejected() {
    let app = TestApp::new().await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 1).await;

    let err = app
        .services()
        .inventory
        .restock_many(
            RestockMany {
                items: vec![restock_item(cable.accessory.id, ModelType::Accessory, None, 3)],
                supplier_id: Some(Uuid::new_v4()),
                note: None,
            },
            None,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn movement_filters_narrow_the_ledger() {
    let app = TestApp::new().await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 5).await;
    let case = app.seed_accessory("Clear Case", dec("2"), dec("6"), 5).await;
    app.services()
        .inventory
        .adjust_stock(adjustment(cable.accessory.id, ModelType::Accessory, None, 1), None)
        .await
        .unwrap();

    let movements = &app.services().movements;
    let (all, total) = movements
        .list_movements(&MovementFilter::default(), 1, 50)
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(all.len(), 3);

    let (adjustments, total) = movements
        .list_movements(
            &MovementFilter {
                movement_type: Some(MovementType::Adjustment),
                ..Default::default()
            },
            1,
            50,
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(adjustments[0].product_id, cable.accessory.id);

    let (page, total) = movements
        .list_movements(&MovementFilter::default(), 2, 2)
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(page.len(), 1);

    let case_history = movements
        .product_history(case.accessory.id, None, 10)
        .await
        .unwrap();
    assert_eq!(case_history.len(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn ledger_and_variant_totals_stay_consistent(
        deltas in proptest::collection::vec((0usize..2, -4i32..5), 1..12)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let app = TestApp::new().await;
            let phone = app
                .seed_phone("Pixel 8", &[("128GB", "Obsidian", 2), ("256GB", "Hazel", 2)])
                .await;
            let phone_id = phone.phone.id;
            let variant_ids: Vec<Uuid> = phone.variants.iter().map(|v| v.id).collect();

            let mut expected = [2i32, 2];
            let mut applied = 0u64;
            for (idx, delta) in deltas {
                let result = app
                    .services()
                    .inventory
                    .adjust_stock(
                        adjustment(phone_id, ModelType::Phone, Some(variant_ids[idx]), delta),
                        None,
                    )
                    .await;
                match result {
                    Ok(_) => {
                        expected[idx] += delta;
                        applied += 1;
                    }
                    Err(ServiceError::ValidationError(_)) => assert_eq!(delta, 0),
                    Err(ServiceError::InsufficientStock(_)) => {
                        assert!(expected[idx] + delta < 0)
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }

            let after = app.services().catalog.get_phone(phone_id).await.unwrap();
            for (variant, want) in variant_ids.iter().zip(expected) {
                let stock = after.variants.iter().find(|v| v.id == *variant).unwrap().stock;
                assert_eq!(stock, want);
                assert!(stock >= 0);
            }
            assert_eq!(after.phone.stock, expected.iter().sum::<i32>());
            // Two opening movements plus one per applied adjustment.
            assert_eq!(movement_count(&app, phone_id).await, 2 + applied);
        });
    }
}

#[tokio::test]
async fn out_of_range_deltas_are_rejected() {
    let app = TestApp::new().await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 5).await;
    let id = cable.accessory.id;
    let inventory = &app.services().inventory;

    for delta in [i32::MAX, i32::MIN, 1_000_001] {
        let err = inventory
            .adjust_stock(adjustment(id, ModelType::Accessory, None, delta), None)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    let err = inventory
        .restock_many(
            RestockMany {
                items: vec![restock_item(id, ModelType::Accessory, None, i32::MAX)],
                supplier_id: None,
                note: None,
            },
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(ref msg) if msg.starts_with("line 1:"));

    let stock = app.services().catalog.get_accessory(id).await.unwrap().accessory.stock;
    assert_eq!(stock, 5);
    assert_eq!(movement_count(&app, id).await, 1);
}

#[tokio::test]
async fn stock_near_the_column_limit_does_not_overflow() {
    let app = TestApp::new().await;
    let db = &*app.state.db;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 5).await;
    let phone = app
        .seed_phone("iPhone 15", &[("128GB", "Black", 0), ("256GB", "Blue", 0)])
        .await;
    let black = phone.variants.iter().find(|v| v.color == "Black").unwrap();
    let blue = phone.variants.iter().find(|v| v.color == "Blue").unwrap();

    accessory::Entity::update_many()
        .col_expr(accessory::Column::Stock, Expr::value(i32::MAX - 10))
        .filter(accessory::Column::Id.eq(cable.accessory.id))
        .exec(db)
        .await
        .unwrap();
    phone_variant::Entity::update_many()
        .col_expr(phone_variant::Column::Stock, Expr::value(i32::MAX - 10))
        .filter(phone_variant::Column::Id.eq(black.id))
        .exec(db)
        .await
        .unwrap();

    let inventory = &app.services().inventory;
    let err = inventory
        .adjust_stock(
            adjustment(cable.accessory.id, ModelType::Accessory, None, 100),
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // Blue alone fits, but the phone total would not.
    let err = inventory
        .adjust_stock(
            adjustment(phone.phone.id, ModelType::Phone, Some(blue.id), 100),
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let cable_after = app
        .services()
        .catalog
        .get_accessory(cable.accessory.id)
        .await
        .unwrap();
    assert_eq!(cable_after.accessory.stock, i32::MAX - 10);
    let phone_after = app.services().catalog.get_phone(phone.phone.id).await.unwrap();
    let blue_after = phone_after.variants.iter().find(|v| v.id == blue.id).unwrap();
    assert_eq!(blue_after.stock, 0);
    assert_eq!(movement_count(&app, phone.phone.id).await, 0);
}
