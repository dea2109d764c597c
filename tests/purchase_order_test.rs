mod common;

use assert_matches::assert_matches;
use common::{dec, TestApp};
use phonestore_api::{
    entities::{purchase_order::PurchaseOrderStatus, ModelType, MovementType},
    errors::ServiceError,
    services::{
        purchase_orders::{CreatePurchaseOrder, PurchaseOrderFilter, PurchaseOrderLine},
        sequence::sequence_component,
    },
};
use uuid::Uuid;

fn accessory_po_line(product_id: Uuid, quantity: i32, unit_cost: &str) -> PurchaseOrderLine {
    PurchaseOrderLine {
        product_id,
        model_type: ModelType::Accessory,
        variant_sku: None,
        quantity,
        unit_cost: dec(unit_cost),
    }
}

fn order(supplier_id: Uuid, items: Vec<PurchaseOrderLine>) -> CreatePurchaseOrder {
    CreatePurchaseOrder {
        supplier_id,
        items,
        notes: None,
    }
}

#[tokio::test]
async fn create_prices_lines_and_numbers_the_order() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Mobile Wholesale").await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 0).await;
    let case = app.seed_accessory("Clear Case", dec("2"), dec("6"), 0).await;
    let buyer = Uuid::new_v4();

    let po = app
        .services()
        .purchase_orders
        .create_po(
            order(
                supplier.id,
                vec![
                    accessory_po_line(cable.accessory.id, 10, "4"),
                    accessory_po_line(case.accessory.id, 4, "2.5"),
                ],
            ),
            Some(buyer),
        )
        .await
        .unwrap();

    assert!(po.purchase_order.po_no.starts_with("PO-"));
    assert_eq!(sequence_component(&po.purchase_order.po_no), Some(1));
    assert_eq!(po.purchase_order.status, PurchaseOrderStatus::Created);
    assert_eq!(po.purchase_order.total_cost, dec("50"));
    assert_eq!(po.purchase_order.created_by, Some(buyer));
    assert_eq!(po.items.len(), 2);
    assert_eq!(po.items[1].line_no, 2);

    let stock = app
        .services()
        .catalog
        .get_accessory(cable.accessory.id)
        .await
        .unwrap()
        .accessory
        .stock;
    assert_eq!(stock, 0);
}

#[tokio::test]
async fn create_rejects_unknown_supplier_and_products() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Mobile Wholesale").await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 0).await;
    let pos = &app.services().purchase_orders;

    let err = pos
        .create_po(
            order(Uuid::new_v4(), vec![accessory_po_line(cable.accessory.id, 1, "4")]),
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let err = pos
        .create_po(
            order(
                supplier.id,
                vec![
                    accessory_po_line(cable.accessory.id, 1, "4"),
                    accessory_po_line(Uuid::new_v4(), 1, "4"),
                ],
            ),
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(ref msg) if msg.starts_with("line 2:"));

    let err = pos
        .create_po(order(supplier.id, vec![]), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let (_, total) = pos
        .list_pos(&PurchaseOrderFilter::default(), 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn receiving_restocks_every_line_and_links_the_supplier() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Mobile Wholesale").await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 2).await;
    let phone = app
        .seed_phone("iPhone 15", &[("128GB", "Black", 1), ("256GB", "Blue", 0)])
        .await;
    let blue = phone.variants.iter().find(|v| v.color == "Blue").unwrap();
    let receiver = Uuid::new_v4();

    let po = app
        .services()
        .purchase_orders
        .create_po(
            order(
                supplier.id,
                vec![
                    accessory_po_line(cable.accessory.id, 10, "4"),
                    PurchaseOrderLine {
                        product_id: phone.phone.id,
                        model_type: ModelType::Phone,
                        variant_sku: Some(blue.sku.clone()),
                        quantity: 3,
                        unit_cost: dec("400"),
                    },
                ],
            ),
            None,
        )
        .await
        .unwrap();
    let po_id = po.purchase_order.id;

    let received = app
        .services()
        .purchase_orders
        .receive_po(po_id, Some(receiver))
        .await
        .unwrap();
    assert_eq!(received.purchase_order.status, PurchaseOrderStatus::Received);
    assert_eq!(received.purchase_order.received_by, Some(receiver));
    assert!(received.purchase_order.received_at.is_some());

    let cable_after = app
        .services()
        .catalog
        .get_accessory(cable.accessory.id)
        .await
        .unwrap();
    assert_eq!(cable_after.accessory.stock, 12);

    let phone_after = app.services().catalog.get_phone(phone.phone.id).await.unwrap();
    let blue_after = phone_after.variants.iter().find(|v| v.id == blue.id).unwrap();
    assert_eq!(blue_after.stock, 3);
    assert_eq!(phone_after.phone.stock, 4);

    let movements = app
        .services()
        .movements
        .movements_for_reference(po_id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 2);
    assert!(movements.iter().all(|m| {
        m.movement_type == MovementType::Restock
            && m.reference == po.purchase_order.po_no
            && m.handled_by == Some(receiver)
    }));

    let details = app.services().suppliers.get_supplier(supplier.id).await.unwrap();
    assert_eq!(details.supplied_products.len(), 2);
    assert!(details
        .supplied_products
        .iter()
        .all(|p| p.last_restock_date == received.purchase_order.received_at));
}

fn phone_po_line(
    product_id: Uuid,
    variant_sku: Option<String>,
    quantity: i32,
) -> PurchaseOrderLine {
    PurchaseOrderLine {
        product_id,
        model_type: ModelType::Phone,
        variant_sku,
        quantity,
        unit_cost: dec("400"),
    }
}

#[tokio::test]
async fn phone_lines_must_settle_their_variant_up_front() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Mobile Wholesale").await;
    let iphone = app
        .seed_phone("iPhone 15", &[("128GB", "Black", 1), ("256GB", "Blue", 0)])
        .await;
    let pixel = app.seed_phone("Pixel 8", &[("128GB", "Obsidian", 2)]).await;
    let pos = &app.services().purchase_orders;

    let err = pos
        .create_po(
            order(supplier.id, vec![phone_po_line(iphone.phone.id, None, 3)]),
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::VariantRequired(ref msg) if msg.starts_with("line 1:"));
    let (_, total) = pos
        .list_pos(&PurchaseOrderFilter::default(), 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 0);

    let po = pos
        .create_po(
            order(supplier.id, vec![phone_po_line(pixel.phone.id, None, 4)]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(
        po.items[0].variant_sku.as_deref(),
        Some(pixel.variants[0].sku.as_str())
    );

    let received = pos.receive_po(po.purchase_order.id, None).await.unwrap();
    assert_eq!(received.purchase_order.status, PurchaseOrderStatus::Received);
    let after = app.services().catalog.get_phone(pixel.phone.id).await.unwrap();
    assert_eq!(after.variants[0].stock, 6);
    assert_eq!(after.phone.stock, 6);
}

#[tokio::test]
async fn receiving_twice_is_rejected_without_double_counting() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Mobile Wholesale").await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 0).await;
    let pos = &app.services().purchase_orders;

    let po = pos
        .create_po(
            order(supplier.id, vec![accessory_po_line(cable.accessory.id, 5, "4")]),
            None,
        )
        .await
        .unwrap();
    pos.receive_po(po.purchase_order.id, None).await.unwrap();

    let err = pos.receive_po(po.purchase_order.id, None).await.unwrap_err();
    assert_matches!(err, ServiceError::AlreadyReceived(_));

    let stock = app
        .services()
        .catalog
        .get_accessory(cable.accessory.id)
        .await
        .unwrap()
        .accessory
        .stock;
    assert_eq!(stock, 5);
}

#[tokio::test]
async fn failed_receipt_leaves_no_trace() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Mobile Wholesale").await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 2).await;
    let glass = app.seed_accessory("Screen Glass", dec("1"), dec("5"), 0).await;
    let pos = &app.services().purchase_orders;

    let po = pos
        .create_po(
            order(
                supplier.id,
                vec![
                    accessory_po_line(cable.accessory.id, 10, "4"),
                    accessory_po_line(glass.accessory.id, 10, "1"),
                ],
            ),
            None,
        )
        .await
        .unwrap();
    app.services()
        .catalog
        .delete_accessory(glass.accessory.id)
        .await
        .unwrap();

    let err = pos.receive_po(po.purchase_order.id, None).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(ref msg) if msg.starts_with("line 2:"));

    let stock = app
        .services()
        .catalog
        .get_accessory(cable.accessory.id)
        .await
        .unwrap()
        .accessory
        .stock;
    assert_eq!(stock, 2);

    let after = pos.get_po(po.purchase_order.id).await.unwrap();
    assert_eq!(after.purchase_order.status, PurchaseOrderStatus::Created);
    assert!(after.purchase_order.received_at.is_none());
    assert!(app
        .services()
        .movements
        .movements_for_reference(po.purchase_order.id)
        .await
        .unwrap()
        .is_empty());

    let details = app.services().suppliers.get_supplier(supplier.id).await.unwrap();
    assert!(details.supplied_products.is_empty());
}

#[tokio::test]
async fn status_transitions_follow_the_lifecycle() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Mobile Wholesale").await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 0).await;
    let pos = &app.services().purchase_orders;

    let first = pos
        .create_po(
            order(supplier.id, vec![accessory_po_line(cable.accessory.id, 1, "4")]),
            None,
        )
        .await
        .unwrap();
    let ordered = pos.mark_ordered(first.purchase_order.id).await.unwrap();
    assert_eq!(ordered.purchase_order.status, PurchaseOrderStatus::Ordered);

    let err = pos.mark_ordered(first.purchase_order.id).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    let cancelled = pos.cancel_po(first.purchase_order.id).await.unwrap();
    assert_eq!(cancelled.purchase_order.status, PurchaseOrderStatus::Cancelled);

    let err = pos.receive_po(first.purchase_order.id, None).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    let second = pos
        .create_po(
            order(supplier.id, vec![accessory_po_line(cable.accessory.id, 2, "4")]),
            None,
        )
        .await
        .unwrap();
    assert!(
        sequence_component(&second.purchase_order.po_no)
            > sequence_component(&first.purchase_order.po_no)
    );
    pos.receive_po(second.purchase_order.id, None).await.unwrap();
    let err = pos.cancel_po(second.purchase_order.id).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    let (received, total) = pos
        .list_pos(
            &PurchaseOrderFilter {
                status: Some(PurchaseOrderStatus::Received),
                ..Default::default()
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(received[0].id, second.purchase_order.id);
}
