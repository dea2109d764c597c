mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use common::{accessory_input, dec, phone_input, read_json, TestApp};
use phonestore_api::{
    entities::ModelType,
    errors::ServiceError,
    services::{
        catalog::CreatePhone,
        customers::{CustomerSearch, UpdateCustomer},
        purchase_orders::{CreatePurchaseOrder, PurchaseOrderLine},
        suppliers::UpdateSupplier,
    },
};
use serde_json::json;
use uuid::Uuid;

fn search(q: &str) -> CustomerSearch {
    CustomerSearch {
        q: q.to_string(),
        limit: None,
    }
}

#[tokio::test]
async fn customer_update_keeps_phone_numbers_unique() {
    let app = TestApp::new().await;
    let dara = app.seed_customer("Dara", "012345678").await;
    app.seed_customer("Sokha", "098765432").await;
    let customers = &app.services().customers;

    let updated = customers
        .update_customer(
            dara.id,
            UpdateCustomer {
                address: Some("St. 271, Phnom Penh".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Dara");
    assert_eq!(updated.phone.as_deref(), Some("012345678"));
    assert_eq!(updated.address.as_deref(), Some("St. 271, Phnom Penh"));

    let err = customers
        .update_customer(
            dara.id,
            UpdateCustomer {
                phone: Some("098765432".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    // Re-saving its own number is not a clash.
    customers
        .update_customer(
            dara.id,
            UpdateCustomer {
                phone: Some("012345678".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = customers
        .update_customer(Uuid::new_v4(), UpdateCustomer::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn customer_search_matches_name_or_phone() {
    let app = TestApp::new().await;
    app.seed_customer("Dara Chan", "012345678").await;
    app.seed_customer("Sokha Dara", "098765432").await;
    app.seed_customer("Vanna", "011222333").await;
    let customers = &app.services().customers;

    let by_name = customers.search_customers(&search("dara")).await.unwrap();
    let names: Vec<&str> = by_name.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Dara Chan", "Sokha Dara"]);

    let by_phone = customers.search_customers(&search("1222")).await.unwrap();
    assert_eq!(by_phone.len(), 1);
    assert_eq!(by_phone[0].name, "Vanna");

    let limited = customers
        .search_customers(&CustomerSearch {
            q: "a".to_string(),
            limit: Some(2),
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);

    let err = customers.search_customers(&search("  ")).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn supplier_update_changes_only_given_fields() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Mobile Wholesale").await;

    let updated = app
        .services()
        .suppliers
        .update_supplier(
            supplier.id,
            UpdateSupplier {
                contact_person: Some("Bopha".to_string()),
                email: Some("orders@mobile-wholesale.test".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Mobile Wholesale");
    assert_eq!(updated.contact_person.as_deref(), Some("Bopha"));
    assert_eq!(
        updated.email.as_deref(),
        Some("orders@mobile-wholesale.test")
    );

    let err = app
        .services()
        .suppliers
        .update_supplier(
            supplier.id,
            UpdateSupplier {
                email: Some("not-an-email".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn deleting_a_supplier_drops_its_links() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Mobile Wholesale").await;
    let catalog = &app.services().catalog;

    let phone = catalog
        .create_phone(
            CreatePhone {
                supplier_id: Some(supplier.id),
                ..phone_input("Oppo", "Reno 11")
            },
            None,
        )
        .await
        .unwrap();
    let mut cable = accessory_input("USB-C Cable", dec("4"), dec("10"), 3);
    cable.supplier_id = Some(supplier.id);
    let cable = catalog.create_accessory(cable, None).await.unwrap();

    let details = app.services().suppliers.get_supplier(supplier.id).await.unwrap();
    assert_eq!(details.supplied_products.len(), 2);

    app.services()
        .suppliers
        .delete_supplier(supplier.id)
        .await
        .unwrap();

    let err = app
        .services()
        .suppliers
        .get_supplier(supplier.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let phone_after = catalog.get_phone(phone.phone.id).await.unwrap();
    assert_eq!(phone_after.phone.supplier_id, None);
    let cable_after = catalog.get_accessory(cable.accessory.id).await.unwrap();
    assert_eq!(cable_after.accessory.supplier_id, None);
    assert_eq!(cable_after.accessory.stock, 3);

    let err = app
        .services()
        .suppliers
        .delete_supplier(supplier.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn supplier_with_open_orders_cannot_be_deleted() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Mobile Wholesale").await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 0).await;
    let pos = &app.services().purchase_orders;

    let po = pos
        .create_po(
            CreatePurchaseOrder {
                supplier_id: supplier.id,
                items: vec![PurchaseOrderLine {
                    product_id: cable.accessory.id,
                    model_type: ModelType::Accessory,
                    variant_sku: None,
                    quantity: 5,
                    unit_cost: dec("4"),
                }],
                notes: None,
            },
            None,
        )
        .await
        .unwrap();

    let err = app
        .services()
        .suppliers
        .delete_supplier(supplier.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    pos.cancel_po(po.purchase_order.id).await.unwrap();
    app.services()
        .suppliers
        .delete_supplier(supplier.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn directory_routes_over_http() {
    let app = TestApp::new().await;
    let dara = app.seed_customer("Dara", "012345678").await;
    let supplier = app.seed_supplier("Mobile Wholesale").await;

    let response = app
        .request(Method::GET, "/api/v1/customers/search?q=0123", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["id"], dara.id.to_string());

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/customers/{}", dara.id),
            Some(json!({ "email": "dara@example.com" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["data"]["email"], "dara@example.com");

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/suppliers/{}", supplier.id),
            Some(json!({ "phone": "023 888 999" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["data"]["phone"], "023 888 999");

    let uri = format!("/api/v1/suppliers/{}", supplier.id);
    let response = app.request(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.request(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
