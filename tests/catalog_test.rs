mod common;

use assert_matches::assert_matches;
use common::{accessory_input, dec, phone_input, variant_input, TestApp};
use phonestore_api::{
    entities::{ModelType, MovementType},
    errors::ServiceError,
    services::catalog::{
        AccessoryFilter, CreatePhone, PhoneFilter, PhoneSort, UpdateAccessory, UpdatePhone,
    },
};
use uuid::Uuid;

#[tokio::test]
async fn phone_gets_slug_and_variant_skus() {
    let app = TestApp::new().await;
    let phone = app
        .seed_phone("iPhone 15 Pro", &[("128GB", "Black Titanium", 2), ("256GB", "White", 1)])
        .await;

    assert_eq!(phone.phone.slug, "apple-iphone-15-pro");
    assert_eq!(phone.phone.stock, 3);
    assert_eq!(phone.phone.currency, "USD");
    assert_eq!(phone.variants.len(), 2);
    let skus: Vec<&str> = phone.variants.iter().map(|v| v.sku.as_str()).collect();
    assert!(skus.contains(&"APP-IPHON-128GB-BLAC-NC"));
    assert!(skus.contains(&"APP-IPHON-256GB-WHIT-NC"));
    assert!(!phone.is_out_of_stock);
}

#[tokio::test]
async fn duplicate_slug_and_variant_sku_conflict() {
    let app = TestApp::new().await;
    app.seed_phone("Galaxy S24", &[("256GB", "Gray", 1)]).await;
    let catalog = &app.services().catalog;

    let err = catalog
        .create_phone(phone_input("Apple", "Galaxy S24"), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let twins = CreatePhone {
        variants: vec![
            variant_input("128GB", "Black", 1),
            variant_input("128GB", "Black", 1),
        ],
        ..phone_input("Xiaomi", "14")
    };
    let err = catalog.create_phone(twins, None).await.unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let (_, total) = catalog
        .list_phones(&PhoneFilter::default(), 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn product_stock_with_variants_is_rejected() {
    let app = TestApp::new().await;
    let input = CreatePhone {
        stock: 4,
        variants: vec![variant_input("128GB", "Black", 1)],
        ..phone_input("Google", "Pixel 8")
    };

    let err = app
        .services()
        .catalog
        .create_phone(input, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn phone_without_variants_holds_its_own_stock() {
    let app = TestApp::new().await;
    let input = CreatePhone {
        stock: 3,
        ..phone_input("Nokia", "3310")
    };

    let phone = app.services().catalog.create_phone(input, None).await.unwrap();
    assert!(phone.variants.is_empty());
    assert_eq!(phone.phone.stock, 3);
    assert!(phone.is_low_stock);

    let history = app
        .services()
        .movements
        .product_history(phone.phone.id, Some(MovementType::Initial), 5)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].variant_id, None);
    assert_eq!(history[0].new_stock, 3);
}

#[tokio::test]
async fn added_variant_folds_into_phone_stock() {
    let app = TestApp::new().await;
    let phone = app.seed_phone("iPhone 15", &[("128GB", "Black", 2)]).await;
    let catalog = &app.services().catalog;

    let updated = catalog
        .add_variant(phone.phone.id, variant_input("512GB", "Pink", 4), None)
        .await
        .unwrap();
    assert_eq!(updated.variants.len(), 2);
    assert_eq!(updated.phone.stock, 6);

    let err = catalog
        .add_variant(phone.phone.id, variant_input("512GB", "Pink", 1), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let err = catalog
        .add_variant(Uuid::new_v4(), variant_input("64GB", "Red", 1), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn variant_cannot_be_added_over_unvarianted_stock() {
    let app = TestApp::new().await;
    let phone = app
        .services()
        .catalog
        .create_phone(
            CreatePhone {
                stock: 2,
                ..phone_input("Nokia", "3310")
            },
            None,
        )
        .await
        .unwrap();

    let err = app
        .services()
        .catalog
        .add_variant(phone.phone.id, variant_input("16MB", "Blue", 1), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn phone_filters_and_sorting() {
    let app = TestApp::new().await;
    let catalog = &app.services().catalog;
    for (brand, model, price) in [
        ("Apple", "iPhone 15", "900"),
        ("Samsung", "Galaxy A15", "200"),
        ("Samsung", "Galaxy S24", "800"),
    ] {
        let mut input = phone_input(brand, model);
        input.selling_price = dec(price);
        catalog.create_phone(input, None).await.unwrap();
    }

    let (samsungs, total) = catalog
        .list_phones(
            &PhoneFilter {
                brand: Some("Samsung".to_string()),
                sort: Some(PhoneSort::PriceAsc),
                ..Default::default()
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(samsungs[0].model, "Galaxy A15");

    let (matches, _) = catalog
        .list_phones(
            &PhoneFilter {
                q: Some("S24".to_string()),
                ..Default::default()
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);

    let (pricey, _) = catalog
        .list_phones(
            &PhoneFilter {
                min_price: Some(dec("500")),
                sort: Some(PhoneSort::PriceDesc),
                ..Default::default()
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(pricey.len(), 2);
    assert_eq!(pricey[0].brand, "Apple");
}

#[tokio::test]
async fn changing_supplier_moves_the_back_reference() {
    let app = TestApp::new().await;
    let first = app.seed_supplier("First Distribution").await;
    let second = app.seed_supplier("Second Distribution").await;
    let catalog = &app.services().catalog;

    let phone = catalog
        .create_phone(
            CreatePhone {
                supplier_id: Some(first.id),
                ..phone_input("Oppo", "Reno 11")
            },
            None,
        )
        .await
        .unwrap();
    let linked = app.services().suppliers.get_supplier(first.id).await.unwrap();
    assert_eq!(linked.supplied_products.len(), 1);
    assert_eq!(linked.supplied_products[0].model_type, ModelType::Phone);

    catalog
        .update_phone(
            phone.phone.id,
            UpdatePhone {
                supplier_id: Some(Some(second.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let first_after = app.services().suppliers.get_supplier(first.id).await.unwrap();
    let second_after = app.services().suppliers.get_supplier(second.id).await.unwrap();
    assert!(first_after.supplied_products.is_empty());
    assert_eq!(second_after.supplied_products.len(), 1);
    assert_eq!(second_after.supplied_products[0].product_id, phone.phone.id);

    catalog.delete_phone(phone.phone.id).await.unwrap();
    let second_final = app.services().suppliers.get_supplier(second.id).await.unwrap();
    assert!(second_final.supplied_products.is_empty());
    let err = catalog.get_phone(phone.phone.id).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn accessory_sku_is_generated_or_checked() {
    let app = TestApp::new().await;
    let catalog = &app.services().catalog;

    let generated = app.seed_accessory("Fast Charger", dec("5"), dec("15"), 0).await;
    assert!(generated.accessory.sku.starts_with("ACC-FAST-CABL-"));
    assert_eq!(generated.accessory.low_stock_threshold, 10);
    assert!(generated.is_out_of_stock);

    let mut explicit = accessory_input("Magsafe Case", dec("6"), dec("20"), 3);
    explicit.sku = Some("case-001".to_string());
    let created = catalog.create_accessory(explicit.clone(), None).await.unwrap();
    assert_eq!(created.accessory.sku, "CASE-001");

    let err = catalog.create_accessory(explicit, None).await.unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn accessory_update_deactivate_and_delete() {
    let app = TestApp::new().await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 5).await;
    let catalog = &app.services().catalog;
    let id = cable.accessory.id;

    let updated = catalog
        .update_accessory(
            id,
            UpdateAccessory {
                selling_price: Some(dec("12")),
                low_stock_threshold: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.accessory.selling_price, dec("12"));
    assert_eq!(updated.accessory.stock, 5);
    assert!(updated.is_low_stock);

    let deactivated = catalog.deactivate_accessory(id).await.unwrap();
    assert!(!deactivated.accessory.is_active);
    let (active, _) = catalog
        .list_accessories(
            &AccessoryFilter {
                is_active: Some(true),
                ..Default::default()
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert!(active.is_empty());

    catalog.delete_accessory(id).await.unwrap();
    let err = catalog.delete_accessory(id).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
    // Ledger entries outlive the product.
    let history = app
        .services()
        .movements
        .product_history(id, None, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}
