mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::{accessory_line, cash_sale, dec, phone_line, TestApp};
use phonestore_api::{
    entities::ModelType,
    errors::ServiceError,
    services::{
        inventory::{RestockItem, RestockMany},
        reports::ReportRange,
    },
};
use rust_decimal::Decimal;

#[tokio::test]
async fn low_and_out_of_stock_lists() {
    let app = TestApp::new().await;
    let low = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 3).await;
    let empty = app.seed_accessory("Screen Glass", dec("1"), dec("5"), 0).await;
    let plenty = app.seed_accessory("Clear Case", dec("2"), dec("6"), 50).await;
    let phone = app.seed_phone("iPhone 15", &[("128GB", "Black", 2)]).await;
    let reports = &app.services().reports;

    let low_stock = reports.low_stock().await.unwrap();
    let ids: Vec<_> = low_stock.iter().map(|a| a.product_id).collect();
    assert_eq!(low_stock.len(), 2);
    assert!(ids.contains(&low.accessory.id));
    assert!(ids.contains(&phone.phone.id));
    assert!(!ids.contains(&plenty.accessory.id));

    let out = reports.out_of_stock().await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].product_id, empty.accessory.id);
    assert_eq!(out[0].model_type, ModelType::Accessory);

    app.services()
        .catalog
        .deactivate_accessory(empty.accessory.id)
        .await
        .unwrap();
    assert!(reports.out_of_stock().await.unwrap().is_empty());
}

#[tokio::test]
async fn profit_and_top_sellers_follow_completed_invoices() {
    let app = TestApp::new().await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 20).await;
    let case = app.seed_accessory("Clear Case", dec("2"), dec("6"), 20).await;
    let phone = app.seed_phone("iPhone 15", &[("128GB", "Black", 5)]).await;
    let sales = &app.services().sales;

    sales
        .create_sale(
            cash_sale(
                vec![
                    accessory_line(cable.accessory.id, 3),
                    phone_line(phone.phone.id, None, 1),
                ],
                "530",
            ),
            None,
        )
        .await
        .unwrap();
    let mut discounted = cash_sale(vec![accessory_line(case.accessory.id, 5)], "28");
    discounted.discount = dec("2");
    sales.create_sale(discounted, None).await.unwrap();
    let cancelled = sales
        .create_sale(cash_sale(vec![accessory_line(cable.accessory.id, 10)], "100"), None)
        .await
        .unwrap();
    sales.cancel_invoice(cancelled.invoice.id, None).await.unwrap();

    let reports = &app.services().reports;
    let profit = reports.profit_summary(None, None).await.unwrap();
    assert_eq!(profit.invoice_count, 2);
    assert_eq!(profit.revenue, dec("560"));
    assert_eq!(profit.cost, dec("422"));
    assert_eq!(profit.gross_profit, dec("138"));
    assert_eq!(profit.discounts, dec("2"));
    assert_eq!(profit.taxes, Decimal::ZERO);
    assert_eq!(profit.net_sales, dec("558"));

    let top = reports.top_selling(&ReportRange::default()).await.unwrap();
    assert_eq!(top.len(), 3);
    assert_eq!(top[0].product_id, case.accessory.id);
    assert_eq!(top[0].quantity_sold, 5);
    assert_eq!(top[1].product_id, cable.accessory.id);
    assert_eq!(top[1].quantity_sold, 3);
    assert_eq!(top[2].model_type, ModelType::Phone);

    let limited = reports
        .top_selling(&ReportRange {
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn today_and_daily_revenue() {
    let app = TestApp::new().await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 20).await;
    let sales = &app.services().sales;
    for quantity in [1, 2] {
        sales
            .create_sale(
                cash_sale(vec![accessory_line(cable.accessory.id, quantity)], "100"),
                None,
            )
            .await
            .unwrap();
    }

    let now = Utc::now();
    let reports = &app.services().reports;
    let today = reports.today_summary(now).await.unwrap();
    assert_eq!(today.date, now.date_naive());
    assert_eq!(today.invoice_count, 2);
    assert_eq!(today.items_sold, 3);
    assert_eq!(today.revenue, dec("30"));

    let yesterday = reports
        .today_summary(now - Duration::days(1))
        .await
        .unwrap();
    assert_eq!(yesterday.invoice_count, 0);

    let days = reports
        .revenue_by_day(now - Duration::days(7), now + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].invoice_count, 2);
    assert_eq!(days[0].total, dec("30"));

    let err = reports.revenue_by_day(now, now).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn dashboard_counts_and_restock_history() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Mobile Wholesale").await;
    app.seed_customer("Dara", "012345678").await;
    let cable = app.seed_accessory("USB-C Cable", dec("4"), dec("10"), 2).await;
    app.seed_accessory("Screen Glass", dec("1"), dec("5"), 0).await;
    app.seed_phone("iPhone 15", &[("128GB", "Black", 30)]).await;

    let dashboard = app.services().reports.dashboard().await.unwrap();
    assert_eq!(dashboard.phones, 1);
    assert_eq!(dashboard.accessories, 2);
    assert_eq!(dashboard.suppliers, 1);
    assert_eq!(dashboard.customers, 1);
    assert_eq!(dashboard.low_stock, 1);
    assert_eq!(dashboard.out_of_stock, 1);

    app.services()
        .inventory
        .restock_many(
            RestockMany {
                items: vec![RestockItem {
                    product_id: cable.accessory.id,
                    model_type: ModelType::Accessory,
                    variant_id: None,
                    quantity: 20,
                }],
                supplier_id: Some(supplier.id),
                note: None,
            },
            None,
        )
        .await
        .unwrap();

    let history = app
        .services()
        .reports
        .restock_history(&ReportRange::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].product_id, cable.accessory.id);
    assert_eq!(history[0].quantity, 20);
}
