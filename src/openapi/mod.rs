use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PhoneStore API",
        version = "1.0.0",
        description = r#"
# PhoneStore Back-Office API

Catalog, stock and sales management for a retail shop selling phones and accessories.

## Features

- **Catalog**: Phones with storage/color/condition variants, and accessories with generated SKUs
- **Inventory**: Every stock change is recorded in an append-only movement ledger
- **Point of Sale**: Sales decrement stock atomically and issue numbered invoices
- **Purchasing**: Purchase orders to suppliers, received into stock in one step
- **Reports**: Low stock, profit, best sellers and daily revenue

## Identification

Mutating endpoints record the acting staff member from the optional `x-user-id` header.

## Error Handling

Every failure uses the same body with a stable `kind`:

```json
{
  "error": "Conflict",
  "kind": "insufficient_stock",
  "message": "Insufficient stock: line 1: USB-C Cable has 1, requested 3",
  "timestamp": "2025-01-15T10:30:00Z"
}
```

## Pagination

List endpoints accept `page` (default 1) and `per_page` (default 20, max 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "phones", description = "Phone catalog and variants"),
        (name = "accessories", description = "Accessory catalog"),
        (name = "inventory", description = "Stock adjustments and the movement ledger"),
        (name = "sales", description = "Point-of-sale transactions and invoices"),
        (name = "purchase-orders", description = "Supplier purchase orders"),
        (name = "suppliers", description = "Supplier directory"),
        (name = "customers", description = "Customer directory and purchase history"),
        (name = "reports", description = "Sales and stock reports")
    ),
    paths(
        // Catalog
        crate::handlers::catalog::create_phone,
        crate::handlers::catalog::list_phones,
        crate::handlers::catalog::get_phone,
        crate::handlers::catalog::update_phone,
        crate::handlers::catalog::delete_phone,
        crate::handlers::catalog::add_variant,
        crate::handlers::catalog::deactivate_phone,
        crate::handlers::catalog::create_accessory,
        crate::handlers::catalog::list_accessories,
        crate::handlers::catalog::get_accessory,
        crate::handlers::catalog::update_accessory,
        crate::handlers::catalog::delete_accessory,
        crate::handlers::catalog::deactivate_accessory,

        // Inventory
        crate::handlers::inventory::adjust_stock,
        crate::handlers::inventory::restock,
        crate::handlers::inventory::list_movements,
        crate::handlers::inventory::product_history,

        // Sales
        crate::handlers::sales::create_sale,
        crate::handlers::sales::list_invoices,
        crate::handlers::sales::get_invoice,
        crate::handlers::sales::get_invoice_by_number,
        crate::handlers::sales::cancel_invoice,

        // Purchasing
        crate::handlers::purchase_orders::create_purchase_order,
        crate::handlers::purchase_orders::list_purchase_orders,
        crate::handlers::purchase_orders::get_purchase_order,
        crate::handlers::purchase_orders::order_purchase_order,
        crate::handlers::purchase_orders::receive_purchase_order,
        crate::handlers::purchase_orders::cancel_purchase_order,

        // Directory
        crate::handlers::suppliers::create_supplier,
        crate::handlers::suppliers::list_suppliers,
        crate::handlers::suppliers::get_supplier,
        crate::handlers::suppliers::update_supplier,
        crate::handlers::suppliers::delete_supplier,
        crate::handlers::customers::create_customer,
        crate::handlers::customers::list_customers,
        crate::handlers::customers::search_customers,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::update_customer,

        // Reports
        crate::handlers::reports::low_stock,
        crate::handlers::reports::out_of_stock,
        crate::handlers::reports::profit,
        crate::handlers::reports::top_selling,
        crate::handlers::reports::revenue_by_day,
        crate::handlers::reports::today,
        crate::handlers::reports::dashboard,
        crate::handlers::reports::restock_history,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::ResponseMeta,

            crate::entities::ModelType,
            crate::entities::MovementType,
            crate::entities::PaymentMethod,
            crate::entities::PaymentStatus,
            crate::entities::VariantCondition,
            crate::entities::invoice::InvoiceStatus,
            crate::entities::purchase_order::PurchaseOrderStatus,

            crate::services::catalog::CreatePhone,
            crate::services::catalog::CreateVariant,
            crate::services::catalog::UpdatePhone,
            crate::services::catalog::PhoneSort,
            crate::services::catalog::CreateAccessory,
            crate::services::catalog::UpdateAccessory,
            crate::services::inventory::StockTarget,
            crate::services::inventory::StockAdjustment,
            crate::services::inventory::AdjustStock,
            crate::services::inventory::RestockItem,
            crate::services::inventory::RestockMany,
            crate::services::sales::CartItem,
            crate::services::sales::SalePayment,
            crate::services::sales::CreateSale,
            crate::services::purchase_orders::PurchaseOrderLine,
            crate::services::purchase_orders::CreatePurchaseOrder,
            crate::services::suppliers::CreateSupplier,
            crate::services::suppliers::UpdateSupplier,
            crate::services::customers::CreateCustomer,
            crate::services::customers::UpdateCustomer,
            crate::services::reports::StockAlert,
            crate::services::reports::ProfitSummary,
            crate::services::reports::TopSeller,
            crate::services::reports::DailyRevenue,
            crate::services::reports::TodaySummary,
            crate::services::reports::Dashboard,

            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_resource() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("PhoneStore API"));
        for path in [
            "/api/v1/phones",
            "/api/v1/accessories/{id}",
            "/api/v1/inventory/adjust",
            "/api/v1/sales",
            "/api/v1/invoices/by-number/{invoice_no}",
            "/api/v1/purchase-orders/{id}/receive",
            "/api/v1/suppliers",
            "/api/v1/customers/{id}",
            "/api/v1/reports/low-stock",
        ] {
            assert!(json.contains(path), "missing {path}");
        }
    }
}
