pub mod catalog;
pub mod common;
pub mod customers;
pub mod inventory;
pub mod purchase_orders;
pub mod reports;
pub mod sales;
pub mod suppliers;

use crate::{
    config::AppConfig,
    events::EventSender,
    middleware_helpers::RetryConfig,
    services::{
        catalog::CatalogService, customers::CustomerService, inventory::InventoryService,
        purchase_orders::PurchaseOrderService, reports::ReportService, sales::SalesService,
        sequence::SequenceService, stock_movements::StockMovementService,
        suppliers::SupplierService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub inventory: Arc<InventoryService>,
    pub movements: Arc<StockMovementService>,
    pub sales: Arc<SalesService>,
    pub purchase_orders: Arc<PurchaseOrderService>,
    pub suppliers: Arc<SupplierService>,
    pub customers: Arc<CustomerService>,
    pub reports: Arc<ReportService>,
    pub sequences: Arc<SequenceService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender, config: &AppConfig) -> Self {
        let retry = RetryConfig::with_max_attempts(config.stock_conflict_retries);
        let sequences = SequenceService::new(db.clone());

        Self {
            catalog: Arc::new(CatalogService::new(
                db.clone(),
                event_sender.clone(),
                config.default_currency.clone(),
            )),
            inventory: Arc::new(InventoryService::new(
                db.clone(),
                event_sender.clone(),
                retry.clone(),
            )),
            movements: Arc::new(StockMovementService::new(db.clone())),
            sales: Arc::new(SalesService::new(
                db.clone(),
                sequences.clone(),
                event_sender.clone(),
                retry.clone(),
            )),
            purchase_orders: Arc::new(PurchaseOrderService::new(
                db.clone(),
                sequences.clone(),
                event_sender,
                retry,
            )),
            suppliers: Arc::new(SupplierService::new(db.clone())),
            customers: Arc::new(CustomerService::new(db.clone())),
            reports: Arc::new(ReportService::new(db)),
            sequences: Arc::new(sequences),
        }
    }
}
