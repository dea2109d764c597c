// Stock core
pub mod inventory;
pub mod sequence;
pub mod stock_movements;

// Point of sale
pub mod pricing;
pub mod sales;

// Procurement
pub mod purchase_orders;
pub mod suppliers;

// Catalog and parties
pub mod catalog;
pub mod customers;

// Analytics and Reporting
pub mod reports;
