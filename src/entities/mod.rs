pub mod shared;

// Catalog
pub mod accessory;
pub mod phone;
pub mod phone_variant;

// Parties
pub mod customer;
pub mod customer_purchase;
pub mod supplied_product;
pub mod supplier;

// Sales
pub mod invoice;
pub mod invoice_item;
pub mod seller_sale;

// Inventory
pub mod counter;
pub mod stock_movement;

// Procurement
pub mod purchase_order;
pub mod purchase_order_item;

pub use shared::{ModelType, MovementType, PaymentMethod, PaymentStatus, VariantCondition};
