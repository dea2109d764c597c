use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accessories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub accessory_type: String,
    pub brand: Option<String>,
    #[sea_orm(unique)]
    pub sku: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub purchase_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub selling_price: Decimal,
    pub currency: String,
    #[sea_orm(column_type = "Json")]
    pub images: Json,
    /// Slugs of compatible phones
    #[sea_orm(column_type = "Json")]
    pub compatibility: Json,
    #[sea_orm(column_type = "Json")]
    pub attributes: Json,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub stock: i32,
    pub low_stock_threshold: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_low_stock(&self) -> bool {
        super::shared::is_low_stock(self.stock, self.low_stock_threshold)
    }

    pub fn is_out_of_stock(&self) -> bool {
        super::shared::is_out_of_stock(self.stock)
    }
}
