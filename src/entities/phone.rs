use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A phone model in the catalog. `stock` mirrors the sum of its variants.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "phones")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub brand: String,
    pub model: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(unique, nullable)]
    pub sku: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub purchase_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub selling_price: Decimal,
    pub currency: String,
    #[sea_orm(column_type = "Json")]
    pub specs: Json,
    #[sea_orm(column_type = "Json")]
    pub images: Json,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub stock: i32,
    pub low_stock_threshold: i32,
    pub is_active: bool,
    /// Bumped on every stock change; the update doubles as a row lock.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::phone_variant::Entity")]
    Variants,
}

impl Related<super::phone_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Variants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.brand, self.model)
    }

    pub fn is_low_stock(&self) -> bool {
        super::shared::is_low_stock(self.stock, self.low_stock_threshold)
    }

    pub fn is_out_of_stock(&self) -> bool {
        super::shared::is_out_of_stock(self.stock)
    }
}
