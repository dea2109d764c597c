use super::shared::{ModelType, MovementType};
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Immutable ledger entry for one inventory change. Never updated or deleted,
/// and not removed when the product it points to is deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub model_type: ModelType,
    pub variant_id: Option<Uuid>,
    pub movement_type: MovementType,
    /// Magnitude of the change; direction is `new_stock - previous_stock`.
    pub quantity: i32,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub reference: String,
    pub reference_id: Option<Uuid>,
    pub handled_by: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn delta(&self) -> i32 {
        self.new_stock - self.previous_stock
    }
}
