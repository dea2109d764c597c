//! Append-only ledger of inventory changes. Rows are inserted by the
//! inventory adjuster and never updated or deleted; per-product restock and
//! sale history is a filtered read over this table.

use crate::{
    entities::{stock_movement, ModelType, MovementType},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::IntoParams;
use uuid::Uuid;

/// A movement about to be appended.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: Uuid,
    pub model_type: ModelType,
    pub variant_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub reference: String,
    pub reference_id: Option<Uuid>,
    pub handled_by: Option<Uuid>,
    pub note: Option<String>,
}

pub(crate) async fn append_movement<C: ConnectionTrait>(
    conn: &C,
    movement: NewMovement,
) -> Result<stock_movement::Model, ServiceError> {
    let quantity = (movement.new_stock - movement.previous_stock).abs();
    let model = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(movement.product_id),
        model_type: Set(movement.model_type),
        variant_id: Set(movement.variant_id),
        movement_type: Set(movement.movement_type),
        quantity: Set(quantity),
        previous_stock: Set(movement.previous_stock),
        new_stock: Set(movement.new_stock),
        reference: Set(movement.reference),
        reference_id: Set(movement.reference_id),
        handled_by: Set(movement.handled_by),
        note: Set(movement.note),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    metrics::counter!("phonestore.stock.movements", 1, "type" => model.movement_type.to_string());
    Ok(model)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub model_type: Option<ModelType>,
    pub movement_type: Option<MovementType>,
    pub variant_id: Option<Uuid>,
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub to: Option<DateTime<Utc>>,
}

impl MovementFilter {
    fn apply(&self, mut query: Select<stock_movement::Entity>) -> Select<stock_movement::Entity> {
        if let Some(product_id) = self.product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(model_type) = self.model_type {
            query = query.filter(stock_movement::Column::ModelType.eq(model_type));
        }
        if let Some(movement_type) = self.movement_type {
            query = query.filter(stock_movement::Column::MovementType.eq(movement_type));
        }
        if let Some(variant_id) = self.variant_id {
            query = query.filter(stock_movement::Column::VariantId.eq(variant_id));
        }
        if let Some(from) = self.from {
            query = query.filter(stock_movement::Column::CreatedAt.gte(from));
        }
        if let Some(to) = self.to {
            query = query.filter(stock_movement::Column::CreatedAt.lt(to));
        }
        query
    }
}

#[derive(Clone)]
pub struct StockMovementService {
    db: Arc<DatabaseConnection>,
}

impl StockMovementService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Newest first.
    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        filter: &MovementFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        let paginator = filter
            .apply(stock_movement::Entity::find())
            .order_by_desc(stock_movement::Column::CreatedAt)
            .order_by_desc(stock_movement::Column::Id)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let movements = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((movements, total))
    }

    /// Restock or sale history of one product, newest first.
    #[instrument(skip(self))]
    pub async fn product_history(
        &self,
        product_id: Uuid,
        movement_type: Option<MovementType>,
        limit: u64,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let filter = MovementFilter {
            product_id: Some(product_id),
            movement_type,
            ..Default::default()
        };
        let movements = filter
            .apply(stock_movement::Entity::find())
            .order_by_desc(stock_movement::Column::CreatedAt)
            .limit(limit.max(1))
            .all(&*self.db)
            .await?;
        Ok(movements)
    }

    /// Every movement written on behalf of one invoice or purchase order.
    pub async fn movements_for_reference(
        &self,
        reference_id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let movements = stock_movement::Entity::find()
            .filter(stock_movement::Column::ReferenceId.eq(reference_id))
            .order_by_asc(stock_movement::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(movements)
    }
}
