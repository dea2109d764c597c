use crate::{
    entities::{
        accessory, phone, phone_variant,
        purchase_order::{self, PurchaseOrderStatus},
        purchase_order_item, ModelType, MovementType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    middleware_helpers::{retry_stock_conflicts, RetryConfig},
    services::{
        inventory::{
            apply_adjustment, load_variants, publish_adjustments, MovementContext, StockTarget,
        },
        pricing::{line_total, validate_non_negative},
        sequence::{SequenceKind, SequenceService},
        suppliers,
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PurchaseOrderLine {
    pub product_id: Uuid,
    pub model_type: ModelType,
    /// SKU of the phone variant to receive into
    pub variant_sku: Option<String>,
    #[validate(range(min = 1, max = 1000000))]
    pub quantity: i32,
    #[validate(custom = "validate_non_negative")]
    #[schema(value_type = String, example = "420.00")]
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseOrder {
    pub supplier_id: Uuid,
    #[validate(length(min = 1))]
    pub items: Vec<PurchaseOrderLine>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderDetails {
    #[serde(flatten)]
    pub purchase_order: purchase_order::Model,
    pub items: Vec<purchase_order_item::Model>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PurchaseOrderFilter {
    pub supplier_id: Option<Uuid>,
    pub status: Option<PurchaseOrderStatus>,
}

/// Finds the variant a purchase-order line names by SKU.
async fn variant_by_sku<C: ConnectionTrait>(
    conn: &C,
    phone_id: Uuid,
    sku: &str,
) -> Result<phone_variant::Model, ServiceError> {
    phone_variant::Entity::find()
        .filter(phone_variant::Column::Sku.eq(sku))
        .filter(phone_variant::Column::PhoneId.eq(phone_id))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("variant {} not found on phone {}", sku, phone_id))
        })
}

/// Checks that a line's product exists and settles which variant it will be
/// received into. Returns the SKU stored on the line: the given one, or the
/// only variant's SKU when the phone has exactly one.
async fn check_line_target<C: ConnectionTrait>(
    conn: &C,
    line: &PurchaseOrderLine,
) -> Result<Option<String>, ServiceError> {
    match line.model_type {
        ModelType::Accessory => {
            accessory::Entity::find_by_id(line.product_id)
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::not_found("accessory", line.product_id))?;
            if line.variant_sku.is_some() {
                return Err(ServiceError::ValidationError(
                    "accessory lines cannot name a variant".to_string(),
                ));
            }
            Ok(None)
        }
        ModelType::Phone => {
            let phone = phone::Entity::find_by_id(line.product_id)
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::not_found("phone", line.product_id))?;
            if let Some(sku) = &line.variant_sku {
                let variant = variant_by_sku(conn, line.product_id, sku).await?;
                return Ok(Some(variant.sku));
            }

            let mut variants = load_variants(conn, phone.id).await?;
            match variants.len() {
                0 => Ok(None),
                1 => Ok(variants.pop().map(|v| v.sku)),
                n => Err(ServiceError::VariantRequired(format!(
                    "{} has {} variants; variant_sku is required",
                    phone.display_name(),
                    n
                ))),
            }
        }
    }
}

#[derive(Clone)]
pub struct PurchaseOrderService {
    db: Arc<DatabaseConnection>,
    sequences: SequenceService,
    event_sender: EventSender,
    retry: RetryConfig,
}

impl PurchaseOrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        sequences: SequenceService,
        event_sender: EventSender,
        retry: RetryConfig,
    ) -> Self {
        Self {
            db,
            sequences,
            event_sender,
            retry,
        }
    }

    #[instrument(
        skip(self, input),
        fields(supplier_id = %input.supplier_id, lines = input.items.len())
    )]
    pub async fn create_po(
        &self,
        input: CreatePurchaseOrder,
        actor: Option<Uuid>,
    ) -> Result<PurchaseOrderDetails, ServiceError> {
        input.validate()?;
        for (idx, line) in input.items.iter().enumerate() {
            line.validate()
                .map_err(|e| ServiceError::from(e).at_line(idx + 1))?;
        }

        let db = &*self.db;
        suppliers::ensure_supplier_exists(db, input.supplier_id).await?;
        let mut variant_skus = Vec::with_capacity(input.items.len());
        for (idx, line) in input.items.iter().enumerate() {
            let sku = check_line_target(db, line)
                .await
                .map_err(|e| e.at_line(idx + 1))?;
            variant_skus.push(sku);
        }

        let total_cost: Decimal = input
            .items
            .iter()
            .map(|l| line_total(l.unit_cost, l.quantity))
            .sum();

        let now = Utc::now();
        let po_no = self
            .sequences
            .next_number(SequenceKind::PurchaseOrder, now)
            .await?;
        let po_id = Uuid::new_v4();

        let txn = db.begin().await?;
        let purchase_order = purchase_order::ActiveModel {
            id: Set(po_id),
            po_no: Set(po_no.clone()),
            supplier_id: Set(input.supplier_id),
            status: Set(PurchaseOrderStatus::Created),
            total_cost: Set(total_cost),
            notes: Set(input.notes.clone()),
            created_by: Set(actor),
            received_at: Set(None),
            received_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(input.items.len());
        for (idx, (line, variant_sku)) in input.items.iter().zip(variant_skus).enumerate() {
            let item = purchase_order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                purchase_order_id: Set(po_id),
                line_no: Set(idx as i32 + 1),
                product_id: Set(line.product_id),
                model_type: Set(line.model_type),
                variant_sku: Set(variant_sku),
                quantity: Set(line.quantity),
                unit_cost: Set(line.unit_cost),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }
        txn.commit().await?;

        metrics::counter!("phonestore.purchase_orders.created", 1);
        info!(purchase_order_id = %po_id, po_no = %po_no, "Purchase order created");
        self.event_sender
            .send_or_log(Event::PurchaseOrderCreated {
                purchase_order_id: po_id,
                po_no,
            })
            .await;

        Ok(PurchaseOrderDetails {
            purchase_order,
            items,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_po(&self, id: Uuid) -> Result<PurchaseOrderDetails, ServiceError> {
        let purchase_order = self.find_po(id).await?;
        let items = purchase_order
            .find_related(purchase_order_item::Entity)
            .order_by_asc(purchase_order_item::Column::LineNo)
            .all(&*self.db)
            .await?;
        Ok(PurchaseOrderDetails {
            purchase_order,
            items,
        })
    }

    async fn find_po(&self, id: Uuid) -> Result<purchase_order::Model, ServiceError> {
        purchase_order::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("purchase order", id))
    }

    #[instrument(skip(self))]
    pub async fn list_pos(
        &self,
        filter: &PurchaseOrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<purchase_order::Model>, u64), ServiceError> {
        let mut query = purchase_order::Entity::find();
        if let Some(supplier_id) = filter.supplier_id {
            query = query.filter(purchase_order::Column::SupplierId.eq(supplier_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(purchase_order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(purchase_order::Column::CreatedAt)
            .order_by_desc(purchase_order::Column::PoNo)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// created → ordered
    #[instrument(skip(self))]
    pub async fn mark_ordered(&self, id: Uuid) -> Result<PurchaseOrderDetails, ServiceError> {
        self.transition(id, &[PurchaseOrderStatus::Created], PurchaseOrderStatus::Ordered)
            .await
    }

    /// created | ordered → cancelled
    #[instrument(skip(self))]
    pub async fn cancel_po(&self, id: Uuid) -> Result<PurchaseOrderDetails, ServiceError> {
        self.transition(
            id,
            &[PurchaseOrderStatus::Created, PurchaseOrderStatus::Ordered],
            PurchaseOrderStatus::Cancelled,
        )
        .await
    }

    async fn transition(
        &self,
        id: Uuid,
        from: &[PurchaseOrderStatus],
        to: PurchaseOrderStatus,
    ) -> Result<PurchaseOrderDetails, ServiceError> {
        let current = self.find_po(id).await?;
        if !from.contains(&current.status) {
            return Err(ServiceError::InvalidState(format!(
                "purchase order {} is {}; cannot move to {}",
                current.po_no, current.status, to
            )));
        }

        let updated = purchase_order::Entity::update_many()
            .col_expr(purchase_order::Column::Status, Expr::value(to))
            .col_expr(purchase_order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(purchase_order::Column::Id.eq(id))
            .filter(purchase_order::Column::Status.is_in(from.iter().copied()))
            .exec(&*self.db)
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::InvalidState(format!(
                "purchase order {} changed concurrently",
                current.po_no
            )));
        }

        info!(
            po_no = %current.po_no,
            from = %current.status,
            to = %to,
            "Purchase order status changed"
        );
        self.get_po(id).await
    }

    /// Receives every line into stock and marks the order received, all in
    /// one transaction.
    #[instrument(skip(self))]
    pub async fn receive_po(
        &self,
        po_id: Uuid,
        receiver_id: Option<Uuid>,
    ) -> Result<PurchaseOrderDetails, ServiceError> {
        let current = self.get_po(po_id).await?;
        match current.purchase_order.status {
            PurchaseOrderStatus::Received => {
                return Err(ServiceError::AlreadyReceived(format!(
                    "purchase order {} was received at {}",
                    current.purchase_order.po_no,
                    current
                        .purchase_order
                        .received_at
                        .map(|at| at.to_rfc3339())
                        .unwrap_or_else(|| "an unknown time".to_string())
                )))
            }
            PurchaseOrderStatus::Cancelled => {
                return Err(ServiceError::InvalidState(format!(
                    "purchase order {} is cancelled",
                    current.purchase_order.po_no
                )))
            }
            PurchaseOrderStatus::Created | PurchaseOrderStatus::Ordered => {}
        }

        let po_no = current.purchase_order.po_no.as_str();
        let supplier_id = current.purchase_order.supplier_id;
        let ctx = MovementContext::new(MovementType::Restock, po_no)
            .reference_id(Some(po_id))
            .handled_by(receiver_id);

        let db = &*self.db;
        let ctx = &ctx;
        let items = &current.items;
        let (adjustments, received_at) = retry_stock_conflicts(&self.retry, move || async move {
            let txn = db.begin().await?;
            let now = Utc::now();

            let mut adjustments = Vec::with_capacity(items.len());
            for item in items {
                let line_no = item.line_no as usize;
                let variant_id = match (&item.variant_sku, item.model_type) {
                    (Some(sku), ModelType::Phone) => Some(
                        variant_by_sku(&txn, item.product_id, sku)
                            .await
                            .map_err(|e| e.at_line(line_no))?
                            .id,
                    ),
                    _ => None,
                };
                let target = StockTarget {
                    product_id: item.product_id,
                    model_type: item.model_type,
                    variant_id,
                };
                let adjustment = apply_adjustment(&txn, target, item.quantity, ctx)
                    .await
                    .map_err(|e| e.at_line(line_no))?;
                suppliers::link_product(
                    &txn,
                    supplier_id,
                    item.product_id,
                    item.model_type,
                    Some(now),
                )
                .await?;
                adjustments.push(adjustment);
            }

            let received = purchase_order::Entity::update_many()
                .col_expr(
                    purchase_order::Column::Status,
                    Expr::value(PurchaseOrderStatus::Received),
                )
                .col_expr(purchase_order::Column::ReceivedAt, Expr::value(Some(now)))
                .col_expr(purchase_order::Column::ReceivedBy, Expr::value(receiver_id))
                .col_expr(purchase_order::Column::UpdatedAt, Expr::value(now))
                .filter(purchase_order::Column::Id.eq(po_id))
                .filter(purchase_order::Column::Status.is_in([
                    PurchaseOrderStatus::Created,
                    PurchaseOrderStatus::Ordered,
                ]))
                .exec(&txn)
                .await?;
            if received.rows_affected == 0 {
                return Err(ServiceError::AlreadyReceived(format!(
                    "purchase order {} was received concurrently",
                    po_no
                )));
            }

            txn.commit().await?;
            Ok::<_, ServiceError>((adjustments, now))
        })
        .await
        .map_err(|e| {
            metrics::counter!("phonestore.purchase_orders.receive_failed", 1, "kind" => e.kind());
            warn!(po_no = %po_no, error = %e, "Purchase order receipt rolled back");
            e
        })?;

        metrics::counter!("phonestore.purchase_orders.received", 1);
        info!(
            purchase_order_id = %po_id,
            po_no = %po_no,
            lines = adjustments.len(),
            "Purchase order received"
        );

        self.event_sender
            .send_or_log(Event::PurchaseOrderReceived {
                purchase_order_id: po_id,
                po_no: po_no.to_string(),
                received_at,
            })
            .await;
        publish_adjustments(&self.event_sender, &adjustments).await;

        self.get_po(po_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(quantity: i32, unit_cost: Decimal) -> PurchaseOrderLine {
        PurchaseOrderLine {
            product_id: Uuid::new_v4(),
            model_type: ModelType::Accessory,
            variant_sku: None,
            quantity,
            unit_cost,
        }
    }

    #[test]
    fn line_validation() {
        assert!(line(1, dec!(0)).validate().is_ok());
        assert!(line(0, dec!(1)).validate().is_err());
        assert!(line(2, dec!(-0.5)).validate().is_err());
    }

    #[test]
    fn order_requires_lines() {
        let order = CreatePurchaseOrder {
            supplier_id: Uuid::new_v4(),
            items: vec![],
            notes: None,
        };
        assert!(order.validate().is_err());
    }
}
