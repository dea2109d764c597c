//! Stock adjustments for phones, phone variants and accessories.
//!
//! [`apply_adjustment`] is the only code path that mutates stock. It runs on
//! whatever connection it is handed, so the sale orchestrator and the
//! purchase-order receiver fold it into their own transactions while
//! [`InventoryService`] wraps it in a transaction of its own.
//!
//! Decrements are conditional updates (`stock = stock + delta WHERE stock >=
//! -delta`); zero affected rows means the stock was not there. Phone rows are
//! locked with a version bump before any variant is touched, so concurrent
//! adjusters recompute `phone.stock = Σ variant.stock` one after another.

use crate::{
    entities::{accessory, phone, phone_variant, shared::is_low_stock, ModelType, MovementType},
    errors::ServiceError,
    events::{Event, EventSender},
    middleware_helpers::{retry_stock_conflicts, RetryConfig},
    services::{
        stock_movements::{append_movement, NewMovement},
        suppliers,
    },
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// The stock unit an adjustment applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockTarget {
    pub product_id: Uuid,
    pub model_type: ModelType,
    #[serde(default)]
    pub variant_id: Option<Uuid>,
}

/// What the movement ledger records about an adjustment.
#[derive(Debug, Clone)]
pub struct MovementContext {
    pub movement_type: MovementType,
    pub reference: String,
    pub reference_id: Option<Uuid>,
    pub handled_by: Option<Uuid>,
    pub note: Option<String>,
}

impl MovementContext {
    pub fn new(movement_type: MovementType, reference: impl Into<String>) -> Self {
        Self {
            movement_type,
            reference: reference.into(),
            reference_id: None,
            handled_by: None,
            note: None,
        }
    }

    pub fn reference_id(mut self, reference_id: Option<Uuid>) -> Self {
        self.reference_id = reference_id;
        self
    }

    pub fn handled_by(mut self, handled_by: Option<Uuid>) -> Self {
        self.handled_by = handled_by;
        self
    }

    pub fn note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }
}

/// Outcome of one adjustment. `previous_stock`/`new_stock` describe the unit
/// that changed (the variant for phones with variants); `product_stock` is
/// the product-level total afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StockAdjustment {
    pub product_id: Uuid,
    pub model_type: ModelType,
    pub variant_id: Option<Uuid>,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub product_stock: i32,
    pub low_stock_threshold: i32,
    pub movement_id: Uuid,
    #[serde(skip)]
    pub supplier_id: Option<Uuid>,
}

impl StockAdjustment {
    pub fn is_low_stock(&self) -> bool {
        is_low_stock(self.product_stock, self.low_stock_threshold)
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        let mut events = vec![Event::StockAdjusted {
            product_id: self.product_id,
            model_type: self.model_type,
            variant_id: self.variant_id,
            previous_stock: self.previous_stock,
            new_stock: self.new_stock,
        }];
        if self.is_low_stock() {
            events.push(Event::LowStock {
                product_id: self.product_id,
                model_type: self.model_type,
                stock: self.product_stock,
                threshold: self.low_stock_threshold,
            });
        }
        events
    }
}

pub(crate) async fn publish_adjustments(sender: &EventSender, adjustments: &[StockAdjustment]) {
    for adjustment in adjustments {
        for event in adjustment.events() {
            sender.send_or_log(event).await;
        }
    }
}

/// Largest change a single adjustment or line may carry.
pub const MAX_STOCK_CHANGE: i32 = 1_000_000;

fn out_of_range(subject: &str, current: i32, delta: i32) -> ServiceError {
    ServiceError::ValidationError(format!(
        "{} holds {}; a change of {} is out of range",
        subject, current, delta
    ))
}

/// `current + delta`, refusing results that do not fit a stock column.
fn checked_stock(subject: &str, current: i32, delta: i32) -> Result<i32, ServiceError> {
    current
        .checked_add(delta)
        .ok_or_else(|| out_of_range(subject, current, delta))
}

fn insufficient(subject: &str, available: i32, requested: i32) -> ServiceError {
    ServiceError::InsufficientStock(format!(
        "{} has {}, requested {}",
        subject, available, requested
    ))
}

/// Picks the variant a phone line refers to. An absent id is only accepted
/// when the phone has exactly one variant. Callers handle phones without
/// variants before asking.
pub(crate) fn resolve_variant<'a>(
    phone: &phone::Model,
    variants: &'a [phone_variant::Model],
    variant_id: Option<Uuid>,
) -> Result<&'a phone_variant::Model, ServiceError> {
    match variant_id {
        Some(id) => variants.iter().find(|v| v.id == id).ok_or_else(|| {
            ServiceError::NotFound(format!(
                "variant {} does not belong to {}",
                id,
                phone.display_name()
            ))
        }),
        None if variants.len() == 1 => Ok(&variants[0]),
        None => Err(ServiceError::VariantRequired(format!(
            "{} has {} variants; variant_id is required",
            phone.display_name(),
            variants.len()
        ))),
    }
}

pub(crate) async fn load_variants<C: ConnectionTrait>(
    conn: &C,
    phone_id: Uuid,
) -> Result<Vec<phone_variant::Model>, ServiceError> {
    let variants = phone_variant::Entity::find()
        .filter(phone_variant::Column::PhoneId.eq(phone_id))
        .order_by_asc(phone_variant::Column::CreatedAt)
        .order_by_asc(phone_variant::Column::Sku)
        .all(conn)
        .await?;
    Ok(variants)
}

/// Applies `delta` to one stock unit and appends exactly one movement.
/// Restocks also refresh the product supplier's back-reference.
pub(crate) async fn apply_adjustment<C: ConnectionTrait>(
    conn: &C,
    target: StockTarget,
    delta: i32,
    ctx: &MovementContext,
) -> Result<StockAdjustment, ServiceError> {
    if delta == 0 {
        return Err(ServiceError::ValidationError(
            "stock delta must not be zero".to_string(),
        ));
    }
    if !(-MAX_STOCK_CHANGE..=MAX_STOCK_CHANGE).contains(&delta) {
        return Err(ServiceError::ValidationError(format!(
            "stock delta {} is outside -{max}..={max}",
            delta,
            max = MAX_STOCK_CHANGE
        )));
    }

    let mut adjustment = match target.model_type {
        ModelType::Accessory => adjust_accessory(conn, target, delta).await?,
        ModelType::Phone => adjust_phone(conn, target, delta).await?,
    };

    let movement = append_movement(
        conn,
        NewMovement {
            product_id: adjustment.product_id,
            model_type: adjustment.model_type,
            variant_id: adjustment.variant_id,
            movement_type: ctx.movement_type,
            previous_stock: adjustment.previous_stock,
            new_stock: adjustment.new_stock,
            reference: ctx.reference.clone(),
            reference_id: ctx.reference_id,
            handled_by: ctx.handled_by,
            note: ctx.note.clone(),
        },
    )
    .await?;
    adjustment.movement_id = movement.id;

    if ctx.movement_type == MovementType::Restock {
        if let Some(supplier_id) = adjustment.supplier_id {
            suppliers::link_product(
                conn,
                supplier_id,
                adjustment.product_id,
                adjustment.model_type,
                Some(movement.created_at),
            )
            .await?;
        }
    }

    Ok(adjustment)
}

async fn adjust_accessory<C: ConnectionTrait>(
    conn: &C,
    target: StockTarget,
    delta: i32,
) -> Result<StockAdjustment, ServiceError> {
    let item = accessory::Entity::find_by_id(target.product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("accessory", target.product_id))?;

    if let Some(variant_id) = target.variant_id {
        return Err(ServiceError::ValidationError(format!(
            "accessory {} has no variants (got variant {})",
            item.name, variant_id
        )));
    }

    if delta > 0 {
        checked_stock(&item.name, item.stock, delta)?;
    }

    let mut update = accessory::Entity::update_many()
        .col_expr(
            accessory::Column::Stock,
            Expr::col(accessory::Column::Stock).add(delta),
        )
        .col_expr(accessory::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(accessory::Column::Id.eq(item.id));
    update = if delta < 0 {
        update.filter(accessory::Column::Stock.gte(-delta))
    } else {
        update.filter(accessory::Column::Stock.lte(i32::MAX - delta))
    };
    if update.exec(conn).await?.rows_affected == 0 {
        return Err(if delta < 0 {
            insufficient(&item.name, item.stock, -delta)
        } else {
            out_of_range(&item.name, item.stock, delta)
        });
    }

    let updated = accessory::Entity::find_by_id(item.id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("accessory", item.id))?;

    Ok(StockAdjustment {
        product_id: updated.id,
        model_type: ModelType::Accessory,
        variant_id: None,
        previous_stock: updated.stock - delta,
        new_stock: updated.stock,
        product_stock: updated.stock,
        low_stock_threshold: updated.low_stock_threshold,
        movement_id: Uuid::nil(),
        supplier_id: updated.supplier_id,
    })
}

async fn adjust_phone<C: ConnectionTrait>(
    conn: &C,
    target: StockTarget,
    delta: i32,
) -> Result<StockAdjustment, ServiceError> {
    // Row lock: every writer of this phone's variants passes through here.
    let locked = phone::Entity::update_many()
        .col_expr(phone::Column::Version, Expr::col(phone::Column::Version).add(1))
        .col_expr(phone::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(phone::Column::Id.eq(target.product_id))
        .exec(conn)
        .await?;
    if locked.rows_affected == 0 {
        return Err(ServiceError::not_found("phone", target.product_id));
    }

    let phone = phone::Entity::find_by_id(target.product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("phone", target.product_id))?;
    let variants = load_variants(conn, phone.id).await?;

    if variants.is_empty() {
        if let Some(variant_id) = target.variant_id {
            return Err(ServiceError::NotFound(format!(
                "variant {} does not belong to {}",
                variant_id,
                phone.display_name()
            )));
        }

        let new_stock = checked_stock(&phone.display_name(), phone.stock, delta)?;
        let mut update = phone::Entity::update_many()
            .col_expr(phone::Column::Stock, Expr::col(phone::Column::Stock).add(delta))
            .filter(phone::Column::Id.eq(phone.id));
        if delta < 0 {
            update = update.filter(phone::Column::Stock.gte(-delta));
        }
        if update.exec(conn).await?.rows_affected == 0 {
            return Err(insufficient(&phone.display_name(), phone.stock, -delta));
        }

        return Ok(StockAdjustment {
            product_id: phone.id,
            model_type: ModelType::Phone,
            variant_id: None,
            previous_stock: phone.stock,
            new_stock,
            product_stock: new_stock,
            low_stock_threshold: phone.low_stock_threshold,
            movement_id: Uuid::nil(),
            supplier_id: phone.supplier_id,
        });
    }

    let variant = resolve_variant(&phone, &variants, target.variant_id)?;
    let subject = format!("{} ({})", phone.display_name(), variant.label());
    let new_stock = checked_stock(&subject, variant.stock, delta)?;
    let total = sum_stock(
        &phone.display_name(),
        variants
            .iter()
            .map(|v| if v.id == variant.id { new_stock } else { v.stock }),
    )?;

    let mut update = phone_variant::Entity::update_many()
        .col_expr(
            phone_variant::Column::Stock,
            Expr::col(phone_variant::Column::Stock).add(delta),
        )
        .col_expr(phone_variant::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(phone_variant::Column::Id.eq(variant.id));
    if delta < 0 {
        update = update.filter(phone_variant::Column::Stock.gte(-delta));
    }
    if update.exec(conn).await?.rows_affected == 0 {
        return Err(insufficient(&subject, variant.stock, -delta));
    }

    phone::Entity::update_many()
        .col_expr(phone::Column::Stock, Expr::value(total))
        .filter(phone::Column::Id.eq(phone.id))
        .exec(conn)
        .await?;

    Ok(StockAdjustment {
        product_id: phone.id,
        model_type: ModelType::Phone,
        variant_id: Some(variant.id),
        previous_stock: variant.stock,
        new_stock,
        product_stock: total,
        low_stock_threshold: phone.low_stock_threshold,
        movement_id: Uuid::nil(),
        supplier_id: phone.supplier_id,
    })
}

/// Phone total over its variant stocks.
fn sum_stock(subject: &str, stocks: impl Iterator<Item = i32>) -> Result<i32, ServiceError> {
    let total: i64 = stocks.map(i64::from).sum();
    i32::try_from(total).map_err(|_| {
        ServiceError::ValidationError(format!(
            "{} would hold {} units in total, which is out of range",
            subject, total
        ))
    })
}

/// Recomputes `phone.stock` from its variants. Used after variants are added.
pub(crate) async fn sync_phone_stock<C: ConnectionTrait>(
    conn: &C,
    phone_id: Uuid,
) -> Result<i32, ServiceError> {
    let variants = load_variants(conn, phone_id).await?;
    let total = sum_stock("phone", variants.iter().map(|v| v.stock))?;
    phone::Entity::update_many()
        .col_expr(phone::Column::Stock, Expr::value(total))
        .col_expr(phone::Column::Version, Expr::col(phone::Column::Version).add(1))
        .col_expr(phone::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(phone::Column::Id.eq(phone_id))
        .exec(conn)
        .await?;
    Ok(total)
}

fn default_adjustment_type() -> MovementType {
    MovementType::Adjustment
}

/// Manual stock correction.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AdjustStock {
    pub product_id: Uuid,
    pub model_type: ModelType,
    pub variant_id: Option<Uuid>,
    /// Signed change; negative values remove stock. At most 1,000,000 either way.
    pub delta: i32,
    #[serde(default = "default_adjustment_type")]
    pub movement_type: MovementType,
    #[validate(length(min = 1, max = 100))]
    pub reference: Option<String>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RestockItem {
    pub product_id: Uuid,
    pub model_type: ModelType,
    pub variant_id: Option<Uuid>,
    #[validate(range(min = 1, max = 1000000))]
    pub quantity: i32,
}

/// Bulk restock from a supplier delivery.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RestockMany {
    #[validate(length(min = 1))]
    pub items: Vec<RestockItem>,
    pub supplier_id: Option<Uuid>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    retry: RetryConfig,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender, retry: RetryConfig) -> Self {
        Self {
            db,
            event_sender,
            retry,
        }
    }

    /// Applies a signed correction in its own transaction.
    #[instrument(skip(self), fields(product_id = %input.product_id, delta = input.delta))]
    pub async fn adjust_stock(
        &self,
        input: AdjustStock,
        actor: Option<Uuid>,
    ) -> Result<StockAdjustment, ServiceError> {
        input.validate()?;
        if input.delta == 0 {
            return Err(ServiceError::ValidationError(
                "delta must not be zero".to_string(),
            ));
        }

        if !matches!(
            input.movement_type,
            MovementType::Adjustment | MovementType::Restock | MovementType::Return
        ) {
            return Err(ServiceError::ValidationError(format!(
                "{} movements are recorded by their own workflow",
                input.movement_type
            )));
        }

        let target = StockTarget {
            product_id: input.product_id,
            model_type: input.model_type,
            variant_id: input.variant_id,
        };
        let delta = input.delta;
        let ctx = MovementContext::new(
            input.movement_type,
            input
                .reference
                .clone()
                .unwrap_or_else(|| "manual_adjustment".to_string()),
        )
        .handled_by(actor)
        .note(input.note.clone());

        let db = &*self.db;
        let ctx = &ctx;
        let adjustment = retry_stock_conflicts(&self.retry, move || async move {
            let txn = db.begin().await?;
            let adjustment = apply_adjustment(&txn, target, delta, ctx).await?;
            txn.commit().await?;
            Ok::<_, ServiceError>(adjustment)
        })
        .await?;

        metrics::counter!("phonestore.stock.adjusted", 1);
        info!(
            product_id = %adjustment.product_id,
            previous_stock = adjustment.previous_stock,
            new_stock = adjustment.new_stock,
            "Stock adjusted"
        );
        publish_adjustments(&self.event_sender, std::slice::from_ref(&adjustment)).await;
        Ok(adjustment)
    }

    /// Restocks every item in one transaction; any unknown product or
    /// variant rolls the whole batch back.
    #[instrument(skip(self, input), fields(items = input.items.len()))]
    pub async fn restock_many(
        &self,
        input: RestockMany,
        actor: Option<Uuid>,
    ) -> Result<Vec<StockAdjustment>, ServiceError> {
        input.validate()?;
        for (idx, item) in input.items.iter().enumerate() {
            item.validate()
                .map_err(|e| ServiceError::from(e).at_line(idx + 1))?;
        }
        if let Some(supplier_id) = input.supplier_id {
            suppliers::ensure_supplier_exists(&*self.db, supplier_id).await?;
        }

        let ctx = MovementContext::new(MovementType::Restock, "supplier_restock")
            .reference_id(input.supplier_id)
            .handled_by(actor)
            .note(input.note.clone());

        let db = &*self.db;
        let ctx = &ctx;
        let items = &input.items;
        let supplier_id = input.supplier_id;
        let adjustments = retry_stock_conflicts(&self.retry, move || async move {
            let txn = db.begin().await?;
            let mut adjustments = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                let target = StockTarget {
                    product_id: item.product_id,
                    model_type: item.model_type,
                    variant_id: item.variant_id,
                };
                let adjustment = apply_adjustment(&txn, target, item.quantity, ctx)
                    .await
                    .map_err(|e| e.at_line(idx + 1))?;

                if let Some(delivering) = supplier_id {
                    if adjustment.supplier_id != Some(delivering) {
                        suppliers::link_product(
                            &txn,
                            delivering,
                            adjustment.product_id,
                            adjustment.model_type,
                            Some(Utc::now()),
                        )
                        .await?;
                    }
                }
                adjustments.push(adjustment);
            }
            txn.commit().await?;
            Ok::<_, ServiceError>(adjustments)
        })
        .await?;

        metrics::counter!("phonestore.stock.restocked", adjustments.len() as u64);
        let low: Vec<_> = adjustments.iter().filter(|a| a.is_low_stock()).collect();
        if !low.is_empty() {
            warn!(count = low.len(), "Restock left products at or below threshold");
        }
        info!(items = adjustments.len(), "Restock completed");

        publish_adjustments(&self.event_sender, &adjustments).await;
        Ok(adjustments)
    }
}
