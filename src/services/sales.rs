//! Point-of-sale orchestration.
//!
//! `create_sale` validates and prices the cart against a read-only view of
//! the catalog, reserves an invoice number, and then performs every write
//! (stock decrements, movements, the invoice, purchase history) in one
//! transaction. The conditional decrement inside the adjuster re-checks
//! stock, so a sale that loses a race after validation rolls back whole.

use crate::{
    entities::{
        accessory, customer, customer_purchase, invoice, invoice::InvoiceStatus, invoice_item,
        phone, seller_sale, ModelType, MovementType, PaymentMethod,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    middleware_helpers::{retry_stock_conflicts, RetryConfig},
    services::{
        inventory::{
            apply_adjustment, load_variants, publish_adjustments, resolve_variant,
            MovementContext, StockAdjustment, StockTarget,
        },
        pricing::{compute_totals, line_total, Totals},
        sequence::{SequenceKind, SequenceService},
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CartItem {
    pub product_id: Uuid,
    pub model_type: ModelType,
    #[validate(range(min = 1, max = 1000000))]
    pub quantity: i32,
    /// Required for phones with more than one variant
    pub variant_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SalePayment {
    pub method: PaymentMethod,
    #[schema(value_type = Option<String>, example = "100.00")]
    pub paid_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSale {
    pub items: Vec<CartItem>,
    pub payment: SalePayment,
    pub customer_id: Option<Uuid>,
    /// Defaults to the acting user
    pub seller_id: Option<Uuid>,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetails {
    #[serde(flatten)]
    pub invoice: invoice::Model,
    pub items: Vec<invoice_item::Model>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InvoiceFilter {
    pub customer_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub to: Option<DateTime<Utc>>,
}

/// A validated, priced cart line.
#[derive(Debug, Clone)]
struct PricedLine {
    line_no: usize,
    target: StockTarget,
    quantity: i32,
    product_name: String,
    variant_label: Option<String>,
    unit_price: Decimal,
    unit_cost: Decimal,
    total_price: Decimal,
    available: i32,
}

#[derive(Clone)]
pub struct SalesService {
    db: Arc<DatabaseConnection>,
    sequences: SequenceService,
    event_sender: EventSender,
    retry: RetryConfig,
}

impl SalesService {
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

    /// Records a completed sale and returns the persisted invoice.
    #[instrument(
        skip(self, input),
        fields(lines = input.items.len(), customer_id = ?input.customer_id)
    )]
    pub async fn create_sale(
        &self,
        input: CreateSale,
        actor: Option<Uuid>,
    ) -> Result<InvoiceDetails, ServiceError> {
        if input.items.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        let paid_amount = input.payment.paid_amount.ok_or(ServiceError::PaymentRequired)?;
        input.validate()?;
        for (idx, item) in input.items.iter().enumerate() {
            item.validate()
                .map_err(|e| ServiceError::from(e).at_line(idx + 1))?;
        }
        for (field, value) in [
            ("discount", input.discount),
            ("tax", input.tax),
            ("paid_amount", paid_amount),
        ] {
            if value < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "{} must not be negative",
                    field
                )));
            }
        }

        if let Some(customer_id) = input.customer_id {
            customer::Entity::find_by_id(customer_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::not_found("customer", customer_id))?;
        }

        let lines = self.price_cart(&input.items).await?;
        check_availability(&lines)?;

        let totals = compute_totals(
            lines.iter().map(|l| l.total_price),
            input.discount,
            input.tax,
            paid_amount,
        );
        if input.discount > totals.subtotal {
            return Err(ServiceError::ValidationError(format!(
                "discount {} exceeds subtotal {}",
                input.discount, totals.subtotal
            )));
        }

        let now = Utc::now();
        // Allocated on the pool before the transaction opens; an aborted
        // sale burns the number.
        let invoice_no = self
            .sequences
            .next_number(SequenceKind::Invoice, now)
            .await?;
        let invoice_id = Uuid::new_v4();
        let seller_id = input.seller_id.or(actor);
        let sale = PendingSale {
            invoice_id,
            invoice_no: &invoice_no,
            customer_id: input.customer_id,
            seller_id,
            payment_method: input.payment.method,
            notes: input.notes.as_deref(),
            totals: &totals,
            lines: &lines,
            at: now,
        };

        let db = &*self.db;
        let sale = &sale;
        let (details, adjustments) = retry_stock_conflicts(&self.retry, move || async move {
            let txn = db.begin().await?;
            let persisted = sale.persist(&txn).await?;
            txn.commit().await?;
            Ok::<_, ServiceError>(persisted)
        })
        .await
        .map_err(|e| {
            metrics::counter!("phonestore.sales.failed", 1, "kind" => e.kind());
            warn!(invoice_no = %invoice_no, error = %e, "Sale rolled back");
            e
        })?;

        metrics::counter!("phonestore.sales.completed", 1);
        metrics::histogram!(
            "phonestore.sales.total",
            totals.total.to_f64().unwrap_or_default()
        );
        info!(
            invoice_id = %details.invoice.id,
            invoice_no = %details.invoice.invoice_no,
            total = %details.invoice.total,
            "Sale completed"
        );

        self.event_sender
            .send_or_log(Event::InvoiceCreated {
                invoice_id: details.invoice.id,
                invoice_no: details.invoice.invoice_no.clone(),
                total: details.invoice.total,
            })
            .await;
        publish_adjustments(&self.event_sender, &adjustments).await;

        Ok(details)
    }

    /// Resolves every cart line against the catalog without writing.
    async fn price_cart(&self, items: &[CartItem]) -> Result<Vec<PricedLine>, ServiceError> {
        let db = &*self.db;
        let mut lines = Vec::with_capacity(items.len());

        for (idx, item) in items.iter().enumerate() {
            let line_no = idx + 1;
            let line = match item.model_type {
                ModelType::Accessory => {
                    let product = accessory::Entity::find_by_id(item.product_id)
                        .one(db)
                        .await?
                        .filter(|a| a.is_active)
                        .ok_or_else(|| {
                            ServiceError::not_found("accessory", item.product_id).at_line(line_no)
                        })?;
                    if item.variant_id.is_some() {
                        return Err(ServiceError::ValidationError(format!(
                            "accessory {} has no variants",
                            product.name
                        ))
                        .at_line(line_no));
                    }
                    PricedLine {
                        line_no,
                        target: StockTarget {
                            product_id: product.id,
                            model_type: ModelType::Accessory,
                            variant_id: None,
                        },
                        quantity: item.quantity,
                        product_name: product.name.clone(),
                        variant_label: None,
                        unit_price: product.selling_price,
                        unit_cost: product.purchase_price,
                        total_price: line_total(product.selling_price, item.quantity),
                        available: product.stock,
                    }
                }
                ModelType::Phone => {
                    let product = phone::Entity::find_by_id(item.product_id)
                        .one(db)
                        .await?
                        .filter(|p| p.is_active)
                        .ok_or_else(|| {
                            ServiceError::not_found("phone", item.product_id).at_line(line_no)
                        })?;
                    let variants = load_variants(db, product.id).await?;

                    if variants.is_empty() {
                        if let Some(variant_id) = item.variant_id {
                            return Err(ServiceError::NotFound(format!(
                                "variant {} does not belong to {}",
                                variant_id,
                                product.display_name()
                            ))
                            .at_line(line_no));
                        }
                        PricedLine {
                            line_no,
                            target: StockTarget {
                                product_id: product.id,
                                model_type: ModelType::Phone,
                                variant_id: None,
                            },
                            quantity: item.quantity,
                            product_name: product.display_name(),
                            variant_label: None,
                            unit_price: product.selling_price,
                            unit_cost: product.purchase_price,
                            total_price: line_total(product.selling_price, item.quantity),
                            available: product.stock,
                        }
                    } else {
                        let variant = resolve_variant(&product, &variants, item.variant_id)
                            .map_err(|e| e.at_line(line_no))?;
                        PricedLine {
                            line_no,
                            target: StockTarget {
                                product_id: product.id,
                                model_type: ModelType::Phone,
                                variant_id: Some(variant.id),
                            },
                            quantity: item.quantity,
                            product_name: product.display_name(),
                            variant_label: Some(variant.label()),
                            unit_price: variant.selling_price,
                            unit_cost: variant.purchase_price,
                            total_price: line_total(variant.selling_price, item.quantity),
                            available: variant.stock,
                        }
                    }
                }
            };
            lines.push(line);
        }

        Ok(lines)
    }

    #[instrument(skip(self))]
    pub async fn get_invoice(&self, id: Uuid) -> Result<InvoiceDetails, ServiceError> {
        let invoice = invoice::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("invoice", id))?;
        self.with_items(invoice).await
    }

    #[instrument(skip(self))]
    pub async fn get_invoice_by_number(
        &self,
        invoice_no: &str,
    ) -> Result<InvoiceDetails, ServiceError> {
        let invoice = invoice::Entity::find()
            .filter(invoice::Column::InvoiceNo.eq(invoice_no))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("invoice", invoice_no))?;
        self.with_items(invoice).await
    }

    async fn with_items(&self, invoice: invoice::Model) -> Result<InvoiceDetails, ServiceError> {
        let items = invoice
            .find_related(invoice_item::Entity)
            .order_by_asc(invoice_item::Column::LineNo)
            .all(&*self.db)
            .await?;
        Ok(InvoiceDetails { invoice, items })
    }

    /// Newest first.
    #[instrument(skip(self))]
    pub async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<invoice::Model>, u64), ServiceError> {
        let mut query = invoice::Entity::find();
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(invoice::Column::CustomerId.eq(customer_id));
        }
        if let Some(seller_id) = filter.seller_id {
            query = query.filter(invoice::Column::SellerId.eq(seller_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(invoice::Column::Status.eq(status));
        }
        if let Some(from) = filter.from {
            query = query.filter(invoice::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(invoice::Column::CreatedAt.lt(to));
        }

        let paginator = query
            .order_by_desc(invoice::Column::CreatedAt)
            .order_by_desc(invoice::Column::InvoiceNo)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let invoices = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((invoices, total))
    }

    /// Cancels a completed invoice and returns every line's stock.
    #[instrument(skip(self))]
    pub async fn cancel_invoice(
        &self,
        id: Uuid,
        actor: Option<Uuid>,
    ) -> Result<InvoiceDetails, ServiceError> {
        let current = self.get_invoice(id).await?;
        if current.invoice.status != InvoiceStatus::Completed {
            return Err(ServiceError::InvalidState(format!(
                "invoice {} is {}; only completed invoices can be cancelled",
                current.invoice.invoice_no, current.invoice.status
            )));
        }

        let ctx = MovementContext::new(MovementType::Return, current.invoice.invoice_no.clone())
            .reference_id(Some(id))
            .handled_by(actor)
            .note(Some("invoice cancelled".to_string()));

        let db = &*self.db;
        let ctx = &ctx;
        let items = &current.items;
        let invoice_no = current.invoice.invoice_no.as_str();
        let adjustments = retry_stock_conflicts(&self.retry, move || async move {
            let txn = db.begin().await?;

            // Guarded transition: a concurrent cancel sees zero rows here.
            let transitioned = invoice::Entity::update_many()
                .col_expr(invoice::Column::Status, Expr::value(InvoiceStatus::Cancelled))
                .col_expr(invoice::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(invoice::Column::Id.eq(id))
                .filter(invoice::Column::Status.eq(InvoiceStatus::Completed))
                .exec(&txn)
                .await?;
            if transitioned.rows_affected == 0 {
                return Err(ServiceError::InvalidState(format!(
                    "invoice {} is no longer completed",
                    invoice_no
                )));
            }

            let mut adjustments = Vec::with_capacity(items.len());
            for item in items {
                let target = StockTarget {
                    product_id: item.product_id,
                    model_type: item.model_type,
                    variant_id: item.variant_id,
                };
                let adjustment = apply_adjustment(&txn, target, item.quantity, ctx)
                    .await
                    .map_err(|e| e.at_line(item.line_no as usize))?;
                adjustments.push(adjustment);
            }

            txn.commit().await?;
            Ok::<_, ServiceError>(adjustments)
        })
        .await?;

        metrics::counter!("phonestore.sales.cancelled", 1);
        info!(invoice_id = %id, invoice_no = %invoice_no, "Invoice cancelled");

        self.event_sender
            .send_or_log(Event::InvoiceCancelled {
                invoice_id: id,
                invoice_no: invoice_no.to_string(),
            })
            .await;
        publish_adjustments(&self.event_sender, &adjustments).await;

        self.get_invoice(id).await
    }
}

/// Sums repeated lines per stock unit and fails on the first line that
/// pushes the running total past what is on hand.
fn check_availability(lines: &[PricedLine]) -> Result<(), ServiceError> {
    let mut requested: HashMap<(Uuid, Option<Uuid>), i32> = HashMap::new();
    for line in lines {
        let key = (line.target.product_id, line.target.variant_id);
        let running = requested.entry(key).or_insert(0);
        *running += line.quantity;
        if *running > line.available {
            let subject = match &line.variant_label {
                Some(label) => format!("{} ({})", line.product_name, label),
                None => line.product_name.clone(),
            };
            return Err(ServiceError::InsufficientStock(format!(
                "line {}: {} has {}, requested {}",
                line.line_no, subject, line.available, running
            )));
        }
    }
    Ok(())
}

/// Everything the transactional half of a sale needs.
struct PendingSale<'a> {
    invoice_id: Uuid,
    invoice_no: &'a str,
    customer_id: Option<Uuid>,
    seller_id: Option<Uuid>,
    payment_method: PaymentMethod,
    notes: Option<&'a str>,
    totals: &'a Totals,
    lines: &'a [PricedLine],
    at: DateTime<Utc>,
}

impl PendingSale<'_> {
    async fn persist<C: sea_orm::ConnectionTrait>(
        &self,
        txn: &C,
    ) -> Result<(InvoiceDetails, Vec<StockAdjustment>), ServiceError> {
        let ctx = MovementContext::new(MovementType::Sale, self.invoice_no)
            .reference_id(Some(self.invoice_id))
            .handled_by(self.seller_id);

        let mut adjustments = Vec::with_capacity(self.lines.len());
        for line in self.lines {
            let adjustment = apply_adjustment(txn, line.target, -line.quantity, &ctx)
                .await
                .map_err(|e| e.at_line(line.line_no))?;
            adjustments.push(adjustment);
        }

        let invoice = invoice::ActiveModel {
            id: Set(self.invoice_id),
            invoice_no: Set(self.invoice_no.to_string()),
            customer_id: Set(self.customer_id),
            seller_id: Set(self.seller_id),
            subtotal: Set(self.totals.subtotal),
            discount: Set(self.totals.discount),
            tax: Set(self.totals.tax),
            total: Set(self.totals.total),
            payment_method: Set(self.payment_method),
            paid_amount: Set(self.totals.paid_amount),
            change_amount: Set(self.totals.change),
            payment_status: Set(self.totals.payment_status),
            status: Set(InvoiceStatus::Completed),
            notes: Set(self.notes.map(str::to_string)),
            created_at: Set(self.at),
            updated_at: Set(self.at),
        }
        .insert(txn)
        .await?;

        let mut items = Vec::with_capacity(self.lines.len());
        for line in self.lines {
            let item = invoice_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                invoice_id: Set(self.invoice_id),
                line_no: Set(line.line_no as i32),
                product_id: Set(line.target.product_id),
                model_type: Set(line.target.model_type),
                variant_id: Set(line.target.variant_id),
                variant_label: Set(line.variant_label.clone()),
                product_name: Set(line.product_name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                unit_cost: Set(line.unit_cost),
                total_price: Set(line.total_price),
            }
            .insert(txn)
            .await?;
            items.push(item);

            if let Some(customer_id) = self.customer_id {
                customer_purchase::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    customer_id: Set(customer_id),
                    invoice_id: Set(self.invoice_id),
                    product_id: Set(line.target.product_id),
                    model_type: Set(line.target.model_type),
                    quantity: Set(line.quantity),
                    total_spent: Set(line.total_price),
                    purchased_at: Set(self.at),
                }
                .insert(txn)
                .await?;
            }

            if let Some(seller_id) = self.seller_id {
                seller_sale::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    seller_id: Set(seller_id),
                    invoice_id: Set(self.invoice_id),
                    product_id: Set(line.target.product_id),
                    model_type: Set(line.target.model_type),
                    quantity: Set(line.quantity),
                    total_price: Set(line.total_price),
                    sold_at: Set(self.at),
                }
                .insert(txn)
                .await?;
            }
        }

        Ok((InvoiceDetails { invoice, items }, adjustments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn line(line_no: usize, product: Uuid, quantity: i32, available: i32) -> PricedLine {
        PricedLine {
            line_no,
            target: StockTarget {
                product_id: product,
                model_type: ModelType::Accessory,
                variant_id: None,
            },
            quantity,
            product_name: "USB-C cable".to_string(),
            variant_label: None,
            unit_price: dec!(5),
            unit_cost: dec!(2),
            total_price: line_total(dec!(5), quantity),
            available,
        }
    }

    #[test]
    fn repeated_lines_are_summed_per_stock_unit() {
        let cable = Uuid::new_v4();
        let lines = vec![line(1, cable, 2, 3), line(2, cable, 2, 3)];
        let err = check_availability(&lines).unwrap_err();
        assert_matches!(err, ServiceError::InsufficientStock(msg) if msg.starts_with("line 2:"));
    }

    #[test]
    fn distinct_units_are_checked_independently() {
        let lines = vec![line(1, Uuid::new_v4(), 3, 3), line(2, Uuid::new_v4(), 1, 1)];
        assert!(check_availability(&lines).is_ok());
    }
}
