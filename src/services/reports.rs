//! Read-only rollups over invoices, the catalog and the movement ledger.
//! Invoice rollups are aggregated in SQL. SQLite hands decimal sums back as
//! floats, so money sums are rounded to the column scale on the way out.

use crate::{
    entities::{
        accessory, customer, invoice, invoice::InvoiceStatus, invoice_item, phone, stock_movement,
        supplier, ModelType, MovementType,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func, SimpleExpr},
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const DEFAULT_LIMIT: u64 = 10;
/// Scale of every money column.
const MONEY_SCALE: u32 = 4;

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportRange {
    /// Inclusive lower bound
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
}

impl ReportRange {
    fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StockAlert {
    pub product_id: Uuid,
    pub model_type: ModelType,
    pub name: String,
    pub sku: Option<String>,
    pub stock: i32,
    pub low_stock_threshold: i32,
}

impl From<phone::Model> for StockAlert {
    fn from(p: phone::Model) -> Self {
        Self {
            product_id: p.id,
            model_type: ModelType::Phone,
            name: p.display_name(),
            sku: p.sku,
            stock: p.stock,
            low_stock_threshold: p.low_stock_threshold,
        }
    }
}

impl From<accessory::Model> for StockAlert {
    fn from(a: accessory::Model) -> Self {
        Self {
            product_id: a.id,
            model_type: ModelType::Accessory,
            name: a.name,
            sku: Some(a.sku),
            stock: a.stock,
            low_stock_threshold: a.low_stock_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProfitSummary {
    pub invoice_count: u64,
    /// Σ line totals
    #[schema(value_type = String)]
    pub revenue: Decimal,
    /// Σ unit_cost × quantity
    #[schema(value_type = String)]
    pub cost: Decimal,
    #[schema(value_type = String)]
    pub gross_profit: Decimal,
    #[schema(value_type = String)]
    pub discounts: Decimal,
    #[schema(value_type = String)]
    pub taxes: Decimal,
    /// Σ invoice totals
    #[schema(value_type = String)]
    pub net_sales: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TopSeller {
    pub product_id: Uuid,
    pub model_type: ModelType,
    pub product_name: String,
    pub quantity_sold: i64,
    #[schema(value_type = String)]
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub invoice_count: u64,
    #[schema(value_type = String)]
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TodaySummary {
    pub date: NaiveDate,
    pub invoice_count: u64,
    #[schema(value_type = String)]
    pub revenue: Decimal,
    pub items_sold: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Dashboard {
    pub phones: u64,
    pub accessories: u64,
    pub suppliers: u64,
    pub customers: u64,
    pub low_stock: u64,
    pub out_of_stock: u64,
}

/// Completed invoices created in `[from, to)`.
fn completed_between(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Condition {
    let mut cond = Condition::all().add(invoice::Column::Status.eq(InvoiceStatus::Completed));
    if let Some(from) = from {
        cond = cond.add(invoice::Column::CreatedAt.gte(from));
    }
    if let Some(to) = to {
        cond = cond.add(invoice::Column::CreatedAt.lt(to));
    }
    cond
}

fn item_col(column: invoice_item::Column) -> Expr {
    Expr::col((invoice_item::Entity, column))
}

fn invoice_col(column: invoice::Column) -> Expr {
    Expr::col((invoice::Entity, column))
}

fn money(sum: Option<Decimal>) -> Decimal {
    sum.unwrap_or_default().round_dp(MONEY_SCALE)
}

/// `YYYY-MM-DD` of an invoice's UTC creation time.
fn invoice_day(backend: DbBackend) -> SimpleExpr {
    match backend {
        DbBackend::Postgres => Expr::cust(
            r#"to_char("invoices"."created_at" AT TIME ZONE 'UTC', 'YYYY-MM-DD')"#,
        ),
        _ => Expr::cust(r#"strftime('%Y-%m-%d', "invoices"."created_at")"#),
    }
}

/// Header sums over a set of invoices.
struct InvoiceTotals {
    count: u64,
    discounts: Decimal,
    taxes: Decimal,
    total: Decimal,
}

/// Line sums over a set of invoices.
struct LineTotals {
    revenue: Decimal,
    cost: Decimal,
    quantity: i64,
}

/// Start of the UTC day containing `at`.
fn day_start(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&at.date_naive().and_time(NaiveTime::MIN))
}

#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn invoice_totals(&self, filter: Condition) -> Result<InvoiceTotals, ServiceError> {
        let row: Option<(i64, Option<Decimal>, Option<Decimal>, Option<Decimal>)> =
            invoice::Entity::find()
                .select_only()
                .column_as(SimpleExpr::from(Func::count(invoice_col(invoice::Column::Id))), "invoice_count")
                .column_as(SimpleExpr::from(Func::sum(invoice_col(invoice::Column::Discount))), "discounts")
                .column_as(SimpleExpr::from(Func::sum(invoice_col(invoice::Column::Tax))), "taxes")
                .column_as(SimpleExpr::from(Func::sum(invoice_col(invoice::Column::Total))), "total")
                .filter(filter)
                .into_tuple()
                .one(&*self.db)
                .await?;
        let (count, discounts, taxes, total) = row.unwrap_or((0, None, None, None));
        Ok(InvoiceTotals {
            count: count.max(0) as u64,
            discounts: money(discounts),
            taxes: money(taxes),
            total: money(total),
        })
    }

    async fn line_totals(&self, filter: Condition) -> Result<LineTotals, ServiceError> {
        let row: Option<(Option<Decimal>, Option<Decimal>, Option<i64>)> =
            invoice_item::Entity::find()
                .select_only()
                .column_as(SimpleExpr::from(Func::sum(item_col(invoice_item::Column::TotalPrice))), "revenue")
                .column_as(
                    SimpleExpr::from(Func::sum(
                        item_col(invoice_item::Column::UnitCost)
                            .mul(item_col(invoice_item::Column::Quantity)),
                    )),
                    "cost",
                )
                .column_as(SimpleExpr::from(Func::sum(item_col(invoice_item::Column::Quantity))), "quantity")
                .join(JoinType::InnerJoin, invoice_item::Relation::Invoice.def())
                .filter(filter)
                .into_tuple()
                .one(&*self.db)
                .await?;
        let (revenue, cost, quantity) = row.unwrap_or((None, None, None));
        Ok(LineTotals {
            revenue: money(revenue),
            cost: money(cost),
            quantity: quantity.unwrap_or_default(),
        })
    }

    /// Active products with `0 < stock <= threshold`.
    #[instrument(skip(self))]
    pub async fn low_stock(&self) -> Result<Vec<StockAlert>, ServiceError> {
        let db = &*self.db;
        let phones = phone::Entity::find()
            .filter(phone::Column::IsActive.eq(true))
            .filter(phone::Column::Stock.gt(0))
            .filter(
                Expr::col(phone::Column::Stock)
                    .lte(Expr::col(phone::Column::LowStockThreshold)),
            )
            .order_by_asc(phone::Column::Stock)
            .all(db)
            .await?;
        let accessories = accessory::Entity::find()
            .filter(accessory::Column::IsActive.eq(true))
            .filter(accessory::Column::Stock.gt(0))
            .filter(
                Expr::col(accessory::Column::Stock)
                    .lte(Expr::col(accessory::Column::LowStockThreshold)),
            )
            .order_by_asc(accessory::Column::Stock)
            .all(db)
            .await?;

        Ok(phones
            .into_iter()
            .map(StockAlert::from)
            .chain(accessories.into_iter().map(StockAlert::from))
            .collect())
    }

    /// Active products with `stock <= 0`.
    #[instrument(skip(self))]
    pub async fn out_of_stock(&self) -> Result<Vec<StockAlert>, ServiceError> {
        let db = &*self.db;
        let phones = phone::Entity::find()
            .filter(phone::Column::IsActive.eq(true))
            .filter(phone::Column::Stock.lte(0))
            .order_by_asc(phone::Column::Brand)
            .all(db)
            .await?;
        let accessories = accessory::Entity::find()
            .filter(accessory::Column::IsActive.eq(true))
            .filter(accessory::Column::Stock.lte(0))
            .order_by_asc(accessory::Column::Name)
            .all(db)
            .await?;

        Ok(phones
            .into_iter()
            .map(StockAlert::from)
            .chain(accessories.into_iter().map(StockAlert::from))
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn profit_summary(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<ProfitSummary, ServiceError> {
        let invoices = self.invoice_totals(completed_between(from, to)).await?;
        let lines = self.line_totals(completed_between(from, to)).await?;

        Ok(ProfitSummary {
            invoice_count: invoices.count,
            revenue: lines.revenue,
            cost: lines.cost,
            gross_profit: lines.revenue - lines.cost,
            discounts: invoices.discounts,
            taxes: invoices.taxes,
            net_sales: invoices.total,
        })
    }

    /// Products ranked by units sold, ties broken by revenue.
    #[instrument(skip(self))]
    pub async fn top_selling(&self, range: &ReportRange) -> Result<Vec<TopSeller>, ServiceError> {
        let rows: Vec<(Uuid, ModelType, Option<String>, Option<i64>, Option<Decimal>)> =
            invoice_item::Entity::find()
                .select_only()
                .column(invoice_item::Column::ProductId)
                .column(invoice_item::Column::ModelType)
                .column_as(SimpleExpr::from(Func::max(item_col(invoice_item::Column::ProductName))), "product_name")
                .column_as(SimpleExpr::from(Func::sum(item_col(invoice_item::Column::Quantity))), "quantity_sold")
                .column_as(SimpleExpr::from(Func::sum(item_col(invoice_item::Column::TotalPrice))), "revenue")
                .join(JoinType::InnerJoin, invoice_item::Relation::Invoice.def())
                .filter(completed_between(range.from, range.to))
                .group_by(invoice_item::Column::ProductId)
                .group_by(invoice_item::Column::ModelType)
                .order_by_desc(item_col(invoice_item::Column::Quantity).sum())
                .order_by_desc(item_col(invoice_item::Column::TotalPrice).sum())
                .order_by_asc(item_col(invoice_item::Column::ProductName).max())
                .limit(range.limit())
                .into_tuple()
                .all(&*self.db)
                .await?;

        Ok(rows
            .into_iter()
            .map(
                |(product_id, model_type, product_name, quantity_sold, revenue)| TopSeller {
                    product_id,
                    model_type,
                    product_name: product_name.unwrap_or_default(),
                    quantity_sold: quantity_sold.unwrap_or_default(),
                    revenue: money(revenue),
                },
            )
            .collect())
    }

    /// One row per UTC day that had sales, oldest first.
    #[instrument(skip(self))]
    pub async fn revenue_by_day(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DailyRevenue>, ServiceError> {
        if to <= from {
            return Err(ServiceError::ValidationError(
                "`to` must be after `from`".to_string(),
            ));
        }
        let day = invoice_day(self.db.get_database_backend());
        let rows: Vec<(String, i64, Option<Decimal>)> = invoice::Entity::find()
            .select_only()
            .column_as(day.clone(), "day")
            .column_as(SimpleExpr::from(Func::count(invoice_col(invoice::Column::Id))), "invoice_count")
            .column_as(SimpleExpr::from(Func::sum(invoice_col(invoice::Column::Total))), "total")
            .filter(completed_between(Some(from), Some(to)))
            .group_by(day.clone())
            .order_by_asc(day)
            .into_tuple()
            .all(&*self.db)
            .await?;

        rows.into_iter()
            .map(|(date, invoice_count, total)| {
                let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
                    ServiceError::InternalError(format!("unreadable invoice day {date:?}: {e}"))
                })?;
                Ok(DailyRevenue {
                    date,
                    invoice_count: invoice_count.max(0) as u64,
                    total: money(total),
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    pub async fn today_summary(&self, now: DateTime<Utc>) -> Result<TodaySummary, ServiceError> {
        let start = day_start(now);
        let end = start + Duration::days(1);
        let invoices = self
            .invoice_totals(completed_between(Some(start), Some(end)))
            .await?;
        let lines = self
            .line_totals(completed_between(Some(start), Some(end)))
            .await?;

        Ok(TodaySummary {
            date: start.date_naive(),
            invoice_count: invoices.count,
            revenue: invoices.total,
            items_sold: lines.quantity,
        })
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<Dashboard, ServiceError> {
        let db = &*self.db;
        let low_stock = self.low_stock().await?.len() as u64;
        let out_of_stock = self.out_of_stock().await?.len() as u64;

        Ok(Dashboard {
            phones: phone::Entity::find().count(db).await?,
            accessories: accessory::Entity::find().count(db).await?,
            suppliers: supplier::Entity::find().count(db).await?,
            customers: customer::Entity::find().count(db).await?,
            low_stock,
            out_of_stock,
        })
    }

    /// Most recent restock movements, newest first.
    #[instrument(skip(self))]
    pub async fn restock_history(
        &self,
        range: &ReportRange,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let mut query = stock_movement::Entity::find()
            .filter(stock_movement::Column::MovementType.eq(MovementType::Restock));
        if let Some(from) = range.from {
            query = query.filter(stock_movement::Column::CreatedAt.gte(from));
        }
        if let Some(to) = range.to {
            query = query.filter(stock_movement::Column::CreatedAt.lt(to));
        }
        let movements = query
            .order_by_desc(stock_movement::Column::CreatedAt)
            .limit(range.limit())
            .all(&*self.db)
            .await?;
        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_start_truncates_to_midnight_utc() {
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 17, 42, 5).unwrap();
        assert_eq!(day_start(at), Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn range_limit_defaults_and_floors() {
        assert_eq!(ReportRange::default().limit(), 10);
        let zero = ReportRange {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.limit(), 1);
    }
}
