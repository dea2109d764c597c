use super::common::{map_service_error, success_response};
use crate::{errors::ApiError, handlers::AppState, services::reports::ReportRange};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{Duration, Utc};

const DEFAULT_REVENUE_WINDOW_DAYS: i64 = 30;

/// Active products at or below their low-stock threshold
#[utoipa::path(
    get,
    path = "/api/v1/reports/low-stock",
    responses((status = 200, description = "Low stock products", body = crate::ApiResponse<serde_json::Value>)),
    tag = "reports"
)]
pub async fn low_stock(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let alerts = state
        .services
        .reports
        .low_stock()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(alerts))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/out-of-stock",
    responses((status = 200, description = "Active products with no stock", body = crate::ApiResponse<serde_json::Value>)),
    tag = "reports"
)]
pub async fn out_of_stock(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let alerts = state
        .services
        .reports
        .out_of_stock()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(alerts))
}

/// Revenue, cost and profit over completed invoices
#[utoipa::path(
    get,
    path = "/api/v1/reports/profit",
    params(ReportRange),
    responses((status = 200, description = "Profit summary", body = crate::ApiResponse<serde_json::Value>)),
    tag = "reports"
)]
pub async fn profit(
    State(state): State<AppState>,
    Query(range): Query<ReportRange>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .reports
        .profit_summary(range.from, range.to)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/top-selling",
    params(ReportRange),
    responses((status = 200, description = "Best sellers by units sold", body = crate::ApiResponse<serde_json::Value>)),
    tag = "reports"
)]
pub async fn top_selling(
    State(state): State<AppState>,
    Query(range): Query<ReportRange>,
) -> Result<impl IntoResponse, ApiError> {
    let ranked = state
        .services
        .reports
        .top_selling(&range)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(ranked))
}

/// Daily revenue; defaults to the last 30 days
#[utoipa::path(
    get,
    path = "/api/v1/reports/revenue-by-day",
    params(ReportRange),
    responses(
        (status = 200, description = "Revenue per UTC day", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Empty date range", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn revenue_by_day(
    State(state): State<AppState>,
    Query(range): Query<ReportRange>,
) -> Result<impl IntoResponse, ApiError> {
    let to = range.to.unwrap_or_else(Utc::now);
    let from = range
        .from
        .unwrap_or_else(|| to - Duration::days(DEFAULT_REVENUE_WINDOW_DAYS));

    let days = state
        .services
        .reports
        .revenue_by_day(from, to)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(days))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/today",
    responses((status = 200, description = "Sales so far today", body = crate::ApiResponse<serde_json::Value>)),
    tag = "reports"
)]
pub async fn today(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .reports
        .today_summary(Utc::now())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/dashboard",
    responses((status = 200, description = "Catalog and stock counts", body = crate::ApiResponse<serde_json::Value>)),
    tag = "reports"
)]
pub async fn dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let dashboard = state
        .services
        .reports
        .dashboard()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(dashboard))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/restock-history",
    params(ReportRange),
    responses((status = 200, description = "Recent restock movements", body = crate::ApiResponse<serde_json::Value>)),
    tag = "reports"
)]
pub async fn restock_history(
    State(state): State<AppState>,
    Query(range): Query<ReportRange>,
) -> Result<impl IntoResponse, ApiError> {
    let movements = state
        .services
        .reports
        .restock_history(&range)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(movements))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/low-stock", get(low_stock))
        .route("/out-of-stock", get(out_of_stock))
        .route("/profit", get(profit))
        .route("/top-selling", get(top_selling))
        .route("/revenue-by-day", get(revenue_by_day))
        .route("/today", get(today))
        .route("/dashboard", get(dashboard))
        .route("/restock-history", get(restock_history))
}
