use super::common::{
    map_service_error, success_response, validate_input, PaginatedResponse, PaginationParams,
};
use crate::{
    entities::MovementType,
    errors::ApiError,
    handlers::AppState,
    middleware_helpers::Actor,
    services::{
        inventory::{AdjustStock, RestockMany},
        stock_movements::MovementFilter,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// `restock` or `sale`; all movement types when absent
    pub movement_type: Option<MovementType>,
    pub limit: Option<u64>,
}

/// Apply a signed manual stock correction
#[utoipa::path(
    post,
    path = "/api/v1/inventory/adjust",
    request_body = AdjustStock,
    responses(
        (status = 200, description = "Stock adjusted", body = crate::ApiResponse<serde_json::Value>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request or variant required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product or variant not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<AdjustStock>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let adjustment = state
        .services
        .inventory
        .adjust_stock(payload, actor.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(adjustment))
}

/// Restock several products from one delivery
#[utoipa::path(
    post,
    path = "/api/v1/inventory/restock",
    request_body = RestockMany,
    responses(
        (status = 200, description = "Stock received", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Supplier, product or variant not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn restock(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<RestockMany>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let adjustments = state
        .services
        .inventory
        .restock_many(payload, actor.user_id)
        .await
        .map_err(map_service_error)?;

    info!(items = adjustments.len(), "Restock recorded");
    Ok(success_response(adjustments))
}

/// List stock movements, newest first
#[utoipa::path(
    get,
    path = "/api/v1/inventory/movements",
    params(PaginationParams, MovementFilter),
    responses(
        (status = 200, description = "Stock movements", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "inventory"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<MovementFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let (movements, total) = state
        .services
        .movements
        .list_movements(&filter, pagination.page(), pagination.per_page())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        movements,
        &pagination,
        total,
    )))
}

/// Restock or sale history of one product
#[utoipa::path(
    get,
    path = "/api/v1/inventory/history/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Phone or accessory ID"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Movement history", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "inventory"
)]
pub async fn product_history(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let history = state
        .services
        .movements
        .product_history(product_id, query.movement_type, query.limit.unwrap_or(50))
        .await
        .map_err(map_service_error)?;
    Ok(success_response(history))
}

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/adjust", post(adjust_stock))
        .route("/restock", post(restock))
        .route("/movements", get(list_movements))
        .route("/history/:product_id", get(product_history))
}
