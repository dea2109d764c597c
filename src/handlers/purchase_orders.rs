use super::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    middleware_helpers::Actor,
    services::purchase_orders::{CreatePurchaseOrder, PurchaseOrderFilter},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tracing::info;
use uuid::Uuid;

/// Create a new purchase order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders",
    request_body = CreatePurchaseOrder,
    responses(
        (status = 201, description = "Purchase order created", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Supplier or product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn create_purchase_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreatePurchaseOrder>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let po = state
        .services
        .purchase_orders
        .create_po(payload, actor.user_id)
        .await
        .map_err(map_service_error)?;

    info!("Purchase order created: {}", po.purchase_order.po_no);
    Ok(created_response(po))
}

/// List purchase orders
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders",
    params(PaginationParams, PurchaseOrderFilter),
    responses(
        (status = 200, description = "Purchase orders", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "purchase-orders"
)]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<PurchaseOrderFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let (orders, total) = state
        .services
        .purchase_orders
        .list_pos(&filter, pagination.page(), pagination.per_page())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        orders,
        &pagination,
        total,
    )))
}

/// Get a purchase order by ID
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/{id}",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order fetched", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(po_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let po = state
        .services
        .purchase_orders
        .get_po(po_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(po))
}

/// Mark a purchase order as sent to the supplier
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/order",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order ordered", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Purchase order is not in created state", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn order_purchase_order(
    State(state): State<AppState>,
    Path(po_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let po = state
        .services
        .purchase_orders
        .mark_ordered(po_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(po))
}

/// Receive every line of a purchase order into stock
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/receive",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order received", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Purchase order or line product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already received or cancelled", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(po_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let po = state
        .services
        .purchase_orders
        .receive_po(po_id, actor.user_id)
        .await
        .map_err(map_service_error)?;

    info!("Purchase order received: {}", po.purchase_order.po_no);
    Ok(success_response(po))
}

/// Cancel a purchase order that has not been received
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order cancelled", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Purchase order already received or cancelled", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    Path(po_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let po = state
        .services
        .purchase_orders
        .cancel_po(po_id)
        .await
        .map_err(map_service_error)?;

    info!("Purchase order cancelled: {}", po.purchase_order.po_no);
    Ok(success_response(po))
}

pub fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_purchase_order).get(list_purchase_orders))
        .route("/:id", get(get_purchase_order))
        .route("/:id/order", post(order_purchase_order))
        .route("/:id/receive", post(receive_purchase_order))
        .route("/:id/cancel", post(cancel_purchase_order))
}
