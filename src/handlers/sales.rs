use super::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    middleware_helpers::Actor,
    services::sales::{CreateSale, InvoiceFilter},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tracing::info;
use uuid::Uuid;

/// Record a point-of-sale transaction
#[utoipa::path(
    post,
    path = "/api/v1/sales",
    request_body = CreateSale,
    responses(
        (status = 201, description = "Sale recorded, invoice returned", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Empty cart, missing payment, missing variant or invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product, variant or customer not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn create_sale(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateSale>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let invoice = state
        .services
        .sales
        .create_sale(payload, actor.user_id)
        .await
        .map_err(map_service_error)?;

    info!(invoice_no = %invoice.invoice.invoice_no, "Sale recorded");
    Ok(created_response(invoice))
}

/// List invoices, newest first
#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    params(PaginationParams, InvoiceFilter),
    responses(
        (status = 200, description = "Invoices", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "sales"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<InvoiceFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let (invoices, total) = state
        .services
        .sales
        .list_invoices(&filter, pagination.page(), pagination.per_page())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        invoices,
        &pagination,
        total,
    )))
}

/// Get an invoice with its items
#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice = state
        .services
        .sales
        .get_invoice(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(invoice))
}

/// Look up an invoice by its number
#[utoipa::path(
    get,
    path = "/api/v1/invoices/by-number/{invoice_no}",
    params(("invoice_no" = String, Path, description = "Invoice number, e.g. INV-20250115-0007")),
    responses(
        (status = 200, description = "Invoice", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn get_invoice_by_number(
    State(state): State<AppState>,
    Path(invoice_no): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice = state
        .services
        .sales
        .get_invoice_by_number(&invoice_no)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(invoice))
}

/// Cancel a completed invoice and return its stock
#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/cancel",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice cancelled", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invoice is not completed", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn cancel_invoice(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice = state
        .services
        .sales
        .cancel_invoice(id, actor.user_id)
        .await
        .map_err(map_service_error)?;

    info!(invoice_id = %id, "Invoice cancelled");
    Ok(success_response(invoice))
}

pub fn sales_routes() -> Router<AppState> {
    Router::new().route("/", post(create_sale))
}

pub fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_invoices))
        .route("/:id", get(get_invoice))
        .route("/by-number/:invoice_no", get(get_invoice_by_number))
        .route("/:id/cancel", post(cancel_invoice))
}
