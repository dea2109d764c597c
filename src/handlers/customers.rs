use super::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::customers::{CreateCustomer, CustomerFilter, CustomerSearch, UpdateCustomer},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/api/v1/customers",
    request_body = CreateCustomer,
    responses(
        (status = 201, description = "Customer created", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Phone number already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    Json(payload): Json<CreateCustomer>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let customer = state
        .services
        .customers
        .create_customer(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(customer))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers",
    params(PaginationParams, CustomerFilter),
    responses(
        (status = 200, description = "Customers", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<CustomerFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let (customers, total) = state
        .services
        .customers
        .list_customers(&filter, pagination.page(), pagination.per_page())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        customers,
        &pagination,
        total,
    )))
}

/// Get a customer with purchase history
#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer fetched", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    tag = "customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = state
        .services
        .customers
        .get_customer(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(customer))
}

#[utoipa::path(
    put,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer ID")),
    request_body = UpdateCustomer,
    responses(
        (status = 200, description = "Customer updated", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Phone number already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomer>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let customer = state
        .services
        .customers
        .update_customer(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(customer))
}

/// Look a customer up by name or phone fragment
#[utoipa::path(
    get,
    path = "/api/v1/customers/search",
    params(CustomerSearch),
    responses(
        (status = 200, description = "Matching customers", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Empty query", body = crate::errors::ErrorResponse)
    ),
    tag = "customers"
)]
pub async fn search_customers(
    State(state): State<AppState>,
    Query(search): Query<CustomerSearch>,
) -> Result<impl IntoResponse, ApiError> {
    let customers = state
        .services
        .customers
        .search_customers(&search)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(customers))
}

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_customer).get(list_customers))
        .route("/search", get(search_customers))
        .route("/:id", get(get_customer).put(update_customer))
}
