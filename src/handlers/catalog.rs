//! Phone and accessory catalog endpoints.

use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse, PaginationParams,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    middleware_helpers::Actor,
    services::catalog::{
        AccessoryFilter, CreateAccessory, CreatePhone, CreateVariant, PhoneFilter,
        UpdateAccessory, UpdatePhone,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tracing::info;
use uuid::Uuid;

/// Add a phone, optionally with variants and opening stock
#[utoipa::path(
    post,
    path = "/api/v1/phones",
    request_body = CreatePhone,
    responses(
        (status = 201, description = "Phone created", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Slug or SKU already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "phones"
)]
pub async fn create_phone(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreatePhone>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let phone = state
        .services
        .catalog
        .create_phone(payload, actor.user_id)
        .await
        .map_err(map_service_error)?;

    info!("Phone created: {}", phone.phone.id);
    Ok(created_response(phone))
}

#[utoipa::path(
    get,
    path = "/api/v1/phones",
    params(PaginationParams, PhoneFilter),
    responses(
        (status = 200, description = "Phones", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "phones"
)]
pub async fn list_phones(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<PhoneFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let (phones, total) = state
        .services
        .catalog
        .list_phones(&filter, pagination.page(), pagination.per_page())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        phones,
        &pagination,
        total,
    )))
}

/// Get a phone with its variants
#[utoipa::path(
    get,
    path = "/api/v1/phones/{id}",
    params(("id" = Uuid, Path, description = "Phone ID")),
    responses(
        (status = 200, description = "Phone fetched", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Phone not found", body = crate::errors::ErrorResponse)
    ),
    tag = "phones"
)]
pub async fn get_phone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let phone = state
        .services
        .catalog
        .get_phone(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(phone))
}

#[utoipa::path(
    put,
    path = "/api/v1/phones/{id}",
    params(("id" = Uuid, Path, description = "Phone ID")),
    request_body = UpdatePhone,
    responses(
        (status = 200, description = "Phone updated", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Phone or supplier not found", body = crate::errors::ErrorResponse)
    ),
    tag = "phones"
)]
pub async fn update_phone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePhone>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let phone = state
        .services
        .catalog
        .update_phone(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(phone))
}

#[utoipa::path(
    delete,
    path = "/api/v1/phones/{id}",
    params(("id" = Uuid, Path, description = "Phone ID")),
    responses(
        (status = 204, description = "Phone deleted"),
        (status = 404, description = "Phone not found", body = crate::errors::ErrorResponse)
    ),
    tag = "phones"
)]
pub async fn delete_phone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .delete_phone(id)
        .await
        .map_err(map_service_error)?;

    info!("Phone deleted: {}", id);
    Ok(no_content_response())
}

/// Add a storage/color/condition variant to a phone
#[utoipa::path(
    post,
    path = "/api/v1/phones/{id}/variants",
    params(("id" = Uuid, Path, description = "Phone ID")),
    request_body = CreateVariant,
    responses(
        (status = 201, description = "Variant added", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Phone not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU in use or phone holds variant-less stock", body = crate::errors::ErrorResponse)
    ),
    tag = "phones"
)]
pub async fn add_variant(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateVariant>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let phone = state
        .services
        .catalog
        .add_variant(id, payload, actor.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(phone))
}

#[utoipa::path(
    post,
    path = "/api/v1/phones/{id}/deactivate",
    params(("id" = Uuid, Path, description = "Phone ID")),
    responses(
        (status = 200, description = "Phone deactivated", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Phone not found", body = crate::errors::ErrorResponse)
    ),
    tag = "phones"
)]
pub async fn deactivate_phone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let phone = state
        .services
        .catalog
        .deactivate_phone(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(phone))
}

/// Add an accessory; a SKU is generated when none is given
#[utoipa::path(
    post,
    path = "/api/v1/accessories",
    request_body = CreateAccessory,
    responses(
        (status = 201, description = "Accessory created", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already in use", body = crate::errors::ErrorResponse)
    ),
    tag = "accessories"
)]
pub async fn create_accessory(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateAccessory>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let accessory = state
        .services
        .catalog
        .create_accessory(payload, actor.user_id)
        .await
        .map_err(map_service_error)?;

    info!("Accessory created: {}", accessory.accessory.sku);
    Ok(created_response(accessory))
}

#[utoipa::path(
    get,
    path = "/api/v1/accessories",
    params(PaginationParams, AccessoryFilter),
    responses(
        (status = 200, description = "Accessories", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "accessories"
)]
pub async fn list_accessories(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<AccessoryFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let (accessories, total) = state
        .services
        .catalog
        .list_accessories(&filter, pagination.page(), pagination.per_page())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::new(
        accessories,
        &pagination,
        total,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/accessories/{id}",
    params(("id" = Uuid, Path, description = "Accessory ID")),
    responses(
        (status = 200, description = "Accessory fetched", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Accessory not found", body = crate::errors::ErrorResponse)
    ),
    tag = "accessories"
)]
pub async fn get_accessory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let accessory = state
        .services
        .catalog
        .get_accessory(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(accessory))
}

#[utoipa::path(
    put,
    path = "/api/v1/accessories/{id}",
    params(("id" = Uuid, Path, description = "Accessory ID")),
    request_body = UpdateAccessory,
    responses(
        (status = 200, description = "Accessory updated", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Accessory or supplier not found", body = crate::errors::ErrorResponse)
    ),
    tag = "accessories"
)]
pub async fn update_accessory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAccessory>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let accessory = state
        .services
        .catalog
        .update_accessory(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(accessory))
}

#[utoipa::path(
    delete,
    path = "/api/v1/accessories/{id}",
    params(("id" = Uuid, Path, description = "Accessory ID")),
    responses(
        (status = 204, description = "Accessory deleted"),
        (status = 404, description = "Accessory not found", body = crate::errors::ErrorResponse)
    ),
    tag = "accessories"
)]
pub async fn delete_accessory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .delete_accessory(id)
        .await
        .map_err(map_service_error)?;

    info!("Accessory deleted: {}", id);
    Ok(no_content_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/accessories/{id}/deactivate",
    params(("id" = Uuid, Path, description = "Accessory ID")),
    responses(
        (status = 200, description = "Accessory deactivated", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Accessory not found", body = crate::errors::ErrorResponse)
    ),
    tag = "accessories"
)]
pub async fn deactivate_accessory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let accessory = state
        .services
        .catalog
        .deactivate_accessory(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(accessory))
}

pub fn phone_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_phone).get(list_phones))
        .route(
            "/:id",
            get(get_phone).put(update_phone).delete(delete_phone),
        )
        .route("/:id/variants", post(add_variant))
        .route("/:id/deactivate", post(deactivate_phone))
}

pub fn accessory_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_accessory).get(list_accessories))
        .route(
            "/:id",
            get(get_accessory)
                .put(update_accessory)
                .delete(delete_accessory),
        )
        .route("/:id/deactivate", post(deactivate_accessory))
}
