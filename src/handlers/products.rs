use super::common::{map_service_error, success_response};
use crate::{errors::ApiError, handlers::AppState, ApiResponse, PaginatedResponse};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Router for catalog read endpoints
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/low-stock", get(list_low_stock))
        .route("/{id}", get(get_product))
        .route("/{id}/quantity", get(get_quantity))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuantityResponse {
    pub product_id: Uuid,
    pub stock_quantity: i32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LowStockFilters {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Fetch one product
#[utoipa::path(
    get,
    path = "/api/v1/branches/{branch_id}/products/{id}",
    params(
        ("branch_id" = Uuid, Path, description = "Branch scope"),
        ("id" = Uuid, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Product returned"),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path((branch_id, id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .catalog
        .get_product(branch_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(product)))
}

/// Current on-hand quantity for one product
#[utoipa::path(
    get,
    path = "/api/v1/branches/{branch_id}/products/{id}/quantity",
    params(
        ("branch_id" = Uuid, Path, description = "Branch scope"),
        ("id" = Uuid, Path, description = "Product id")
    ),
    responses(
        (status = 200, description = "Quantity returned"),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_quantity(
    State(state): State<AppState>,
    Path((branch_id, id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let stock_quantity = state
        .catalog
        .get_quantity(branch_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(QuantityResponse {
        product_id: id,
        stock_quantity,
    })))
}

/// Products at or below their minimum stock level
#[utoipa::path(
    get,
    path = "/api/v1/branches/{branch_id}/products/low-stock",
    params(("branch_id" = Uuid, Path, description = "Branch scope"), LowStockFilters),
    responses(
        (status = 200, description = "Low-stock page returned")
    ),
    tag = "products"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
    Query(filters): Query<LowStockFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let page = filters.page.unwrap_or(1).max(1);
    let limit = filters.limit.unwrap_or(20).clamp(1, 100);

    let (items, total) = state
        .catalog
        .list_low_stock(branch_id, page, limit)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse {
        total_pages: total.div_ceil(limit),
        items,
        total,
        page,
        limit,
    }))
}
