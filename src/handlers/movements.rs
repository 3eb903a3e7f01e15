use super::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    entities::stock_movement::{MovementDirection, MovementType},
    errors::ApiError,
    handlers::AppState,
    services::movements::RecordMovementCommand,
    ApiResponse, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Router for movement-ledger endpoints
pub fn movement_routes() -> Router<AppState> {
    Router::new().route("/", post(record_movement).get(list_movements))
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecordMovementRequest {
    pub product_id: Uuid,
    /// One of `in`, `out`, `adjustment`, `transfer`
    #[schema(value_type = String, example = "out")]
    pub movement_type: MovementType,
    /// Required for `adjustment`; must be omitted for the other kinds
    #[schema(value_type = Option<String>, example = "decrease")]
    pub direction: Option<MovementDirection>,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 255))]
    pub reason: String,
    #[validate(length(max = 100))]
    pub reference_number: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    /// Actor id, resolved by the auth layer in front of this service
    pub created_by: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MovementFilters {
    pub product_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Record a stock movement
#[utoipa::path(
    post,
    path = "/api/v1/branches/{branch_id}/movements",
    params(("branch_id" = Uuid, Path, description = "Branch scope")),
    request_body = RecordMovementRequest,
    responses(
        (status = 201, description = "Movement committed"),
        (status = 400, description = "Invalid movement", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent update conflict", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn record_movement(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
    Json(request): Json<RecordMovementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;

    let movement = state
        .movements
        .record_movement(RecordMovementCommand {
            product_id: request.product_id,
            branch_id,
            movement_type: request.movement_type,
            direction: request.direction,
            quantity: request.quantity,
            reason: request.reason,
            reference_number: request.reference_number,
            notes: request.notes,
            created_by: request.created_by,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::success(movement)))
}

/// List movements for a branch
#[utoipa::path(
    get,
    path = "/api/v1/branches/{branch_id}/movements",
    params(("branch_id" = Uuid, Path, description = "Branch scope"), MovementFilters),
    responses(
        (status = 200, description = "Movement page returned"),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "movements"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
    Query(filters): Query<MovementFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let page = filters.page.unwrap_or(1).max(1);
    let limit = filters.limit.unwrap_or(20).clamp(1, 100);

    let (items, total) = state
        .movements
        .list_movements(
            branch_id,
            filters.product_id,
            filters.from,
            filters.to,
            page,
            limit,
        )
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
