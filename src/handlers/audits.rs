use super::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    entities::{
        stock_audit::{self, AuditStatus},
        stock_audit_item,
    },
    errors::ApiError,
    handlers::AppState,
    services::audits::{CountItemCommand, CreateAuditCommand, ReconcileCommand},
    ApiResponse, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Router for stock-audit endpoints
pub fn audit_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_audit).get(list_audits))
        .route("/{id}", get(get_audit))
        .route("/{id}/items", post(count_item))
        .route("/{id}/complete", post(complete_audit))
        .route("/{id}/cancel", post(cancel_audit))
        .route("/{id}/reconcile", post(reconcile))
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAuditRequest {
    pub audit_date: NaiveDate,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Actor id, resolved by the auth layer in front of this service
    pub created_by: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CountItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 0))]
    pub actual_quantity: i32,
    pub counted_by: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconcileRequest {
    pub product_id: Uuid,
    pub created_by: Uuid,
}

#[derive(Debug, Serialize)]
pub struct AuditWithItems {
    #[serde(flatten)]
    pub audit: stock_audit::Model,
    pub items: Vec<stock_audit_item::Model>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditFilters {
    /// One of `pending`, `in_progress`, `completed`, `cancelled`
    pub status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Create a stock audit
#[utoipa::path(
    post,
    path = "/api/v1/branches/{branch_id}/audits",
    params(("branch_id" = Uuid, Path, description = "Branch scope")),
    request_body = CreateAuditRequest,
    responses(
        (status = 201, description = "Audit created in pending state"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "audits"
)]
pub async fn create_audit(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
    Json(request): Json<CreateAuditRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;

    let audit = state
        .audits
        .create_audit(CreateAuditCommand {
            branch_id,
            audit_date: request.audit_date,
            notes: request.notes,
            created_by: request.created_by,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::success(audit)))
}

/// List audits for a branch
#[utoipa::path(
    get,
    path = "/api/v1/branches/{branch_id}/audits",
    params(("branch_id" = Uuid, Path, description = "Branch scope"), AuditFilters),
    responses(
        (status = 200, description = "Audit page returned"),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse)
    ),
    tag = "audits"
)]
pub async fn list_audits(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
    Query(filters): Query<AuditFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match &filters.status {
        Some(raw) => Some(AuditStatus::from_str(raw).ok_or_else(|| {
            ApiError::BadRequest(format!("Unknown audit status filter: {}", raw))
        })?),
        None => None,
    };
    let page = filters.page.unwrap_or(1).max(1);
    let limit = filters.limit.unwrap_or(20).clamp(1, 100);

    let (items, total) = state
        .audits
        .list_audits(branch_id, status, page, limit)
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

/// Fetch one audit with its items
#[utoipa::path(
    get,
    path = "/api/v1/branches/{branch_id}/audits/{id}",
    params(
        ("branch_id" = Uuid, Path, description = "Branch scope"),
        ("id" = Uuid, Path, description = "Audit id")
    ),
    responses(
        (status = 200, description = "Audit returned"),
        (status = 404, description = "Unknown audit", body = crate::errors::ErrorResponse)
    ),
    tag = "audits"
)]
pub async fn get_audit(
    State(state): State<AppState>,
    Path((branch_id, id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let (audit, items) = state
        .audits
        .get_audit_with_items(branch_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(AuditWithItems {
        audit,
        items,
    })))
}

/// Record one product's physical count
#[utoipa::path(
    post,
    path = "/api/v1/branches/{branch_id}/audits/{id}/items",
    params(
        ("branch_id" = Uuid, Path, description = "Branch scope"),
        ("id" = Uuid, Path, description = "Audit id")
    ),
    request_body = CountItemRequest,
    responses(
        (status = 201, description = "Count recorded"),
        (status = 400, description = "Audit not accepting counts", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown audit or product", body = crate::errors::ErrorResponse)
    ),
    tag = "audits"
)]
pub async fn count_item(
    State(state): State<AppState>,
    Path((branch_id, id)): Path<(Uuid, Uuid)>,
    Json(request): Json<CountItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&request)?;

    let item = state
        .audits
        .add_item(CountItemCommand {
            branch_id,
            audit_id: id,
            product_id: request.product_id,
            actual_quantity: request.actual_quantity,
            counted_by: request.counted_by,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::success(item)))
}

/// Complete an in-progress audit
#[utoipa::path(
    post,
    path = "/api/v1/branches/{branch_id}/audits/{id}/complete",
    params(
        ("branch_id" = Uuid, Path, description = "Branch scope"),
        ("id" = Uuid, Path, description = "Audit id")
    ),
    responses(
        (status = 200, description = "Audit completed"),
        (status = 400, description = "Audit not in progress", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown audit", body = crate::errors::ErrorResponse)
    ),
    tag = "audits"
)]
pub async fn complete_audit(
    State(state): State<AppState>,
    Path((branch_id, id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let audit = state
        .audits
        .complete_audit(branch_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(audit)))
}

/// Cancel a pending or in-progress audit
#[utoipa::path(
    post,
    path = "/api/v1/branches/{branch_id}/audits/{id}/cancel",
    params(
        ("branch_id" = Uuid, Path, description = "Branch scope"),
        ("id" = Uuid, Path, description = "Audit id")
    ),
    responses(
        (status = 200, description = "Audit cancelled"),
        (status = 400, description = "Audit already terminal", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown audit", body = crate::errors::ErrorResponse)
    ),
    tag = "audits"
)]
pub async fn cancel_audit(
    State(state): State<AppState>,
    Path((branch_id, id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let audit = state
        .audits
        .cancel_audit(branch_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(audit)))
}

/// Reconcile one counted item of a completed audit
#[utoipa::path(
    post,
    path = "/api/v1/branches/{branch_id}/audits/{id}/reconcile",
    params(
        ("branch_id" = Uuid, Path, description = "Branch scope"),
        ("id" = Uuid, Path, description = "Audit id")
    ),
    request_body = ReconcileRequest,
    responses(
        (status = 201, description = "Adjustment movement committed"),
        (status = 400, description = "Audit not completed or no discrepancy", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown audit or item", body = crate::errors::ErrorResponse),
        (status = 409, description = "Item already reconciled", body = crate::errors::ErrorResponse)
    ),
    tag = "audits"
)]
pub async fn reconcile(
    State(state): State<AppState>,
    Path((branch_id, id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ReconcileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let movement = state
        .audits
        .reconcile(ReconcileCommand {
            branch_id,
            audit_id: id,
            product_id: request.product_id,
            created_by: request.created_by,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::success(movement)))
}
