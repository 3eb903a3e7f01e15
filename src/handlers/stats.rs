use super::common::{map_service_error, success_response};
use crate::{errors::ApiError, handlers::AppState, ApiResponse};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

/// Router for the statistics projection
pub fn stats_routes() -> Router<AppState> {
    Router::new().route("/", get(get_stats))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatsWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Branch inventory statistics
#[utoipa::path(
    get,
    path = "/api/v1/branches/{branch_id}/stats",
    params(("branch_id" = Uuid, Path, description = "Branch scope"), StatsWindow),
    responses(
        (status = 200, description = "Statistics returned"),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stats"
)]
pub async fn get_stats(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
    Query(window): Query<StatsWindow>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .stats
        .get_stats(branch_id, window.from, window.to)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(stats)))
}
