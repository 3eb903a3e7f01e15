//! Stockledger API Library
//!
//! Branch-scoped stock ledger: every quantity change is an immutable,
//! auditable movement, physical counts reconcile through the same ledger,
//! and a read-only projector serves inventory statistics.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::Router;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use db::DbPool;
use services::{
    ProductCatalogService, StockAuditService, StockMovementService, StockStatsService,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub catalog: ProductCatalogService,
    pub movements: StockMovementService,
    pub audits: StockAuditService,
    pub stats: StockStatsService,
}

impl AppState {
    /// Wire up the service graph over one connection pool.
    pub fn new(
        db: Arc<DbPool>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let catalog = ProductCatalogService::new(db.clone());
        let movements = StockMovementService::new(
            db.clone(),
            catalog.clone(),
            event_sender.clone(),
            config.movement_retry_limit,
        );
        let audits = StockAuditService::new(
            db.clone(),
            catalog.clone(),
            movements.clone(),
            event_sender.clone(),
        );
        let stats = StockStatsService::new(db.clone());

        Self {
            db,
            config,
            event_sender,
            catalog,
            movements,
            audits,
            stats,
        }
    }
}

/// The versioned API surface. Branch scope is part of every path; no
/// operation runs against an ambient tenant.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest(
            "/branches/{branch_id}/movements",
            handlers::movements::movement_routes(),
        )
        .nest(
            "/branches/{branch_id}/products",
            handlers::products::product_routes(),
        )
        .nest(
            "/branches/{branch_id}/audits",
            handlers::audits::audit_routes(),
        )
        .nest(
            "/branches/{branch_id}/stats",
            handlers::stats::stats_routes(),
        )
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }
}
