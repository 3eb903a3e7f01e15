use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use stockledger_api::{
    config::AppConfig,
    db::{self, DbConfig},
    entities::product::{self, ProductStatus},
    events::{self, EventSender},
    AppState,
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Spin up an application state backed by an in-memory SQLite database with
/// migrations applied.
///
/// The pool is pinned to a single connection: it keeps the in-memory
/// database alive for the whole test and funnels concurrent writers through
/// the same connection, so version conflicts surface exactly as they would
/// against a shared server database.
pub async fn setup() -> AppState {
    setup_with_retry_limit(3).await
}

pub async fn setup_with_retry_limit(retry_limit: u32) -> AppState {
    let db_cfg = DbConfig {
        url: "sqlite::memory:".into(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let pool = db::establish_connection_with_config(&db_cfg)
        .await
        .expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");

    let (tx, rx) = mpsc::channel(256);
    let sender = EventSender::new(tx);
    tokio::spawn(events::process_events(rx));

    let mut cfg = AppConfig::new(
        "sqlite::memory:".into(),
        "127.0.0.1".into(),
        18080,
        "test".into(),
    );
    cfg.movement_retry_limit = retry_limit;

    AppState::new(Arc::new(pool), cfg, sender)
}

/// Insert a product directly; catalog management is outside the ledger's
/// surface, so tests seed rows the way the excluded CRUD layer would.
pub async fn seed_product(
    state: &AppState,
    branch_id: Uuid,
    sku: &str,
    stock_quantity: i32,
) -> product::Model {
    seed_product_with_levels(state, branch_id, sku, stock_quantity, 10).await
}

pub async fn seed_product_with_levels(
    state: &AppState,
    branch_id: Uuid,
    sku: &str,
    stock_quantity: i32,
    min_stock_level: i32,
) -> product::Model {
    let model = product::ActiveModel {
        id: Set(Uuid::new_v4()),
        branch_id: Set(branch_id),
        sku: Set(sku.to_string()),
        name: Set(format!("{} test product", sku)),
        description: Set(None),
        stock_quantity: Set(stock_quantity),
        min_stock_level: Set(min_stock_level),
        max_stock_level: Set(None),
        reorder_point: Set(min_stock_level),
        unit_price: Set(Decimal::new(1250, 2)),
        cost_price: Set(Decimal::new(800, 2)),
        status: Set(ProductStatus::Active.as_str().to_string()),
        version: Set(1),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    };

    model
        .insert(state.db.as_ref())
        .await
        .expect("seed product")
}
