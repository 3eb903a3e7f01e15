use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as Product, ProductStatus},
        stock_audit::{self, AuditStatus, Entity as StockAudit},
        stock_movement::{self, Entity as StockMovement},
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Point-in-time inventory statistics for one branch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryStats {
    pub total_products: u64,
    pub active_products: u64,
    pub low_stock_products: u64,
    pub out_of_stock_products: u64,
    /// Σ stock_quantity × unit_price over the branch's products
    pub total_stock_value: Decimal,
    /// Movements recorded within the requested window
    pub movements_recorded: u64,
    pub pending_audits: u64,
    pub completed_audits: u64,
}

/// Read-only statistics projector.
///
/// Reads committed state only and never takes locks, so it cannot block
/// writers; numbers may trail in-flight movements by a tick, which is fine
/// for the reporting consumers it feeds.
#[derive(Clone)]
pub struct StockStatsService {
    db_pool: Arc<DbPool>,
}

impl StockStatsService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn get_stats(
        &self,
        branch_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<InventoryStats, ServiceError> {
        let db = self.db_pool.as_ref();

        let total_products = Product::find()
            .filter(product::Column::BranchId.eq(branch_id))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let active_products = Product::find()
            .filter(product::Column::BranchId.eq(branch_id))
            .filter(product::Column::Status.eq(ProductStatus::Active.as_str()))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let low_stock_products = Product::find()
            .filter(product::Column::BranchId.eq(branch_id))
            .filter(product::Column::StockQuantity.gt(0))
            .filter(
                Expr::col(product::Column::StockQuantity)
                    .lte(Expr::col(product::Column::MinStockLevel)),
            )
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let out_of_stock_products = Product::find()
            .filter(product::Column::BranchId.eq(branch_id))
            .filter(product::Column::StockQuantity.eq(0))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let products = Product::find()
            .filter(product::Column::BranchId.eq(branch_id))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let total_stock_value = products.iter().fold(Decimal::ZERO, |acc, p| {
            acc + p.unit_price * Decimal::from(p.stock_quantity)
        });

        let mut movements = StockMovement::find()
            .filter(stock_movement::Column::BranchId.eq(branch_id));
        if let Some(from) = from {
            movements = movements.filter(stock_movement::Column::CreatedAt.gte(from));
        }
        if let Some(to) = to {
            movements = movements.filter(stock_movement::Column::CreatedAt.lte(to));
        }
        let movements_recorded = movements
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let pending_audits = StockAudit::find()
            .filter(stock_audit::Column::BranchId.eq(branch_id))
            .filter(stock_audit::Column::Status.eq(AuditStatus::Pending.as_str()))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let completed_audits = StockAudit::find()
            .filter(stock_audit::Column::BranchId.eq(branch_id))
            .filter(stock_audit::Column::Status.eq(AuditStatus::Completed.as_str()))
            .count(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(InventoryStats {
            total_products,
            active_products,
            low_stock_products,
            out_of_stock_products,
            total_stock_value,
            movements_recorded,
            pending_audits,
            completed_audits,
        })
    }
}
