use crate::{
    db::DbPool,
    entities::product::{self, Entity as Product},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Versioned read handed to the movement ledger before a quantity commit.
/// The token must be echoed back to `apply_quantity`; a stale token means
/// another writer committed in between.
#[derive(Debug, Clone, Copy)]
pub struct QuantityReservation {
    pub quantity: i32,
    pub version: i32,
}

/// The single owner of `Product.stock_quantity`. No other component writes
/// the quantity; the ledger goes through `reserve_update`/`apply_quantity`.
#[derive(Clone)]
pub struct ProductCatalogService {
    db_pool: Arc<DbPool>,
}

impl ProductCatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Fetch a product within the caller's branch scope.
    ///
    /// An id that exists in another branch reports `NotFound`, same as an
    /// unknown id.
    #[instrument(skip(self))]
    pub async fn get_product(
        &self,
        branch_id: Uuid,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        let db = self.db_pool.as_ref();

        Product::find()
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::BranchId.eq(branch_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Current on-hand quantity for a product.
    #[instrument(skip(self))]
    pub async fn get_quantity(
        &self,
        branch_id: Uuid,
        product_id: Uuid,
    ) -> Result<i32, ServiceError> {
        Ok(self.get_product(branch_id, product_id).await?.stock_quantity)
    }

    /// Read the quantity together with its version token, ahead of a commit.
    #[instrument(skip(self))]
    pub async fn reserve_update(
        &self,
        branch_id: Uuid,
        product_id: Uuid,
    ) -> Result<QuantityReservation, ServiceError> {
        let model = self.get_product(branch_id, product_id).await?;
        Ok(QuantityReservation {
            quantity: model.stock_quantity,
            version: model.version,
        })
    }

    /// Commit a new quantity, guarded by the version token from
    /// `reserve_update`. Runs on the caller's connection so the ledger can
    /// place it inside the same transaction as the movement insert.
    ///
    /// Fails with `Conflict` when the token is stale; the caller decides
    /// whether to retry the read-compute-write cycle.
    pub async fn apply_quantity<C: ConnectionTrait>(
        &self,
        conn: &C,
        branch_id: Uuid,
        product_id: Uuid,
        new_quantity: i32,
        version: i32,
    ) -> Result<(), ServiceError> {
        if new_quantity < 0 {
            return Err(ServiceError::ValidationError(format!(
                "Quantity for product {} cannot be negative",
                product_id
            )));
        }

        let result = Product::update_many()
            .col_expr(product::Column::StockQuantity, Expr::value(new_quantity))
            .col_expr(product::Column::Version, Expr::value(version + 1))
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::BranchId.eq(branch_id))
            .filter(product::Column::Version.eq(version))
            .exec(conn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            warn!(
                %product_id,
                version,
                "Version token stale; another writer committed first"
            );
            return Err(ServiceError::Conflict(format!(
                "Concurrent update on product {}",
                product_id
            )));
        }

        Ok(())
    }

    /// Products at or below their minimum stock level (still in stock),
    /// paginated.
    #[instrument(skip(self))]
    pub async fn list_low_stock(
        &self,
        branch_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let paginator = Product::find()
            .filter(product::Column::BranchId.eq(branch_id))
            .filter(product::Column::StockQuantity.gt(0))
            .filter(
                Expr::col(product::Column::StockQuantity)
                    .lte(Expr::col(product::Column::MinStockLevel)),
            )
            .paginate(db, limit);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((items, total))
    }
}
