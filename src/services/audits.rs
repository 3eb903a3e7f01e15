use crate::{
    db::DbPool,
    entities::{
        stock_audit::{self, AuditStatus, Entity as StockAudit},
        stock_audit_item::{self, Entity as StockAuditItem},
        stock_movement::{self, MovementDirection, MovementType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{catalog::ProductCatalogService, movements::RecordMovementCommand, StockMovementService},
};
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAuditCommand {
    pub branch_id: Uuid,
    pub audit_date: NaiveDate,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CountItemCommand {
    pub branch_id: Uuid,
    pub audit_id: Uuid,
    pub product_id: Uuid,
    #[validate(range(min = 0))]
    pub actual_quantity: i32,
    pub counted_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileCommand {
    pub branch_id: Uuid,
    pub audit_id: Uuid,
    pub product_id: Uuid,
    pub created_by: Uuid,
}

/// Physical stock counts and their reconciliation against the ledger.
///
/// Audits never change product quantities by themselves; a discrepancy only
/// reaches the catalog through an explicit `reconcile`, which routes an
/// adjustment movement through the ledger.
#[derive(Clone)]
pub struct StockAuditService {
    db_pool: Arc<DbPool>,
    catalog: ProductCatalogService,
    movements: StockMovementService,
    event_sender: EventSender,
}

impl StockAuditService {
    pub fn new(
        db_pool: Arc<DbPool>,
        catalog: ProductCatalogService,
        movements: StockMovementService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db_pool,
            catalog,
            movements,
            event_sender,
        }
    }

    /// Create a new audit in `pending` state with zeroed counters.
    #[instrument(skip(self, command), fields(branch_id = %command.branch_id))]
    pub async fn create_audit(
        &self,
        command: CreateAuditCommand,
    ) -> Result<stock_audit::Model, ServiceError> {
        command.validate()?;
        let db = self.db_pool.as_ref();

        let audit = stock_audit::ActiveModel {
            id: Set(Uuid::new_v4()),
            branch_id: Set(command.branch_id),
            audit_date: Set(command.audit_date),
            status: Set(AuditStatus::Pending.as_str().to_string()),
            total_items: Set(0),
            counted_items: Set(0),
            discrepancies: Set(0),
            notes: Set(command.notes),
            created_by: Set(command.created_by),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            completed_at: Set(None),
        };

        let audit = audit.insert(db).await.map_err(ServiceError::db_error)?;

        info!(audit_id = %audit.id, "Stock audit created");
        self.event_sender
            .send(Event::AuditCreated(audit.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(audit)
    }

    /// Fetch an audit within the caller's branch scope.
    #[instrument(skip(self))]
    pub async fn get_audit(
        &self,
        branch_id: Uuid,
        audit_id: Uuid,
    ) -> Result<stock_audit::Model, ServiceError> {
        let db = self.db_pool.as_ref();

        StockAudit::find()
            .filter(stock_audit::Column::Id.eq(audit_id))
            .filter(stock_audit::Column::BranchId.eq(branch_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Audit {} not found", audit_id)))
    }

    /// Fetch an audit together with its items.
    #[instrument(skip(self))]
    pub async fn get_audit_with_items(
        &self,
        branch_id: Uuid,
        audit_id: Uuid,
    ) -> Result<(stock_audit::Model, Vec<stock_audit_item::Model>), ServiceError> {
        let audit = self.get_audit(branch_id, audit_id).await?;
        let db = self.db_pool.as_ref();

        let items = StockAuditItem::find()
            .filter(stock_audit_item::Column::AuditId.eq(audit.id))
            .order_by_asc(stock_audit_item::Column::CountedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((audit, items))
    }

    /// Lists audits for a branch, newest first, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn list_audits(
        &self,
        branch_id: Uuid,
        status: Option<AuditStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_audit::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = StockAudit::find()
            .filter(stock_audit::Column::BranchId.eq(branch_id))
            .order_by_desc(stock_audit::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(stock_audit::Column::Status.eq(status.as_str()));
        }

        let paginator = query.paginate(db, limit);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total))
    }

    /// Record one product's physical count within an audit.
    ///
    /// The first count moves a `pending` audit to `in_progress`. The
    /// expected quantity snapshots the product's live quantity at call time,
    /// so counts tolerate running behind concurrent movements. Counting a
    /// product twice replaces the earlier row.
    #[instrument(skip(self, command), fields(audit_id = %command.audit_id, product_id = %command.product_id))]
    pub async fn add_item(
        &self,
        command: CountItemCommand,
    ) -> Result<stock_audit_item::Model, ServiceError> {
        command.validate()?;

        let audit = self.get_audit(command.branch_id, command.audit_id).await?;
        let status = parse_status(&audit)?;
        if !status.accepts_items() {
            return Err(ServiceError::InvalidState(format!(
                "Audit {} is {} and accepts no further counts",
                audit.id, audit.status
            )));
        }

        let expected_quantity = self
            .catalog
            .get_quantity(command.branch_id, command.product_id)
            .await?;
        let difference = command.actual_quantity - expected_quantity;
        let starting = status == AuditStatus::Pending;

        let db = self.db_pool.as_ref();
        let audit_for_txn = audit.clone();
        let cmd = command.clone();

        let item = db
            .transaction::<_, stock_audit_item::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    // Recount replaces the prior row for this product
                    StockAuditItem::delete_many()
                        .filter(stock_audit_item::Column::AuditId.eq(cmd.audit_id))
                        .filter(stock_audit_item::Column::ProductId.eq(cmd.product_id))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let item = stock_audit_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        audit_id: Set(cmd.audit_id),
                        product_id: Set(cmd.product_id),
                        branch_id: Set(cmd.branch_id),
                        expected_quantity: Set(expected_quantity),
                        actual_quantity: Set(cmd.actual_quantity),
                        difference: Set(difference),
                        counted_at: Set(Utc::now()),
                        reconciled_at: Set(None),
                        reconciled_movement_id: Set(None),
                    };
                    let item = item.insert(txn).await.map_err(ServiceError::db_error)?;

                    // Derived counters are recomputed from the items, not
                    // incremented, so replaced rows cannot skew them
                    let items = StockAuditItem::find()
                        .filter(stock_audit_item::Column::AuditId.eq(cmd.audit_id))
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    let counted = items.len() as i32;
                    let discrepancies =
                        items.iter().filter(|i| i.difference != 0).count() as i32;

                    let mut audit_update: stock_audit::ActiveModel = audit_for_txn.into();
                    if starting {
                        audit_update.status = Set(AuditStatus::InProgress.as_str().to_string());
                    }
                    audit_update.total_items = Set(counted);
                    audit_update.counted_items = Set(counted);
                    audit_update.discrepancies = Set(discrepancies);
                    audit_update
                        .update(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    Ok(item)
                })
            })
            .await
            .map_err(unwrap_transaction_error)?;

        if starting {
            self.event_sender
                .send(Event::AuditStarted(command.audit_id))
                .await
                .map_err(ServiceError::EventError)?;
        }
        self.event_sender
            .send(Event::AuditItemCounted {
                audit_id: command.audit_id,
                product_id: command.product_id,
                difference,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(item)
    }

    /// Mark an in-progress audit as completed. Product quantities stay
    /// untouched; reconciliation is a separate, explicit call.
    #[instrument(skip(self))]
    pub async fn complete_audit(
        &self,
        branch_id: Uuid,
        audit_id: Uuid,
    ) -> Result<stock_audit::Model, ServiceError> {
        let audit = self.get_audit(branch_id, audit_id).await?;
        let status = parse_status(&audit)?;
        if status != AuditStatus::InProgress {
            return Err(ServiceError::InvalidState(format!(
                "Audit {} is {} and cannot be completed",
                audit.id, audit.status
            )));
        }

        let db = self.db_pool.as_ref();
        let mut update: stock_audit::ActiveModel = audit.into();
        update.status = Set(AuditStatus::Completed.as_str().to_string());
        update.completed_at = Set(Some(Utc::now()));
        let audit = update.update(db).await.map_err(ServiceError::db_error)?;

        info!(audit_id = %audit.id, discrepancies = audit.discrepancies, "Stock audit completed");
        self.event_sender
            .send(Event::AuditCompleted(audit.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(audit)
    }

    /// Cancel a pending or in-progress audit. Cancelled audits are retained
    /// for history but never touch the catalog.
    #[instrument(skip(self))]
    pub async fn cancel_audit(
        &self,
        branch_id: Uuid,
        audit_id: Uuid,
    ) -> Result<stock_audit::Model, ServiceError> {
        let audit = self.get_audit(branch_id, audit_id).await?;
        let status = parse_status(&audit)?;
        if status.is_terminal() {
            return Err(ServiceError::InvalidState(format!(
                "Audit {} is {} and cannot be cancelled",
                audit.id, audit.status
            )));
        }

        let db = self.db_pool.as_ref();
        let mut update: stock_audit::ActiveModel = audit.into();
        update.status = Set(AuditStatus::Cancelled.as_str().to_string());
        let audit = update.update(db).await.map_err(ServiceError::db_error)?;

        info!(audit_id = %audit.id, "Stock audit cancelled");
        self.event_sender
            .send(Event::AuditCancelled(audit.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(audit)
    }

    /// Emit the adjustment movement that brings a product's ledger quantity
    /// in line with a completed audit's count.
    ///
    /// The delta is the item's recorded difference, applied as a relative
    /// adjustment rather than an absolute overwrite, so movements committed
    /// between the count and the reconciliation are preserved. Each item
    /// reconciles at most once.
    #[instrument(skip(self, command), fields(audit_id = %command.audit_id, product_id = %command.product_id))]
    pub async fn reconcile(
        &self,
        command: ReconcileCommand,
    ) -> Result<stock_movement::Model, ServiceError> {
        let audit = self.get_audit(command.branch_id, command.audit_id).await?;
        let status = parse_status(&audit)?;
        if status != AuditStatus::Completed {
            return Err(ServiceError::InvalidState(format!(
                "Audit {} is {}; only completed audits reconcile",
                audit.id, audit.status
            )));
        }

        let db = self.db_pool.as_ref();
        let item = StockAuditItem::find()
            .filter(stock_audit_item::Column::AuditId.eq(command.audit_id))
            .filter(stock_audit_item::Column::ProductId.eq(command.product_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Product {} was not counted in audit {}",
                    command.product_id, command.audit_id
                ))
            })?;

        if item.is_reconciled() {
            return Err(ServiceError::AlreadyReconciled(format!(
                "Audit item for product {} already reconciled",
                command.product_id
            )));
        }
        if item.difference == 0 {
            return Err(ServiceError::ValidationError(format!(
                "Audit item for product {} has no discrepancy to reconcile",
                command.product_id
            )));
        }

        // Claim the item before recording the movement; a lost claim means a
        // concurrent reconcile got there first
        let claimed = StockAuditItem::update_many()
            .col_expr(
                stock_audit_item::Column::ReconciledAt,
                Expr::value(Utc::now()),
            )
            .filter(stock_audit_item::Column::Id.eq(item.id))
            .filter(stock_audit_item::Column::ReconciledAt.is_null())
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::AlreadyReconciled(format!(
                "Audit item for product {} already reconciled",
                command.product_id
            )));
        }

        let direction = if item.difference > 0 {
            MovementDirection::Increase
        } else {
            MovementDirection::Decrease
        };
        let movement_command = RecordMovementCommand {
            product_id: command.product_id,
            branch_id: command.branch_id,
            movement_type: MovementType::Adjustment,
            direction: Some(direction),
            quantity: item.difference.abs(),
            reason: "stock audit reconciliation".to_string(),
            reference_number: Some(command.audit_id.to_string()),
            notes: None,
            created_by: command.created_by,
        };

        let movement = match self.movements.record_movement(movement_command).await {
            Ok(movement) => movement,
            Err(e) => {
                // Release the claim so the correction can be retried
                let _ = StockAuditItem::update_many()
                    .col_expr(
                        stock_audit_item::Column::ReconciledAt,
                        Expr::value(None::<chrono::DateTime<Utc>>),
                    )
                    .filter(stock_audit_item::Column::Id.eq(item.id))
                    .exec(db)
                    .await;
                return Err(e);
            }
        };

        StockAuditItem::update_many()
            .col_expr(
                stock_audit_item::Column::ReconciledMovementId,
                Expr::value(movement.id),
            )
            .filter(stock_audit_item::Column::Id.eq(item.id))
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;

        info!(
            audit_id = %command.audit_id,
            product_id = %command.product_id,
            movement_id = %movement.id,
            difference = item.difference,
            "Audit item reconciled"
        );
        self.event_sender
            .send(Event::AuditReconciled {
                audit_id: command.audit_id,
                product_id: command.product_id,
                movement_id: movement.id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(movement)
    }
}

fn parse_status(audit: &stock_audit::Model) -> Result<AuditStatus, ServiceError> {
    AuditStatus::from_str(&audit.status).ok_or_else(|| {
        ServiceError::InternalError(format!(
            "Audit {} carries unknown status {}",
            audit.id, audit.status
        ))
    })
}

fn unwrap_transaction_error(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}
