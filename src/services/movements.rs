use crate::{
    db::DbPool,
    entities::stock_movement::{self, Entity as StockMovement, MovementDirection, MovementType},
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::ProductCatalogService,
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref STOCK_MOVEMENTS: IntCounter = register_int_counter!(
        "stock_movements_total",
        "Total number of committed stock movements"
    )
    .expect("metric can be created");
    static ref STOCK_MOVEMENT_FAILURES: IntCounterVec = register_int_counter_vec!(
        "stock_movement_failures_total",
        "Total number of failed stock movements",
        &["error_type"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordMovementCommand {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub movement_type: MovementType,
    /// Signed intent; required for `adjustment`, rejected for the other
    /// kinds, whose direction is fixed by the type itself.
    pub direction: Option<MovementDirection>,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 255))]
    pub reason: String,
    #[validate(length(max = 100))]
    pub reference_number: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub created_by: Uuid,
}

impl RecordMovementCommand {
    /// Signed quantity change this command applies to the product.
    fn signed_delta(&self) -> Result<i32, ServiceError> {
        match (self.movement_type, self.direction) {
            (MovementType::In, None) => Ok(self.quantity),
            (MovementType::Out, None) | (MovementType::Transfer, None) => Ok(-self.quantity),
            (MovementType::Adjustment, Some(direction)) => Ok(self.quantity * direction.signum()),
            (MovementType::Adjustment, None) => Err(ServiceError::ValidationError(
                "Adjustment movements require an explicit direction".to_string(),
            )),
            (_, Some(_)) => Err(ServiceError::ValidationError(
                "Direction is only valid for adjustment movements".to_string(),
            )),
        }
    }
}

/// The append-only movement ledger.
///
/// Every quantity change goes through `record_movement`, which commits the
/// immutable movement row and the product's new quantity as one unit.
/// Movements are never edited or deleted; corrections are compensating
/// movements.
#[derive(Clone)]
pub struct StockMovementService {
    db_pool: Arc<DbPool>,
    catalog: ProductCatalogService,
    event_sender: EventSender,
    retry_limit: u32,
}

impl StockMovementService {
    pub fn new(
        db_pool: Arc<DbPool>,
        catalog: ProductCatalogService,
        event_sender: EventSender,
        retry_limit: u32,
    ) -> Self {
        Self {
            db_pool,
            catalog,
            event_sender,
            retry_limit: retry_limit.max(1),
        }
    }

    /// Record a stock movement and commit the derived quantity.
    ///
    /// The read-compute-write cycle retries up to the configured bound when
    /// a concurrent writer wins the version race; exhaustion surfaces
    /// `Conflict` to the caller. Movements on different products never
    /// contend.
    #[instrument(skip(self, command), fields(product_id = %command.product_id, branch_id = %command.branch_id))]
    pub async fn record_movement(
        &self,
        command: RecordMovementCommand,
    ) -> Result<stock_movement::Model, ServiceError> {
        command.validate().map_err(|e| {
            STOCK_MOVEMENT_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            let msg = format!("Invalid movement: {}", e);
            error!("{}", msg);
            ServiceError::ValidationError(msg)
        })?;
        let delta = command.signed_delta().map_err(|e| {
            STOCK_MOVEMENT_FAILURES
                .with_label_values(&["validation_error"])
                .inc();
            e
        })?;

        let mut attempts = 0;
        loop {
            attempts += 1;

            let reservation = self
                .catalog
                .reserve_update(command.branch_id, command.product_id)
                .await?;
            let previous_quantity = reservation.quantity;
            let new_quantity = previous_quantity + delta;

            if new_quantity < 0 {
                STOCK_MOVEMENT_FAILURES
                    .with_label_values(&["insufficient_stock"])
                    .inc();
                return Err(ServiceError::InsufficientStock(format!(
                    "Product {} has {} on hand, movement needs {}",
                    command.product_id, previous_quantity, command.quantity
                )));
            }

            let db = self.db_pool.as_ref();
            let catalog = self.catalog.clone();
            let cmd = command.clone();
            let version = reservation.version;

            let result = db
                .transaction::<_, stock_movement::Model, ServiceError>(move |txn| {
                    Box::pin(async move {
                        let movement = stock_movement::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            product_id: Set(cmd.product_id),
                            branch_id: Set(cmd.branch_id),
                            r#type: Set(cmd.movement_type.as_str().to_string()),
                            quantity: Set(cmd.quantity),
                            previous_quantity: Set(previous_quantity),
                            new_quantity: Set(new_quantity),
                            reason: Set(cmd.reason.clone()),
                            reference_number: Set(cmd.reference_number.clone()),
                            notes: Set(cmd.notes.clone()),
                            created_by: Set(cmd.created_by),
                            created_at: Set(Utc::now()),
                        };

                        let movement = movement
                            .insert(txn)
                            .await
                            .map_err(ServiceError::DatabaseError)?;

                        catalog
                            .apply_quantity(
                                txn,
                                cmd.branch_id,
                                cmd.product_id,
                                new_quantity,
                                version,
                            )
                            .await?;

                        Ok(movement)
                    })
                })
                .await;

            match result {
                Ok(movement) => {
                    STOCK_MOVEMENTS.inc();
                    self.log_and_trigger_event(&movement).await?;
                    self.check_low_stock(command.branch_id, command.product_id)
                        .await;
                    return Ok(movement);
                }
                Err(TransactionError::Transaction(ServiceError::Conflict(msg)))
                    if attempts < self.retry_limit =>
                {
                    warn!(
                        attempt = attempts,
                        retry_limit = self.retry_limit,
                        "Movement lost version race, retrying: {}",
                        msg
                    );
                    continue;
                }
                Err(TransactionError::Transaction(e)) => {
                    STOCK_MOVEMENT_FAILURES
                        .with_label_values(&[match &e {
                            ServiceError::Conflict(_) => "conflict",
                            ServiceError::NotFound(_) => "not_found",
                            _ => "transaction_error",
                        }])
                        .inc();
                    return Err(e);
                }
                Err(TransactionError::Connection(db_err)) => {
                    STOCK_MOVEMENT_FAILURES
                        .with_label_values(&["database_error"])
                        .inc();
                    return Err(ServiceError::DatabaseError(db_err));
                }
            }
        }
    }

    /// Lists movements for a branch, newest first, with optional product and
    /// time-window filters.
    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        branch_id: Uuid,
        product_id: Option<Uuid>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = StockMovement::find()
            .filter(stock_movement::Column::BranchId.eq(branch_id))
            .order_by_desc(stock_movement::Column::CreatedAt);
        if let Some(product_id) = product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(from) = from {
            query = query.filter(stock_movement::Column::CreatedAt.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(stock_movement::Column::CreatedAt.lte(to));
        }

        let paginator = query.paginate(db, limit);
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

    async fn log_and_trigger_event(
        &self,
        movement: &stock_movement::Model,
    ) -> Result<(), ServiceError> {
        info!(
            movement_id = %movement.id,
            product_id = %movement.product_id,
            movement_type = %movement.r#type,
            quantity = movement.quantity,
            previous_quantity = movement.previous_quantity,
            new_quantity = movement.new_quantity,
            "Stock movement committed"
        );
        self.event_sender
            .send(Event::MovementRecorded {
                movement_id: movement.id,
                product_id: movement.product_id,
                branch_id: movement.branch_id,
                movement_type: movement.r#type.clone(),
                quantity: movement.quantity,
                previous_quantity: movement.previous_quantity,
                new_quantity: movement.new_quantity,
            })
            .await
            .map_err(|e| {
                STOCK_MOVEMENT_FAILURES
                    .with_label_values(&["event_error"])
                    .inc();
                let msg = format!("Failed to send event for stock movement: {}", e);
                error!("{}", msg);
                ServiceError::EventError(msg)
            })
    }

    /// Best-effort reorder signal after a commit; purchasing workflows
    /// subscribe to it. Never fails the committed movement.
    async fn check_low_stock(&self, branch_id: Uuid, product_id: Uuid) {
        match self.catalog.get_product(branch_id, product_id).await {
            Ok(product) if product.stock_quantity <= product.min_stock_level => {
                if let Err(e) = self
                    .event_sender
                    .send(Event::LowStockDetected {
                        product_id: product.id,
                        branch_id: product.branch_id,
                        stock_quantity: product.stock_quantity,
                        min_stock_level: product.min_stock_level,
                    })
                    .await
                {
                    warn!("Failed to send low stock event: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Low stock check skipped: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(movement_type: MovementType, direction: Option<MovementDirection>) -> RecordMovementCommand {
        RecordMovementCommand {
            product_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            movement_type,
            direction,
            quantity: 5,
            reason: "unit test".into(),
            reference_number: None,
            notes: None,
            created_by: Uuid::new_v4(),
        }
    }

    #[test]
    fn delta_signs_follow_movement_type() {
        assert_eq!(command(MovementType::In, None).signed_delta().unwrap(), 5);
        assert_eq!(command(MovementType::Out, None).signed_delta().unwrap(), -5);
        assert_eq!(
            command(MovementType::Transfer, None).signed_delta().unwrap(),
            -5
        );
        assert_eq!(
            command(MovementType::Adjustment, Some(MovementDirection::Increase))
                .signed_delta()
                .unwrap(),
            5
        );
        assert_eq!(
            command(MovementType::Adjustment, Some(MovementDirection::Decrease))
                .signed_delta()
                .unwrap(),
            -5
        );
    }

    #[test]
    fn adjustment_without_direction_is_rejected() {
        let err = command(MovementType::Adjustment, None)
            .signed_delta()
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn direction_on_directed_types_is_rejected() {
        for movement_type in [MovementType::In, MovementType::Out, MovementType::Transfer] {
            let err = command(movement_type, Some(MovementDirection::Increase))
                .signed_delta()
                .unwrap_err();
            assert!(matches!(err, ServiceError::ValidationError(_)));
        }
    }
}
