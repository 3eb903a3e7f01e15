use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One product's expected-vs-actual comparison within an audit.
///
/// `expected_quantity` snapshots the product's live quantity at count time;
/// `difference` is derived on write and never independently mutated. A
/// recount replaces the row (delete + recreate) so the count trail stays
/// intact. `reconciled_at`/`reconciled_movement_id` record the single
/// adjustment movement an item may ever emit.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_audit_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub audit_id: Uuid,
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub expected_quantity: i32,
    pub actual_quantity: i32,
    pub difference: i32,
    pub counted_at: DateTime<Utc>,
    pub reconciled_at: Option<DateTime<Utc>>,
    pub reconciled_movement_id: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_audit::Entity",
        from = "Column::AuditId",
        to = "super::stock_audit::Column::Id"
    )]
    Audit,
}

impl Related<super::stock_audit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Audit.def()
    }
}

impl Model {
    pub fn has_discrepancy(&self) -> bool {
        self.difference != 0
    }

    pub fn is_reconciled(&self) -> bool {
        self.reconciled_at.is_some()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.counted_at {
            active_model.counted_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
