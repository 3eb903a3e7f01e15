use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a physical stock count exercise.
///
/// Status only advances forward: `pending -> in_progress -> completed`,
/// with `cancelled` reachable from `pending` or `in_progress`. The two
/// terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "pending",
            AuditStatus::InProgress => "in_progress",
            AuditStatus::Completed => "completed",
            AuditStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AuditStatus::Pending),
            "in_progress" => Some(AuditStatus::InProgress),
            "completed" => Some(AuditStatus::Completed),
            "cancelled" => Some(AuditStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AuditStatus::Completed | AuditStatus::Cancelled)
    }

    /// Whether items may still be counted in this state.
    pub fn accepts_items(&self) -> bool {
        matches!(self, AuditStatus::Pending | AuditStatus::InProgress)
    }
}

/// A physical-count exercise over a branch's stock.
///
/// `total_items`, `counted_items` and `discrepancies` are derived from the
/// child items and recomputed whenever an item is written.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_audits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub branch_id: Uuid,
    pub audit_date: Date,
    pub status: String,
    pub total_items: i32,
    pub counted_items: i32,
    pub discrepancies: i32,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_audit_item::Entity")]
    Items,
}

impl Related<super::stock_audit_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Model {
    pub fn status(&self) -> Option<AuditStatus> {
        AuditStatus::from_str(&self.status)
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(Utc::now());
            }
        } else {
            active_model.updated_at = Set(Some(Utc::now()));
        }
        Ok(active_model)
    }
}
