use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Lifecycle status of a product within its branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    Active,
    Inactive,
    Discontinued,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
            ProductStatus::Discontinued => "discontinued",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProductStatus::Active),
            "inactive" => Some(ProductStatus::Inactive),
            "discontinued" => Some(ProductStatus::Discontinued),
            _ => None,
        }
    }
}

/// Product entity: one stock-keeping unit within one branch.
///
/// `stock_quantity` is only ever written by the movement ledger's commit
/// step; `version` is the optimistic-concurrency token guarding it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Primary key
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Branch (tenant) this product belongs to
    pub branch_id: Uuid,

    /// SKU (Stock Keeping Unit)
    #[validate(length(
        min = 1,
        max = 100,
        message = "SKU must be between 1 and 100 characters"
    ))]
    pub sku: String,

    /// Product name
    #[validate(length(
        min = 1,
        max = 255,
        message = "Product name must be between 1 and 255 characters"
    ))]
    pub name: String,

    /// Product description
    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,

    /// On-hand quantity, derived exclusively from committed movements
    pub stock_quantity: i32,

    /// Quantity at or below which the product counts as low stock
    pub min_stock_level: i32,

    /// Optional ceiling used by replenishment planning
    pub max_stock_level: Option<i32>,

    /// Quantity that triggers reordering
    pub reorder_point: i32,

    /// Selling price per unit
    pub unit_price: Decimal,

    /// Cost price (used for margin calculations)
    pub cost_price: Decimal,

    /// Lifecycle status: active, inactive, or discontinued
    pub status: String,

    /// Optimistic-concurrency token, bumped on every quantity commit
    pub version: i32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_movement::Entity")]
    StockMovements,
}

impl Related<super::stock_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMovements.def()
    }
}

impl Model {
    pub fn status(&self) -> Option<ProductStatus> {
        ProductStatus::from_str(&self.status)
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.stock_quantity == 0
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity > 0 && self.stock_quantity <= self.min_stock_level
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
