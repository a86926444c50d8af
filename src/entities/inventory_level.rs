use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current stock balance and alerting configuration for one product.
///
/// `quantity` is the materialized sum of the product's movement ledger and is
/// only ever written inside a ledger transaction that also appends the
/// corresponding movement. `min_stock`/`max_stock` are alerting thresholds;
/// they never constrain `quantity` itself.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_levels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// One inventory row per product.
    #[sea_orm(unique)]
    pub product_id: Uuid,

    /// On-hand balance, invariant: never negative.
    pub quantity: i32,

    /// Reorder threshold for low-stock alerting.
    pub min_stock: i32,

    /// Overstock threshold, informational only.
    pub max_stock: Option<i32>,

    pub location: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Refreshed on every balance mutation.
    pub last_update: DateTime<Utc>,
}

impl Model {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity == 0
    }

    pub fn is_overstock(&self) -> bool {
        self.max_stock.is_some_and(|max| self.quantity > max)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
