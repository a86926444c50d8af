use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of stock movement recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementType {
    /// Stock receipt.
    In,
    /// Sale-driven or other outbound movement.
    Out,
    /// Manually reasoned correction, signed.
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adjustment => "ADJUSTMENT",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(MovementType::In),
            "OUT" => Some(MovementType::Out),
            "ADJUSTMENT" => Some(MovementType::Adjustment),
            _ => None,
        }
    }
}

/// One immutable entry in the movement ledger.
///
/// Rows are appended inside the same transaction as the balance update they
/// describe and are never updated or deleted. `quantity` is the positive
/// magnitude shown in audit views; `quantity_delta` carries the sign and is
/// authoritative for replaying the ledger (IN: +q, OUT: -q, ADJUSTMENT: the
/// signed correction).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub product_id: Uuid,
    /// Stored as a string column, converted through `MovementType`.
    pub movement_type: String,
    /// Magnitude of the change, always positive.
    pub quantity: i32,
    /// Signed delta applied to the balance.
    pub quantity_delta: i32,
    /// Required for adjustments, optional for sale-driven movements.
    pub reason: Option<String>,
    /// User or process responsible for the change.
    pub actor_id: Uuid,
    /// Set when the movement was caused by a sale, for traceability.
    pub sale_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn movement_type(&self) -> Option<MovementType> {
        MovementType::parse_str(&self.movement_type)
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
