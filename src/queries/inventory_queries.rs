//! Read-side projections over the stock record store and movement ledger.
//!
//! Alerts and statistics are recomputed from current state on every call;
//! nothing here is cached or separately persisted, so the projections cannot
//! drift from the ledger.

use crate::{
    entities::{
        inventory_level::{self, Entity as InventoryLevel},
        product::{self, Entity as Product},
        stock_movement::{self, Entity as StockMovement},
    },
    errors::ServiceError,
    services::inventory::low_stock_condition,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of recent movements included in the statistics view.
const RECENT_MOVEMENTS: u64 = 10;

#[async_trait]
pub trait Query: Send + Sync {
    type Result: Send + Sync;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError>;
}

/// Active products at or below their reorder threshold, most urgent first.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LowStockQuery;

#[async_trait]
impl Query for LowStockQuery {
    type Result = Vec<(inventory_level::Model, Option<product::Model>)>;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        InventoryLevel::find()
            .find_also_related(Product)
            .filter(product::Column::IsActive.eq(true))
            .filter(low_stock_condition())
            .order_by_asc(inventory_level::Column::Quantity)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Active products with zero on-hand quantity.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OutOfStockQuery;

#[async_trait]
impl Query for OutOfStockQuery {
    type Result = Vec<(inventory_level::Model, Option<product::Model>)>;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        InventoryLevel::find()
            .find_also_related(Product)
            .filter(product::Column::IsActive.eq(true))
            .filter(inventory_level::Column::Quantity.eq(0))
            .order_by_asc(inventory_level::Column::LastUpdate)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Active products holding more than their configured overstock threshold.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OverstockQuery;

#[async_trait]
impl Query for OverstockQuery {
    type Result = Vec<(inventory_level::Model, Option<product::Model>)>;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        InventoryLevel::find()
            .find_also_related(Product)
            .filter(product::Column::IsActive.eq(true))
            .filter(inventory_level::Column::MaxStock.is_not_null())
            .filter(
                Expr::col((inventory_level::Entity, inventory_level::Column::Quantity)).gt(
                    Expr::col((inventory_level::Entity, inventory_level::Column::MaxStock)),
                ),
            )
            .order_by_desc(inventory_level::Column::Quantity)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// One product's contribution to total inventory value.
#[derive(Debug, Clone, Serialize)]
pub struct ProductValue {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub total_value: Decimal,
}

/// Aggregate view over the whole ledger.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryStats {
    pub total_products: u64,
    /// Sum of quantity x product price across all tracked active products.
    pub total_value: Decimal,
    pub low_stock_count: u64,
    pub out_of_stock_count: u64,
    pub average_quantity: f64,
    /// Highest-valued products, descending.
    pub top_by_value: Vec<ProductValue>,
    /// Tail of the movement ledger, newest first.
    pub recent_movements: Vec<stock_movement::Model>,
}

/// Computes inventory statistics from one consistent read of the stock
/// records, plus a tail read of the movement ledger.
#[derive(Debug, Serialize, Deserialize)]
pub struct InventoryStatsQuery {
    /// How many products to include in the by-value ranking.
    pub top_n: usize,
}

impl Default for InventoryStatsQuery {
    fn default() -> Self {
        Self { top_n: 5 }
    }
}

#[async_trait]
impl Query for InventoryStatsQuery {
    type Result = InventoryStats;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let rows: Vec<(inventory_level::Model, Option<product::Model>)> = InventoryLevel::find()
            .find_also_related(Product)
            .filter(product::Column::IsActive.eq(true))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut total_products = 0u64;
        let mut total_value = Decimal::ZERO;
        let mut low_stock_count = 0u64;
        let mut out_of_stock_count = 0u64;
        let mut quantity_sum = 0i64;
        let mut values: Vec<ProductValue> = Vec::with_capacity(rows.len());

        for (level, product) in rows {
            let Some(product) = product else { continue };

            total_products += 1;
            quantity_sum += i64::from(level.quantity);
            if level.is_low_stock() {
                low_stock_count += 1;
            }
            if level.is_out_of_stock() {
                out_of_stock_count += 1;
            }

            let value = product.price * Decimal::from(level.quantity);
            total_value += value;
            values.push(ProductValue {
                product_id: product.id,
                sku: product.sku,
                name: product.name,
                quantity: level.quantity,
                total_value: value,
            });
        }

        values.sort_by(|a, b| b.total_value.cmp(&a.total_value));
        values.truncate(self.top_n);

        let average_quantity = if total_products > 0 {
            quantity_sum as f64 / total_products as f64
        } else {
            0.0
        };

        let recent_movements = StockMovement::find()
            .order_by_desc(stock_movement::Column::CreatedAt)
            .order_by_desc(stock_movement::Column::Id)
            .limit(RECENT_MOVEMENTS)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(InventoryStats {
            total_products,
            total_value,
            low_stock_count,
            out_of_stock_count,
            average_quantity,
            top_by_value: values,
            recent_movements,
        })
    }
}

/// Replays a product's movement ledger in creation order and sums the signed
/// deltas. The result must equal the materialized balance minus the creation
/// baseline; the audit tests rely on this.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplayBalanceQuery {
    pub product_id: Uuid,
}

#[async_trait]
impl Query for ReplayBalanceQuery {
    type Result = i64;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let movements = StockMovement::find()
            .filter(stock_movement::Column::ProductId.eq(self.product_id))
            .order_by_asc(stock_movement::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(movements
            .iter()
            .map(|m| i64::from(m.quantity_delta))
            .sum())
    }
}
