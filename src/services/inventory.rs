use crate::{
    entities::{
        inventory_level::{self, Entity as InventoryLevel},
        product::{self, Entity as Product},
        stock_movement::{self, Entity as StockMovement, MovementType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    Page,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection,
    DatabaseTransaction, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Default reorder threshold for newly provisioned inventory.
pub const DEFAULT_MIN_STOCK: i32 = 10;

/// Input for provisioning a product for stock tracking.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewInventoryInput {
    pub product_id: Uuid,
    /// Baseline quantity; recorded without a movement.
    #[validate(range(min = 0, message = "initial quantity cannot be negative"))]
    pub quantity: Option<i32>,
    #[validate(range(min = 0, message = "min_stock cannot be negative"))]
    pub min_stock: Option<i32>,
    #[validate(range(min = 0, message = "max_stock cannot be negative"))]
    pub max_stock: Option<i32>,
    pub location: Option<String>,
}

/// Denormalized product data attached to inventory reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub category: Option<String>,
    pub supplier: Option<String>,
}

impl From<product::Model> for ProductSummary {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            sku: model.sku,
            name: model.name,
            price: model.price,
            category: model.category,
            supplier: model.supplier,
        }
    }
}

/// An inventory row joined with live product data.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryWithProduct {
    pub inventory: inventory_level::Model,
    pub product: ProductSummary,
}

/// Filters for inventory listings. All filters are conjunctive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryFilter {
    /// Substring match over product name and SKU.
    pub search: Option<String>,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub location: Option<String>,
    pub min_quantity: Option<i32>,
    pub max_quantity: Option<i32>,
    /// Only rows at or below their reorder threshold.
    pub low_stock: Option<bool>,
    /// Only rows with zero quantity.
    pub out_of_stock: Option<bool>,
    /// Only rows with positive quantity.
    pub has_stock: Option<bool>,
    pub updated_after: Option<DateTime<Utc>>,
    pub updated_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventorySort {
    Quantity,
    LastUpdate,
    ProductName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl From<SortDirection> for Order {
    fn from(dir: SortDirection) -> Self {
        match dir {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// Filters for movement listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub actor_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
    /// Substring match over the recorded reason.
    pub reason_contains: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// Result of an advisory stock availability check.
#[derive(Debug, Clone, Serialize)]
pub struct StockCheck {
    pub available: bool,
    pub quantity: i32,
    pub is_low_stock: bool,
}

/// The ledger engine: sole writer of inventory balances and the movement
/// ledger.
///
/// Every mutating operation runs its read-validate-write-append sequence in a
/// single database transaction, so a balance change is never visible without
/// its movement and vice versa. The service holds no state beyond its
/// injected dependencies and is safe to clone across request handlers.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Provisions a product for stock tracking.
    ///
    /// The initial quantity is a baseline, not a delta: no movement is
    /// recorded for it, so the audit ledger starts empty.
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn create_inventory(
        &self,
        input: NewInventoryInput,
    ) -> Result<inventory_level::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let product = self.require_active_product(input.product_id).await?;

        let created = self
            .db_pool
            .transaction::<_, inventory_level::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    // Locked check; a concurrent create racing past an empty
                    // read still trips the unique index on product_id.
                    let existing = InventoryLevel::find()
                        .filter(inventory_level::Column::ProductId.eq(product.id))
                        .lock_exclusive()
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    if existing.is_some() {
                        return Err(ServiceError::Conflict(format!(
                            "Inventory already exists for product {}",
                            product.id
                        )));
                    }

                    let now = Utc::now();
                    inventory_level::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        product_id: Set(product.id),
                        quantity: Set(input.quantity.unwrap_or(0)),
                        min_stock: Set(input.min_stock.unwrap_or(DEFAULT_MIN_STOCK)),
                        max_stock: Set(input.max_stock),
                        location: Set(input.location),
                        created_at: Set(now),
                        last_update: Set(now),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)
                })
            })
            .await
            .map_err(ServiceError::from)?;

        info!(product_id = %created.product_id, quantity = created.quantity, "inventory created");
        self.emit(Event::InventoryCreated {
            product_id: created.product_id,
            quantity: created.quantity,
        })
        .await;

        Ok(created)
    }

    /// Applies a signed, operator-reasoned correction to the balance and
    /// appends a matching ADJUSTMENT movement in the same transaction.
    #[instrument(skip(self, reason))]
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        delta: i32,
        reason: &str,
        actor_id: Uuid,
    ) -> Result<inventory_level::Model, ServiceError> {
        if reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Adjustment reason is required".to_string(),
            ));
        }
        if delta == 0 {
            return Err(ServiceError::ValidationError(
                "Adjustment delta must be non-zero".to_string(),
            ));
        }

        self.require_active_product(product_id).await?;

        let reason = reason.trim().to_string();
        let event_reason = reason.clone();
        let (old_quantity, updated) = self
            .db_pool
            .transaction::<_, (i32, inventory_level::Model), ServiceError>(move |txn| {
                Box::pin(async move {
                    let current = find_level(txn, product_id).await?;
                    let new_quantity = checked_new_quantity(current.quantity, delta)?;
                    if new_quantity < 0 {
                        return Err(ServiceError::InvalidQuantity(format!(
                            "Adjustment of {} would drive stock negative (current {})",
                            delta, current.quantity
                        )));
                    }

                    let old_quantity = current.quantity;
                    let updated = apply_balance(txn, current, new_quantity).await?;
                    append_movement(
                        txn,
                        product_id,
                        MovementType::Adjustment,
                        delta.unsigned_abs() as i32,
                        delta,
                        Some(reason),
                        actor_id,
                        None,
                    )
                    .await?;

                    Ok((old_quantity, updated))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        info!(
            %product_id,
            delta,
            old_quantity,
            new_quantity = updated.quantity,
            "stock adjusted"
        );
        self.emit(Event::StockAdjusted {
            product_id,
            old_quantity,
            new_quantity: updated.quantity,
            reason: event_reason,
        })
        .await;
        self.warn_if_low(&updated).await;

        Ok(updated)
    }

    /// Records a stock receipt. Always succeeds; `max_stock` is informational
    /// and never blocks inbound stock.
    #[instrument(skip(self, reason))]
    pub async fn add_stock(
        &self,
        product_id: Uuid,
        quantity: i32,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> Result<inventory_level::Model, ServiceError> {
        let updated = self
            .process_movement(product_id, MovementType::In, quantity, reason, actor_id, None)
            .await?;

        self.emit(Event::StockAdded {
            product_id,
            quantity,
            new_quantity: updated.quantity,
        })
        .await;
        self.warn_if_low(&updated).await;

        Ok(updated)
    }

    /// Records an outbound movement, typically sale-driven. Fails with
    /// `InsufficientStock` when the balance would go negative; callers must
    /// treat that as a hard stop for their own operation.
    #[instrument(skip(self, reason))]
    pub async fn remove_stock(
        &self,
        product_id: Uuid,
        quantity: i32,
        reason: Option<String>,
        actor_id: Uuid,
        sale_id: Option<Uuid>,
    ) -> Result<inventory_level::Model, ServiceError> {
        let updated = self
            .process_movement(
                product_id,
                MovementType::Out,
                quantity,
                reason,
                actor_id,
                sale_id,
            )
            .await?;

        self.emit(Event::StockRemoved {
            product_id,
            quantity,
            new_quantity: updated.quantity,
            sale_id,
        })
        .await;
        self.warn_if_low(&updated).await;

        Ok(updated)
    }

    async fn process_movement(
        &self,
        product_id: Uuid,
        direction: MovementType,
        quantity: i32,
        reason: Option<String>,
        actor_id: Uuid,
        sale_id: Option<Uuid>,
    ) -> Result<inventory_level::Model, ServiceError> {
        debug_assert!(matches!(direction, MovementType::In | MovementType::Out));

        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Movement quantity must be positive".to_string(),
            ));
        }

        self.require_active_product(product_id).await?;

        let reason = reason.and_then(|r| {
            let trimmed = r.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        });

        self.db_pool
            .transaction::<_, inventory_level::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let current = find_level(txn, product_id).await?;

                    let delta = match direction {
                        MovementType::In => quantity,
                        _ => -quantity,
                    };
                    let new_quantity = checked_new_quantity(current.quantity, delta)?;
                    if new_quantity < 0 {
                        return Err(ServiceError::InsufficientStock(format!(
                            "Requested {}, available {} for product {}",
                            quantity, current.quantity, product_id
                        )));
                    }

                    let updated = apply_balance(txn, current, new_quantity).await?;
                    append_movement(
                        txn, product_id, direction, quantity, delta, reason, actor_id, sale_id,
                    )
                    .await?;

                    Ok(updated)
                })
            })
            .await
            .map_err(ServiceError::from)
    }

    /// Current inventory for a product, joined with live product data.
    #[instrument(skip(self))]
    pub async fn get_inventory(
        &self,
        product_id: Uuid,
    ) -> Result<InventoryWithProduct, ServiceError> {
        let db = self.db_pool.as_ref();

        let (inventory, product) = InventoryLevel::find()
            .filter(inventory_level::Column::ProductId.eq(product_id))
            .find_also_related(Product)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Inventory not found for product {}", product_id))
            })?;

        let product = product.ok_or_else(|| {
            ServiceError::NotFound(format!("Product {} not found", product_id))
        })?;

        Ok(InventoryWithProduct {
            inventory,
            product: product.into(),
        })
    }

    /// Paginated inventory listing joined live with product data, so filters
    /// never see stale denormalized copies. Only active products are listed.
    #[instrument(skip(self, filter))]
    pub async fn list_inventory(
        &self,
        filter: InventoryFilter,
        page: u64,
        per_page: u64,
        sort_by: Option<InventorySort>,
        sort_direction: Option<SortDirection>,
    ) -> Result<Page<InventoryWithProduct>, ServiceError> {
        validate_paging(page, per_page)?;
        let db = self.db_pool.as_ref();

        let mut query = InventoryLevel::find()
            .find_also_related(Product)
            .filter(product::Column::IsActive.eq(true));

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let term = search.trim().to_string();
            query = query.filter(
                Condition::any()
                    .add(product::Column::Name.contains(&term))
                    .add(product::Column::Sku.contains(&term)),
            );
        }
        if let Some(category) = filter.category {
            query = query.filter(product::Column::Category.eq(category));
        }
        if let Some(supplier) = filter.supplier {
            query = query.filter(product::Column::Supplier.eq(supplier));
        }
        if let Some(location) = filter.location {
            query = query.filter(inventory_level::Column::Location.eq(location));
        }
        if let Some(min) = filter.min_quantity {
            query = query.filter(inventory_level::Column::Quantity.gte(min));
        }
        if let Some(max) = filter.max_quantity {
            query = query.filter(inventory_level::Column::Quantity.lte(max));
        }
        if filter.low_stock == Some(true) {
            query = query.filter(low_stock_condition());
        }
        if filter.out_of_stock == Some(true) {
            query = query.filter(inventory_level::Column::Quantity.eq(0));
        }
        if filter.has_stock == Some(true) {
            query = query.filter(inventory_level::Column::Quantity.gt(0));
        }
        if let Some(after) = filter.updated_after {
            query = query.filter(inventory_level::Column::LastUpdate.gte(after));
        }
        if let Some(before) = filter.updated_before {
            query = query.filter(inventory_level::Column::LastUpdate.lte(before));
        }

        let direction: Order = sort_direction.unwrap_or(SortDirection::Desc).into();
        query = match sort_by.unwrap_or(InventorySort::LastUpdate) {
            InventorySort::Quantity => {
                query.order_by(inventory_level::Column::Quantity, direction)
            }
            InventorySort::LastUpdate => {
                query.order_by(inventory_level::Column::LastUpdate, direction)
            }
            InventorySort::ProductName => query.order_by(product::Column::Name, direction),
        };

        let paginator = query.paginate(db, per_page);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        let items = rows
            .into_iter()
            .filter_map(|(inventory, product)| {
                product.map(|p| InventoryWithProduct {
                    inventory,
                    product: p.into(),
                })
            })
            .collect();

        Ok(Page::new(items, total, page, per_page))
    }

    /// Paginated read of the movement ledger, newest first. Read-only.
    #[instrument(skip(self, filter))]
    pub async fn list_movements(
        &self,
        filter: MovementFilter,
        page: u64,
        per_page: u64,
    ) -> Result<Page<stock_movement::Model>, ServiceError> {
        validate_paging(page, per_page)?;
        let db = self.db_pool.as_ref();

        let mut query = StockMovement::find();

        if let Some(product_id) = filter.product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(movement_type) = filter.movement_type {
            query = query.filter(stock_movement::Column::MovementType.eq(movement_type.as_str()));
        }
        if let Some(actor_id) = filter.actor_id {
            query = query.filter(stock_movement::Column::ActorId.eq(actor_id));
        }
        if let Some(sale_id) = filter.sale_id {
            query = query.filter(stock_movement::Column::SaleId.eq(sale_id));
        }
        if let Some(fragment) = filter
            .reason_contains
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            query = query.filter(stock_movement::Column::Reason.contains(fragment.trim()));
        }
        if let Some(after) = filter.created_after {
            query = query.filter(stock_movement::Column::CreatedAt.gte(after));
        }
        if let Some(before) = filter.created_before {
            query = query.filter(stock_movement::Column::CreatedAt.lte(before));
        }

        let paginator = query
            .order_by_desc(stock_movement::Column::CreatedAt)
            .order_by_desc(stock_movement::Column::Id)
            .paginate(db, per_page);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(Page::new(items, total, page, per_page))
    }

    /// The most recent movements for one product, capped at `limit`.
    #[instrument(skip(self))]
    pub async fn product_movements(
        &self,
        product_id: Uuid,
        limit: u64,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let db = self.db_pool.as_ref();

        StockMovement::find()
            .filter(stock_movement::Column::ProductId.eq(product_id))
            .order_by_desc(stock_movement::Column::CreatedAt)
            .order_by_desc(stock_movement::Column::Id)
            .limit(limit)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Advisory availability check used before attempting a sale-driven
    /// removal. Not transactionally linked to the subsequent movement; the
    /// authoritative check is the `remove_stock` negative-balance guard.
    #[instrument(skip(self))]
    pub async fn check_stock(&self, product_id: Uuid) -> Result<StockCheck, ServiceError> {
        let db = self.db_pool.as_ref();
        let level = InventoryLevel::find()
            .filter(inventory_level::Column::ProductId.eq(product_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Inventory not found for product {}", product_id))
            })?;

        Ok(StockCheck {
            available: level.quantity > 0,
            quantity: level.quantity,
            is_low_stock: level.is_low_stock(),
        })
    }

    /// Advisory reservation check: reports whether `quantity` units are
    /// currently available. No hold is placed, so the answer can be stale by
    /// the time a removal is attempted.
    #[instrument(skip(self))]
    pub async fn reserve_stock(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<bool, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Reservation quantity must be positive".to_string(),
            ));
        }

        let check = self.check_stock(product_id).await?;
        Ok(check.quantity >= quantity)
    }

    async fn require_active_product(
        &self,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let product = Product::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if !product.is_active {
            return Err(ServiceError::InvalidState(format!(
                "Product {} is inactive",
                product_id
            )));
        }

        Ok(product)
    }

    async fn emit(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "failed to publish inventory event");
        }
    }

    async fn warn_if_low(&self, level: &inventory_level::Model) {
        if level.is_low_stock() {
            self.emit(Event::LowStockWarning {
                product_id: level.product_id,
                quantity: level.quantity,
                min_stock: level.min_stock,
                at: Utc::now(),
            })
            .await;
        }
    }
}

/// Condition matching rows at or below their own reorder threshold.
pub(crate) fn low_stock_condition() -> sea_orm::sea_query::SimpleExpr {
    Expr::col((
        inventory_level::Entity,
        inventory_level::Column::Quantity,
    ))
    .lte(Expr::col((
        inventory_level::Entity,
        inventory_level::Column::MinStock,
    )))
}

fn validate_paging(page: u64, per_page: u64) -> Result<(), ServiceError> {
    if page == 0 || per_page == 0 {
        return Err(ServiceError::ValidationError(
            "page and per_page must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn checked_new_quantity(current: i32, delta: i32) -> Result<i32, ServiceError> {
    current
        .checked_add(delta)
        .ok_or_else(|| ServiceError::InvalidQuantity("Stock quantity overflow".to_string()))
}

/// Row-locked balance read (SELECT ... FOR UPDATE). Writers against the same
/// product serialize here and re-read the committed balance before
/// validating; writers against different products do not contend. SQLite
/// ignores the lock clause and relies on its whole-database write locking
/// instead.
async fn find_level(
    txn: &DatabaseTransaction,
    product_id: Uuid,
) -> Result<inventory_level::Model, ServiceError> {
    InventoryLevel::find()
        .filter(inventory_level::Column::ProductId.eq(product_id))
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Inventory not found for product {}", product_id))
        })
}

async fn apply_balance(
    txn: &DatabaseTransaction,
    current: inventory_level::Model,
    new_quantity: i32,
) -> Result<inventory_level::Model, ServiceError> {
    let mut active: inventory_level::ActiveModel = current.into();
    active.quantity = Set(new_quantity);
    active.last_update = Set(Utc::now());
    active.update(txn).await.map_err(ServiceError::db_error)
}

#[allow(clippy::too_many_arguments)]
async fn append_movement(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    movement_type: MovementType,
    quantity: i32,
    quantity_delta: i32,
    reason: Option<String>,
    actor_id: Uuid,
    sale_id: Option<Uuid>,
) -> Result<stock_movement::Model, ServiceError> {
    stock_movement::ActiveModel {
        product_id: Set(product_id),
        movement_type: Set(movement_type.as_str().to_string()),
        quantity: Set(quantity),
        quantity_delta: Set(quantity_delta),
        reason: Set(reason),
        actor_id: Set(actor_id),
        sale_id: Set(sale_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(ServiceError::db_error)
}
