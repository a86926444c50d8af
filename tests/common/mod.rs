#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use stock_ledger::{
    config::AppConfig,
    db,
    entities::product,
    events::{process_events, EventSender},
    services::inventory::InventoryService,
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Harness spinning up an inventory service backed by a throwaway SQLite
/// database with the full migration set applied.
pub struct TestLedger {
    pub service: InventoryService,
    pub db: Arc<DatabaseConnection>,
    _db_file: tempfile::NamedTempFile,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestLedger {
    /// Single-connection pool: concurrent operations serialize
    /// deterministically, so tests can assert exact outcomes.
    pub async fn new() -> Self {
        Self::with_pool_size(1).await
    }

    /// Pool with `max_connections` connections. Sizes above one exercise real
    /// cross-connection contention; SQLite then surfaces write conflicts as
    /// busy/snapshot errors (`ServiceError::DatabaseError`) rather than
    /// queueing every writer.
    pub async fn with_pool_size(max_connections: u32) -> Self {
        let db_file = tempfile::NamedTempFile::new().expect("failed to create temp db file");
        let mut cfg = AppConfig::for_database(format!(
            "sqlite://{}?mode=rwc",
            db_file.path().display()
        ));
        cfg.db_max_connections = max_connections;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool).await.expect("migrations failed");

        let db = Arc::new(pool);
        let (tx, rx) = mpsc::channel(100);
        let sender = EventSender::new(tx);
        let event_task = tokio::spawn(process_events(rx));
        let service = InventoryService::new(db.clone(), sender);

        Self {
            service,
            db,
            _db_file: db_file,
            _event_task: event_task,
        }
    }

    /// Inserts a product row and returns its id.
    pub async fn seed_product(
        &self,
        sku: &str,
        name: &str,
        price: Decimal,
        is_active: bool,
    ) -> Uuid {
        self.seed_product_full(sku, name, price, None, None, is_active)
            .await
    }

    pub async fn seed_product_full(
        &self,
        sku: &str,
        name: &str,
        price: Decimal,
        category: Option<&str>,
        supplier: Option<&str>,
        is_active: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        product::ActiveModel {
            id: Set(id),
            sku: Set(sku.to_string()),
            name: Set(name.to_string()),
            price: Set(price),
            category: Set(category.map(str::to_string)),
            supplier: Set(supplier.map(str::to_string)),
            is_active: Set(is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .expect("failed to seed product");
        id
    }
}

/// A stable actor id for attributing test movements.
pub fn actor() -> Uuid {
    Uuid::from_u128(0xA001)
}
