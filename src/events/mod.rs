use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Handle for publishing ledger events to the surrounding application.
///
/// Events are emitted after the owning transaction has committed; a send
/// failure is reported to the caller as a string and logged, never allowed to
/// affect ledger state.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Events emitted by the inventory ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    InventoryCreated {
        product_id: Uuid,
        quantity: i32,
    },
    StockAdded {
        product_id: Uuid,
        quantity: i32,
        new_quantity: i32,
    },
    StockRemoved {
        product_id: Uuid,
        quantity: i32,
        new_quantity: i32,
        sale_id: Option<Uuid>,
    },
    StockAdjusted {
        product_id: Uuid,
        old_quantity: i32,
        new_quantity: i32,
        reason: String,
    },
    /// A mutation left the balance at or below the reorder threshold.
    LowStockWarning {
        product_id: Uuid,
        quantity: i32,
        min_stock: i32,
        at: DateTime<Utc>,
    },
}

/// Drains the event channel, logging each event. Applications that care about
/// inventory events replace this loop with their own consumer.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::LowStockWarning {
                product_id,
                quantity,
                min_stock,
                ..
            } => {
                warn!(%product_id, quantity, min_stock, "low stock warning");
            }
            other => {
                info!(event = ?other, "inventory event");
            }
        }
    }
}
