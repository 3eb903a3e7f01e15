use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Events emitted by the ledger and audit engine. Consumed by the async
// processing loop; the reporting layer subscribes out of process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Ledger events
    MovementRecorded {
        movement_id: Uuid,
        product_id: Uuid,
        branch_id: Uuid,
        movement_type: String,
        quantity: i32,
        previous_quantity: i32,
        new_quantity: i32,
    },
    LowStockDetected {
        product_id: Uuid,
        branch_id: Uuid,
        stock_quantity: i32,
        min_stock_level: i32,
    },

    // Audit events
    AuditCreated(Uuid),
    AuditStarted(Uuid),
    AuditItemCounted {
        audit_id: Uuid,
        product_id: Uuid,
        difference: i32,
    },
    AuditCompleted(Uuid),
    AuditCancelled(Uuid),
    AuditReconciled {
        audit_id: Uuid,
        product_id: Uuid,
        movement_id: Uuid,
    },
}

/// Event processing loop; spawned once at startup.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::MovementRecorded {
                movement_id,
                product_id,
                branch_id,
                ref movement_type,
                quantity,
                previous_quantity,
                new_quantity,
            } => {
                info!(
                    %movement_id,
                    %product_id,
                    %branch_id,
                    movement_type = %movement_type,
                    quantity,
                    previous_quantity,
                    new_quantity,
                    "Stock movement recorded"
                );
            }
            Event::LowStockDetected {
                product_id,
                branch_id,
                stock_quantity,
                min_stock_level,
            } => {
                warn!(
                    %product_id,
                    %branch_id,
                    stock_quantity,
                    min_stock_level,
                    "Product at or below minimum stock level"
                );
            }
            Event::AuditCreated(audit_id) => {
                info!(%audit_id, "Stock audit created");
            }
            Event::AuditStarted(audit_id) => {
                info!(%audit_id, "Stock audit started");
            }
            Event::AuditItemCounted {
                audit_id,
                product_id,
                difference,
            } => {
                info!(%audit_id, %product_id, difference, "Audit item counted");
            }
            Event::AuditCompleted(audit_id) => {
                info!(%audit_id, "Stock audit completed");
            }
            Event::AuditCancelled(audit_id) => {
                info!(%audit_id, "Stock audit cancelled");
            }
            Event::AuditReconciled {
                audit_id,
                product_id,
                movement_id,
            } => {
                info!(%audit_id, %product_id, %movement_id, "Audit item reconciled");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::AuditCreated(Uuid::new_v4()))
            .await
            .expect("send should succeed");
        assert!(matches!(rx.recv().await, Some(Event::AuditCreated(_))));
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::AuditStarted(Uuid::new_v4())).await.is_err());
    }
}
