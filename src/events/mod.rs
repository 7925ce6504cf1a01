use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::models::{OrderStatus, QuotationStatus, TaskStatus};

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

    /// Sends an event after the corresponding write has already been
    /// persisted. Delivery failures are logged and never fail the caller.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Domain events emitted after successful store writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(String),
    OrderUpdated(String),
    OrderMoved {
        order_id: String,
        column_id: Option<String>,
    },
    OrderStatusChanged {
        order_id: String,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderProgressUpdated {
        order_id: String,
        item_index: usize,
        stage: String,
        percent: u8,
    },
    OrdersDeleted(Vec<String>),

    // Quotation events
    QuotationCreated(String),
    QuotationUpdated(String),
    QuotationStatusChanged {
        quotation_id: String,
        old_status: QuotationStatus,
        new_status: QuotationStatus,
    },
    QuotationConverted {
        quotation_id: String,
        order_id: String,
    },

    // Board events
    ColumnCreated(String),
    ColumnUpdated(String),
    ColumnsReordered(Vec<String>),
    ColumnDeleted(String),

    // Supplier events
    SupplierCreated(String),
    SupplierUpdated(String),
    SupplierDeleted(String),

    // Task events
    TaskCreated(String),
    TaskUpdated(String),
    TaskStatusChanged {
        task_id: String,
        new_status: TaskStatus,
    },
    TaskDeleted(String),

    // Settings events
    SettingsUpdated {
        section: String,
        timestamp: DateTime<Utc>,
    },
}

/// Consumes domain events until every sender has been dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::QuotationConverted {
                quotation_id,
                order_id,
            } => {
                info!(%quotation_id, %order_id, "quotation converted to order");
            }
            Event::OrdersDeleted(ids) => {
                info!(count = ids.len(), "orders soft-deleted");
            }
            Event::QuotationStatusChanged {
                quotation_id,
                old_status,
                new_status,
            } => {
                info!(%quotation_id, from = ?old_status, to = ?new_status, "quotation status changed");
            }
            other => debug!(event = ?other, "event received"),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender.publish(Event::OrderCreated("o-1".into())).await;
        assert_eq!(rx.recv().await, Some(Event::OrderCreated("o-1".into())));
    }

    #[tokio::test]
    async fn publish_ignores_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        sender.publish(Event::ColumnDeleted("c".into())).await;
        assert!(sender.send(Event::ColumnDeleted("c".into())).await.is_err());
    }
}
