use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::ModelType;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with the receiver that `process_events` drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Events are sent after the owning transaction commits, so a closed
    /// channel must not fail the operation that produced them.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "dropping domain event");
        }
    }
}

/// Domain events emitted after a state change has been committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    InvoiceCreated {
        invoice_id: Uuid,
        invoice_no: String,
        total: Decimal,
    },
    InvoiceCancelled {
        invoice_id: Uuid,
        invoice_no: String,
    },
    StockAdjusted {
        product_id: Uuid,
        model_type: ModelType,
        variant_id: Option<Uuid>,
        previous_stock: i32,
        new_stock: i32,
    },
    LowStock {
        product_id: Uuid,
        model_type: ModelType,
        stock: i32,
        threshold: i32,
    },
    PurchaseOrderCreated {
        purchase_order_id: Uuid,
        po_no: String,
    },
    PurchaseOrderReceived {
        purchase_order_id: Uuid,
        po_no: String,
        received_at: DateTime<Utc>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::InvoiceCreated { .. } => "invoice_created",
            Event::InvoiceCancelled { .. } => "invoice_cancelled",
            Event::StockAdjusted { .. } => "stock_adjusted",
            Event::LowStock { .. } => "low_stock",
            Event::PurchaseOrderCreated { .. } => "purchase_order_created",
            Event::PurchaseOrderReceived { .. } => "purchase_order_received",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        metrics::counter!("phonestore.events.processed", 1);

        match &event {
            Event::InvoiceCreated {
                invoice_id,
                invoice_no,
                total,
            } => {
                info!(%invoice_id, %invoice_no, %total, "invoice created");
            }
            Event::InvoiceCancelled {
                invoice_id,
                invoice_no,
            } => {
                info!(%invoice_id, %invoice_no, "invoice cancelled");
            }
            Event::StockAdjusted {
                product_id,
                model_type,
                previous_stock,
                new_stock,
                ..
            } => {
                info!(
                    %product_id,
                    %model_type,
                    previous_stock,
                    new_stock,
                    "stock adjusted"
                );
            }
            Event::LowStock {
                product_id,
                model_type,
                stock,
                threshold,
            } => {
                warn!(
                    %product_id,
                    %model_type,
                    stock,
                    threshold,
                    "Low inventory alert"
                );
            }
            Event::PurchaseOrderCreated {
                purchase_order_id,
                po_no,
            } => {
                info!(%purchase_order_id, %po_no, "purchase order created");
            }
            Event::PurchaseOrderReceived {
                purchase_order_id,
                po_no,
                received_at,
            } => {
                info!(%purchase_order_id, %po_no, %received_at, "purchase order received");
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_survives_closed_channel() {
        let (sender, rx) = EventSender::channel(4);
        drop(rx);
        sender
            .send_or_log(Event::InvoiceCancelled {
                invoice_id: Uuid::new_v4(),
                invoice_no: "INV-20250101-0001".into(),
            })
            .await;
        assert!(sender
            .send(Event::PurchaseOrderCreated {
                purchase_order_id: Uuid::new_v4(),
                po_no: "PO-20250101-0001".into(),
            })
            .await
            .is_err());
    }

    #[tokio::test]
    async fn processing_loop_ends_when_senders_drop() {
        let (sender, rx) = EventSender::channel(4);
        let handle = tokio::spawn(process_events(rx));
        sender
            .send(Event::LowStock {
                product_id: Uuid::new_v4(),
                model_type: ModelType::Accessory,
                stock: 2,
                threshold: 5,
            })
            .await
            .unwrap();
        drop(sender);
        handle.await.unwrap();
    }

    #[test]
    fn event_names() {
        let event = Event::StockAdjusted {
            product_id: Uuid::nil(),
            model_type: ModelType::Phone,
            variant_id: None,
            previous_stock: 1,
            new_stock: 2,
        };
        assert_eq!(event.name(), "stock_adjusted");
    }
}
