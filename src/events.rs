use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the cart, ledger, and checkout services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CartItemAdded {
        customer_id: Uuid,
        product_id: Uuid,
    },
    CartLineRemoved {
        customer_id: Uuid,
        product_id: Uuid,
    },
    CartCleared(Uuid),
    CheckoutInitiated {
        customer_id: Uuid,
        reference: String,
    },
    OrderCreated(Uuid),
    PaymentRecorded {
        order_id: Uuid,
        reference: String,
    },
    DeliveryStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
}

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

    /// Best-effort send. Event delivery is never allowed to fail a request
    /// that already committed its durable state.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(?event, "Event delivery failed: {}", e);
        }
    }
}

/// Consumes events off the channel and logs them. The checkout flow does not
/// depend on this task; it exists for observability and as the seam where a
/// real outbox or queue would attach.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(order_id) => info!(%order_id, "order created"),
            Event::PaymentRecorded {
                order_id,
                reference,
            } => info!(%order_id, %reference, "payment recorded"),
            Event::DeliveryStatusChanged {
                order_id,
                old_status,
                new_status,
            } => info!(%order_id, %old_status, %new_status, "delivery status changed"),
            other => info!(event = ?other, "event"),
        }
    }
}
