use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::payments::PaymentType;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Publishes without ever failing the caller. Events are emitted after
    /// commit, so a full or closed channel only loses the notification.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(err) = self.sender.try_send(event) {
            warn!("Dropping domain event: {}", err);
        }
    }
}

/// Domain events emitted by the checkout pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    CartCreated {
        cart_id: Uuid,
        user_role_id: i32,
    },
    CartItemUpserted {
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        item_id: Uuid,
        user_role_id: i32,
    },
    StockValidated {
        cart_id: Uuid,
        available: bool,
        products_with_issues: usize,
    },
    PaymentInitiated {
        payment_id: Uuid,
        cart_id: Uuid,
        reference_number: String,
        payment_type: PaymentType,
    },
    CartStatusChanged {
        cart_id: Uuid,
        old_status: String,
        new_status: String,
    },
}

pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::PaymentInitiated {
                payment_id,
                reference_number,
                payment_type,
                ..
            } => {
                info!(
                    payment_id = %payment_id,
                    reference = %reference_number,
                    payment_type = %payment_type,
                    "Payment initiated"
                );
            }
            Event::StockValidated {
                cart_id,
                available: false,
                products_with_issues,
            } => {
                warn!(
                    cart_id = %cart_id,
                    products_with_issues,
                    "Stock validation found shortfalls"
                );
            }
            other => info!("Received event: {:?}", other),
        }
    }

    info!("Event channel closed; event processing loop stopped");
}
