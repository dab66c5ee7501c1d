use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

use crate::entities::order::OrderStatus;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Publishes without waiting on the consumer. A full or closed channel
    /// drops the event with a warning.
    pub fn send_or_log(&self, event: Event) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                metrics::counter!("events.dropped", 1);
                warn!(event = event.name(), "Event channel full; dropping domain event");
            }
            Err(TrySendError::Closed(event)) => {
                warn!(event = event.name(), "Event consumer gone; dropping domain event");
            }
        }
    }
}

/// Domain events published after the owning transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    ProductCreated(i32),
    ProductUpdated(i32),
    ProductDeactivated(i32),
    CartItemAdded {
        user_id: i32,
        product_id: i32,
        quantity: i32,
    },
    CartCleared {
        user_id: i32,
        removed: u64,
    },
    OrderCreated {
        order_id: i32,
        order_number: String,
        user_id: i32,
        total_amount: Decimal,
        created_at: DateTime<Utc>,
    },
    OrderStatusChanged {
        order_id: i32,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrderCancelled {
        order_id: i32,
        cancel_order_id: i32,
        restocked: bool,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ProductCreated(_) => "product.created",
            Event::ProductUpdated(_) => "product.updated",
            Event::ProductDeactivated(_) => "product.deactivated",
            Event::CartItemAdded { .. } => "cart.item_added",
            Event::CartCleared { .. } => "cart.cleared",
            Event::OrderCreated { .. } => "order.created",
            Event::OrderStatusChanged { .. } => "order.status_changed",
            Event::OrderCancelled { .. } => "order.cancelled",
        }
    }
}

// Drains the channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        metrics::counter!(format!("events.{}", event.name()), 1);

        match &event {
            Event::OrderCreated {
                order_id,
                order_number,
                user_id,
                total_amount,
                ..
            } => {
                info!(
                    order_id,
                    order_number = %order_number,
                    user_id,
                    total_amount = %total_amount,
                    "Order placed"
                );
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(order_id, from = %old_status, to = %new_status, "Order status changed");
            }
            Event::OrderCancelled {
                order_id,
                cancel_order_id,
                restocked,
            } => {
                info!(order_id, cancel_order_id, restocked, "Order cancelled");
            }
            other => {
                info!(event = other.name(), payload = ?other, "Received event");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender.send_or_log(Event::ProductCreated(5));
        assert_eq!(rx.recv().await, Some(Event::ProductCreated(5)));
    }

    #[tokio::test]
    async fn publishing_after_receiver_is_dropped_is_logged() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        // must not panic
        sender.send_or_log(Event::ProductUpdated(1));
    }

    #[tokio::test]
    async fn publishing_never_waits_on_a_full_channel() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);

        let publish = async {
            sender.send_or_log(Event::ProductCreated(1));
            sender.send_or_log(Event::ProductCreated(2));
            sender.send_or_log(Event::ProductCreated(3));
        };
        tokio::time::timeout(std::time::Duration::from_secs(1), publish)
            .await
            .expect("publishing blocked on a full channel");

        assert_eq!(rx.recv().await, Some(Event::ProductCreated(1)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn process_events_returns_when_senders_close() {
        let (tx, rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender.send_or_log(Event::CartCleared {
            user_id: 1,
            removed: 2,
        });
        drop(sender);
        process_events(rx).await;
    }
}
