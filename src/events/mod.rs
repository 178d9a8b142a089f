use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the services; consumed by the background processing loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    CatalogIngested {
        shop_id: Uuid,
        categories: usize,
        goods: usize,
        skipped: usize,
    },

    // Basket events
    BasketItemAdded {
        order_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    BasketItemRemoved {
        order_id: Uuid,
        item_id: Uuid,
    },

    // Order events
    OrderConfirmed {
        order_id: Uuid,
        user_id: Uuid,
        total: Decimal,
    },
    StockDecremented {
        listing_id: Uuid,
        old_quantity: i32,
        new_quantity: i32,
    },
}

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

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Event delivery is advisory and must never fail the triggering request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Background loop draining the event channel. Handlers here are
/// observability hooks; domain side effects stay in the services.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::CatalogIngested {
                shop_id,
                categories,
                goods,
                skipped,
            } => {
                info!(
                    shop_id = %shop_id,
                    categories = categories,
                    goods = goods,
                    skipped = skipped,
                    "Catalog ingested"
                );
            }
            Event::BasketItemAdded {
                order_id,
                product_id,
                quantity,
            } => {
                info!(order_id = %order_id, product_id = %product_id, quantity = quantity, "Basket item added");
            }
            Event::BasketItemRemoved { order_id, item_id } => {
                info!(order_id = %order_id, item_id = %item_id, "Basket item removed");
            }
            Event::OrderConfirmed {
                order_id,
                user_id,
                total,
            } => {
                info!(order_id = %order_id, user_id = %user_id, total = %total, "Order confirmed");
            }
            Event::StockDecremented {
                listing_id,
                old_quantity,
                new_quantity,
            } => {
                info!(
                    listing_id = %listing_id,
                    old_quantity = old_quantity,
                    new_quantity = new_quantity,
                    "Stock decremented"
                );
                if *new_quantity < 0 {
                    warn!(listing_id = %listing_id, quantity = new_quantity, "Listing stock went negative");
                }
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_does_not_fail_on_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let sender = EventSender::new(tx);
        // Must not panic or error out.
        sender
            .send_or_log(Event::BasketItemRemoved {
                order_id: Uuid::new_v4(),
                item_id: Uuid::new_v4(),
            })
            .await;
    }

    #[tokio::test]
    async fn events_round_trip_through_the_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        let order_id = Uuid::new_v4();
        sender
            .send(Event::OrderConfirmed {
                order_id,
                user_id: Uuid::new_v4(),
                total: Decimal::ZERO,
            })
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            Event::OrderConfirmed { order_id: got, .. } => assert_eq!(got, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
