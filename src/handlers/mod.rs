use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::notifications::OrderNotifier;
use crate::services::{BasketService, CatalogService, ContactService, IngestionService, OrderService};

pub mod basket;
pub mod catalog;
pub mod common;
pub mod contacts;
pub mod orders;

/// Aggregated services used by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub ingestion: IngestionService,
    pub catalog: CatalogService,
    pub basket: BasketService,
    pub orders: OrderService,
    pub contacts: ContactService,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn OrderNotifier>,
        config: &AppConfig,
    ) -> Self {
        Self {
            ingestion: IngestionService::new(
                db.clone(),
                event_sender.clone(),
                Duration::from_secs(config.feed_fetch_timeout_secs),
            ),
            catalog: CatalogService::new(db.clone()),
            basket: BasketService::new(db.clone(), event_sender.clone()),
            orders: OrderService::new(db.clone(), event_sender, notifier),
            contacts: ContactService::new(db),
        }
    }
}
