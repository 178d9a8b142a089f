//! Order-confirmation notification collaborator.
//!
//! Confirmation never waits on delivery: the orders service spawns the call
//! and a failed send is logged, not surfaced. The default wiring posts mail
//! payloads to an HTTP mail gateway; without a configured gateway the
//! messages are logged instead.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::AppConfig;

/// One confirmed line in the order summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: Uuid,
    pub product: String,
    pub quantity: i32,
    pub total_price: Decimal,
}

/// Payload handed to the notifier when an order is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub user: String,
    pub products: Vec<OrderLine>,
    pub total: Decimal,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait OrderNotifier: Send + Sync {
    /// Notify the buyer (and the operational address) that an order was
    /// confirmed. Implementations must be safe to fire-and-forget.
    async fn order_confirmed(
        &self,
        summary: &OrderSummary,
        recipients: &[String],
    ) -> Result<(), NotificationError>;
}

fn format_lines(summary: &OrderSummary) -> String {
    summary
        .products
        .iter()
        .map(|line| {
            format!(
                "{} x {}, line total: {}, item id: {}",
                line.product, line.quantity, line.total_price, line.item_id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Body of the buyer-facing confirmation message.
pub fn buyer_message(summary: &OrderSummary) -> String {
    format!(
        "Your order #{} is confirmed.\nItems:\n{}\nOrder total: {}\nThank you for your purchase!",
        summary.order_id,
        format_lines(summary),
        summary.total
    )
}

/// Body of the copy sent to the operational address.
pub fn ops_message(summary: &OrderSummary) -> String {
    format!(
        "User {} confirmed order #{}.\nItems:\n{}\nOrder total: {}",
        summary.user,
        summary.order_id,
        format_lines(summary),
        summary.total
    )
}

/// Posts mail payloads to an HTTP mail gateway.
pub struct WebhookNotifier {
    http: reqwest::Client,
    endpoint: String,
    ops_email: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: String, ops_email: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            ops_email,
        }
    }

    async fn deliver(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({
                "to": to,
                "subject": subject,
                "body": body,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotificationError::Delivery(format!(
                "mail gateway answered {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderNotifier for WebhookNotifier {
    #[instrument(skip(self, summary), fields(order_id = %summary.order_id))]
    async fn order_confirmed(
        &self,
        summary: &OrderSummary,
        recipients: &[String],
    ) -> Result<(), NotificationError> {
        let buyer_body = buyer_message(summary);
        for recipient in recipients {
            self.deliver(recipient, "Order confirmation", &buyer_body)
                .await?;
        }

        self.deliver(&self.ops_email, "Order confirmed", &ops_message(summary))
            .await?;

        info!(recipients = recipients.len(), "Order confirmation delivered");
        Ok(())
    }
}

/// Logs confirmations instead of delivering them; the development and test
/// default.
pub struct LogNotifier;

#[async_trait]
impl OrderNotifier for LogNotifier {
    async fn order_confirmed(
        &self,
        summary: &OrderSummary,
        recipients: &[String],
    ) -> Result<(), NotificationError> {
        info!(
            order_id = %summary.order_id,
            user = %summary.user,
            total = %summary.total,
            recipients = ?recipients,
            "Order confirmed (notification logged, no gateway configured)"
        );
        Ok(())
    }
}

/// Select the notifier implementation from configuration.
pub fn notifier_from_config(cfg: &AppConfig) -> Arc<dyn OrderNotifier> {
    match &cfg.notify_webhook_url {
        Some(endpoint) => Arc::new(WebhookNotifier::new(
            endpoint.clone(),
            cfg.ops_email.clone(),
        )),
        None => Arc::new(LogNotifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn summary() -> OrderSummary {
        OrderSummary {
            order_id: Uuid::nil(),
            user_id: Uuid::nil(),
            user: "buyer@example.com".to_string(),
            products: vec![
                OrderLine {
                    item_id: Uuid::nil(),
                    product: "Smartphone X".to_string(),
                    quantity: 2,
                    total_price: dec!(220.00),
                },
                OrderLine {
                    item_id: Uuid::nil(),
                    product: "Charger".to_string(),
                    quantity: 1,
                    total_price: dec!(15.50),
                },
            ],
            total: dec!(235.50),
        }
    }

    #[test]
    fn buyer_message_lists_every_line_and_the_total() {
        let body = buyer_message(&summary());
        assert!(body.contains("Smartphone X x 2"));
        assert!(body.contains("Charger x 1"));
        assert!(body.contains("Order total: 235.50"));
    }

    #[test]
    fn ops_message_names_the_buyer() {
        let body = ops_message(&summary());
        assert!(body.contains("buyer@example.com"));
        assert!(body.contains("confirmed order"));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let notifier = LogNotifier;
        notifier
            .order_confirmed(&summary(), &["buyer@example.com".to_string()])
            .await
            .unwrap();
    }
}
