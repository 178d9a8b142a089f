use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::entities::{
    order, order_item, product, product_listing, shop, Contact, ContactModel, Order, OrderItem,
    OrderStatus, ProductListing, User,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::notifications::{OrderLine, OrderNotifier, OrderSummary};

/// Order read surface and the confirmation transition.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    notifier: Arc<dyn OrderNotifier>,
}

/// One order in the caller's order list.
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub total_sum: Decimal,
}

/// One line of an order detail.
#[derive(Debug, Clone, Serialize, FromQueryResult)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub shop_id: Uuid,
    pub shop_name: String,
    pub quantity: i32,
    pub total_price: Decimal,
}

/// Full order as returned by the detail endpoint.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub contact: ContactModel,
    pub items: Vec<OrderItemView>,
    pub total_sum: Decimal,
}

/// Result of a successful confirmation.
#[derive(Debug, Serialize)]
pub struct ConfirmOutcome {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub total: Decimal,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Self {
        Self {
            db,
            event_sender,
            notifier,
        }
    }

    /// The caller's orders, newest first, with per-order totals.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_orders(&self, user_id: Uuid) -> Result<Vec<OrderView>, ServiceError> {
        let db = &*self.db;

        let orders = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(db)
            .await?;

        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(db)
            .await?;

        let mut totals: HashMap<Uuid, Decimal> = HashMap::new();
        for item in items {
            *totals.entry(item.order_id).or_insert(Decimal::ZERO) += item.total_price;
        }

        Ok(orders
            .into_iter()
            .map(|o| OrderView {
                total_sum: totals.get(&o.id).copied().unwrap_or(Decimal::ZERO),
                id: o.id,
                status: o.status,
                created_at: o.created_at,
            })
            .collect())
    }

    /// Full order with items; owner-only.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn get_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db;

        let order = Order::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "You do not own this order".to_string(),
            ));
        }

        let contact = Contact::find_by_id(order.contact_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("Order {} has no contact", order_id))
            })?;

        let items = OrderItem::find()
            .join(JoinType::InnerJoin, order_item::Relation::Product.def())
            .join(JoinType::InnerJoin, order_item::Relation::Shop.def())
            .filter(order_item::Column::OrderId.eq(order_id))
            .select_only()
            .column(order_item::Column::Id)
            .column(order_item::Column::Quantity)
            .column(order_item::Column::TotalPrice)
            .column_as(product::Column::Id, "product_id")
            .column_as(product::Column::Name, "product_name")
            .column_as(shop::Column::Id, "shop_id")
            .column_as(shop::Column::Name, "shop_name")
            .order_by_asc(order_item::Column::CreatedAt)
            .into_model::<OrderItemView>()
            .all(db)
            .await?;

        let total_sum = items.iter().map(|i| i.total_price).sum();

        Ok(OrderDetail {
            id: order.id,
            status: order.status,
            created_at: order.created_at,
            contact,
            items,
            total_sum,
        })
    }

    /// Confirm an order: one transaction wrapping a compare-and-swap on the
    /// status plus the per-line stock decrements, so two racing confirms
    /// cannot both decrement. Already-progressed orders are refused, not
    /// treated as an idempotent success.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn confirm_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<ConfirmOutcome, ServiceError> {
        let db = &*self.db;

        let txn = db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "You do not own this order".to_string(),
            ));
        }
        if order.status.is_progressed() {
            return Err(ServiceError::AlreadyProgressed(
                order.status.as_str().to_string(),
            ));
        }

        // Compare-and-swap: only a basket-stage order flips to confirmed.
        let update = Order::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Confirmed))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.is_in([OrderStatus::Basket, OrderStatus::New]))
            .exec(&txn)
            .await?;

        if update.rows_affected == 0 {
            // Lost the race to a concurrent confirmation.
            let current = Order::find_by_id(order_id)
                .one(&txn)
                .await?
                .map(|o| o.status.as_str().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(ServiceError::AlreadyProgressed(current));
        }

        let user = User::find_by_id(order.user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("Order {} has no user", order_id))
            })?;

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .find_also_related(crate::entities::Product)
            .all(&txn)
            .await?;

        let mut lines = Vec::with_capacity(items.len());
        let mut total = Decimal::ZERO;
        let mut stock_events = Vec::new();

        for (item, product) in items {
            let product_name = product
                .map(|p| p.name)
                .unwrap_or_else(|| item.product_id.to_string());

            lines.push(OrderLine {
                item_id: item.id,
                product: product_name,
                quantity: item.quantity,
                total_price: item.total_price,
            });
            total += item.total_price;

            // Decrement the shop-specific listing, if it still exists. No
            // floor check: add-time over-subscription across users can push
            // the count below zero, which is accepted and logged.
            if let Some(listing) = ProductListing::find()
                .filter(product_listing::Column::ProductId.eq(item.product_id))
                .filter(product_listing::Column::ShopId.eq(item.shop_id))
                .one(&txn)
                .await?
            {
                let old_quantity = listing.quantity;
                let new_quantity = old_quantity - item.quantity;
                let listing_id = listing.id;

                let mut active: product_listing::ActiveModel = listing.into();
                active.quantity = Set(new_quantity);
                active.update(&txn).await?;

                stock_events.push(Event::StockDecremented {
                    listing_id,
                    old_quantity,
                    new_quantity,
                });
            }
        }

        txn.commit().await?;

        info!(order_id = %order_id, total = %total, "Order confirmed");

        self.event_sender
            .send_or_log(Event::OrderConfirmed {
                order_id,
                user_id: order.user_id,
                total,
            })
            .await;
        for event in stock_events {
            self.event_sender.send_or_log(event).await;
        }

        // Fire-and-forget: a failed delivery is logged, never surfaced.
        let summary = OrderSummary {
            order_id,
            user_id: user.id,
            user: user.name.clone(),
            products: lines,
            total,
        };
        let recipients = vec![user.email];
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.order_confirmed(&summary, &recipients).await {
                error!(order_id = %summary.order_id, "Failed to deliver order confirmation: {}", e);
            }
        });

        Ok(ConfirmOutcome {
            order_id,
            status: OrderStatus::Confirmed,
            total,
        })
    }
}
