use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    JoinType, ModelTrait, Order as SortOrder, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{
    category, contact, order, order_item, product, product_listing, shop, Contact, Order,
    OrderItem, OrderStatus, Product, ProductListing,
};
use crate::errors::{insufficient_stock, ServiceError};
use crate::events::{Event, EventSender};
use crate::ListQuery;

/// The stock-aware cart. A basket is the caller's unique order in `New`
/// status; lines merge per product and are validated against live listing
/// stock on every mutation. Stock is only checked here — the decrement
/// happens at confirmation.
#[derive(Clone)]
pub struct BasketService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddItemsInput {
    pub contact_id: Uuid,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<BasketLine>,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct BasketLine {
    pub product_id: Uuid,
    pub shop_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
}

/// Per-product action map returned from an add call.
#[derive(Debug, Serialize, ToSchema)]
pub struct AddItemsOutcome {
    pub order_id: Uuid,
    pub details: BTreeMap<String, String>,
}

/// One row of the basket view.
#[derive(Debug, Clone, Serialize, FromQueryResult, ToSchema)]
pub struct BasketItemView {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub category_name: String,
    pub shop_id: Uuid,
    pub shop_name: String,
    pub quantity: i32,
    pub total_price: Decimal,
}

impl BasketService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Add or merge items into the caller's basket.
    ///
    /// Lines are applied in order and each line commits on its own; the
    /// first failing line aborts the rest of the call while earlier lines
    /// stay committed. A failing line itself leaves no partial state.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn add_items(
        &self,
        user_id: Uuid,
        input: AddItemsInput,
    ) -> Result<AddItemsOutcome, ServiceError> {
        input.validate()?;
        for line in &input.items {
            line.validate()?;
        }

        let db = &*self.db;

        // The contact must exist and belong to the caller; foreign contacts
        // are indistinguishable from unknown ones.
        let contact = Contact::find_by_id(input.contact_id)
            .one(db)
            .await?
            .filter(|c| c.user_id == user_id)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Unknown contact {}", input.contact_id))
            })?;

        let basket = self.resolve_basket(user_id, &contact).await?;

        let mut details = BTreeMap::new();
        for line in &input.items {
            let action = self.apply_line(&basket, line).await?;
            details.insert(action.product_name, action.action);

            self.event_sender
                .send_or_log(Event::BasketItemAdded {
                    order_id: basket.id,
                    product_id: line.product_id,
                    quantity: line.quantity,
                })
                .await;
        }

        Ok(AddItemsOutcome {
            order_id: basket.id,
            details,
        })
    }

    /// All lines of the caller's basket, searchable and sortable across
    /// product, shop, category and price fields.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_items(
        &self,
        user_id: Uuid,
        query: &ListQuery,
    ) -> Result<Vec<BasketItemView>, ServiceError> {
        let mut select = OrderItem::find()
            .join(JoinType::InnerJoin, order_item::Relation::Order.def())
            .join(JoinType::InnerJoin, order_item::Relation::Product.def())
            .join(JoinType::InnerJoin, order_item::Relation::Shop.def())
            .join(JoinType::InnerJoin, product::Relation::Category.def())
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::Column::Status.eq(OrderStatus::New))
            .select_only()
            .column(order_item::Column::Id)
            .column(order_item::Column::OrderId)
            .column(order_item::Column::Quantity)
            .column(order_item::Column::TotalPrice)
            .column_as(product::Column::Id, "product_id")
            .column_as(product::Column::Name, "product_name")
            .column_as(category::Column::Name, "category_name")
            .column_as(shop::Column::Id, "shop_id")
            .column_as(shop::Column::Name, "shop_name");

        if let Some(term) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let term = term.trim();
            select = select.filter(
                Condition::any()
                    .add(product::Column::Name.contains(term))
                    .add(shop::Column::Name.contains(term))
                    .add(category::Column::Name.contains(term)),
            );
        }

        let direction = query.sort_direction();
        select = match query.sort_by.as_deref() {
            Some("product") => select.order_by(product::Column::Name, direction),
            Some("shop") => select.order_by(shop::Column::Name, direction),
            Some("category") => select.order_by(category::Column::Name, direction),
            Some("price") => select.order_by(order_item::Column::TotalPrice, direction),
            Some("quantity") => select.order_by(order_item::Column::Quantity, direction),
            Some(other) => {
                return Err(ServiceError::ValidationError(format!(
                    "Unknown sort field '{}'",
                    other
                )))
            }
            None => select.order_by(order_item::Column::CreatedAt, SortOrder::Asc),
        };

        let rows = select.into_model::<BasketItemView>().all(&*self.db).await?;
        Ok(rows)
    }

    /// Delete one basket line. Owner-only; orders past `New` are closed to
    /// basket mutations.
    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    pub async fn delete_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;

        let item = OrderItem::find_by_id(item_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order item {} not found", item_id)))?;

        let order = Order::find_by_id(item.order_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("Order item {} has no order", item_id))
            })?;

        if order.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "You do not own this order item".to_string(),
            ));
        }
        if order.status.is_progressed() {
            return Err(ServiceError::AlreadyProgressed(
                order.status.as_str().to_string(),
            ));
        }

        let order_id = order.id;
        item.delete(db).await?;

        self.event_sender
            .send_or_log(Event::BasketItemRemoved { order_id, item_id })
            .await;

        info!(item_id = %item_id, "Basket item deleted");
        Ok(())
    }

    /// Get-or-create the caller's unique `New` order. The partial unique
    /// index on (user_id) WHERE status = 'new' is the authority; an insert
    /// that loses the creation race falls back to the winner's row.
    async fn resolve_basket(
        &self,
        user_id: Uuid,
        contact: &contact::Model,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db;

        if let Some(existing) = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::Column::Status.eq(OrderStatus::New))
            .one(db)
            .await?
        {
            if existing.contact_id == contact.id {
                return Ok(existing);
            }
            // Re-point the basket at the contact from this call.
            let mut active: order::ActiveModel = existing.into();
            active.contact_id = Set(contact.id);
            return Ok(active.update(db).await?);
        }

        let created = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            contact_id: Set(contact.id),
            status: Set(OrderStatus::New),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await;

        match created {
            Ok(model) => Ok(model),
            Err(e) if is_unique_violation(&e) => Order::find()
                .filter(order::Column::UserId.eq(user_id))
                .filter(order::Column::Status.eq(OrderStatus::New))
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::DatabaseError(e)),
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_line(
        &self,
        basket: &order::Model,
        line: &BasketLine,
    ) -> Result<LineAction, ServiceError> {
        let db = &*self.db;

        // The product must actually be sold by the given shop.
        let listing = ProductListing::find()
            .filter(product_listing::Column::ProductId.eq(line.product_id))
            .filter(product_listing::Column::ShopId.eq(line.shop_id))
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Product {} is not sold by shop {}",
                    line.product_id, line.shop_id
                ))
            })?;

        let product = Product::find_by_id(line.product_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", line.product_id))
            })?;

        let available = listing.quantity;

        let existing = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(basket.id))
            .filter(order_item::Column::ProductId.eq(line.product_id))
            .one(db)
            .await?;

        match existing {
            Some(item) => {
                let merged = checked_quantity(item.quantity, line.quantity)?;
                if merged > available {
                    // Reject the whole line; the existing line keeps its
                    // quantity and the caller learns the remaining headroom.
                    return Err(insufficient_stock(&product.name, available - item.quantity));
                }

                let total_price = self.current_line_total(product.id, merged).await?;
                let mut active: order_item::ActiveModel = item.into();
                active.quantity = Set(merged);
                active.total_price = Set(total_price);
                active.update(db).await?;

                Ok(LineAction {
                    product_name: product.name,
                    action: "updated quantity in order".to_string(),
                })
            }
            None => {
                if line.quantity > available {
                    return Err(insufficient_stock(&product.name, available));
                }

                let total_price = self.current_line_total(product.id, line.quantity).await?;
                order_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(basket.id),
                    product_id: Set(line.product_id),
                    shop_id: Set(line.shop_id),
                    quantity: Set(line.quantity),
                    total_price: Set(total_price),
                    created_at: Set(Utc::now()),
                }
                .insert(db)
                .await?;

                Ok(LineAction {
                    product_name: product.name,
                    action: "added to order".to_string(),
                })
            }
        }
    }

    /// Line totals always use the retail price of the product's first
    /// listing at save time ("first" = earliest created). The price is read
    /// live on every save, so it drifts if the listing changes between add
    /// and confirm.
    async fn current_line_total(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Decimal, ServiceError> {
        let listing = ProductListing::find()
            .filter(product_listing::Column::ProductId.eq(product_id))
            .order_by_asc(product_listing::Column::CreatedAt)
            .order_by_asc(product_listing::Column::Id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("Product {} has no listings", product_id))
            })?;

        Ok(line_total(listing.price_rrc, quantity))
    }
}

struct LineAction {
    product_name: String,
    action: String,
}

fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Quantity math that would overflow i32 is a validation failure, not a panic.
fn checked_quantity(existing: i32, requested: i32) -> Result<i32, ServiceError> {
    existing.checked_add(requested).ok_or_else(|| {
        ServiceError::ValidationError("Requested quantity is out of range".to_string())
    })
}

fn line_total(price_rrc: Decimal, quantity: i32) -> Decimal {
    price_rrc * Decimal::from(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn checked_quantity_rejects_overflow() {
        assert_eq!(checked_quantity(3, 4).unwrap(), 7);
        assert!(checked_quantity(i32::MAX, 1).is_err());
    }

    #[test]
    fn line_total_is_price_times_quantity() {
        assert_eq!(line_total(dec!(19.99), 3), dec!(59.97));
    }
}
