use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult, JoinType, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{category, product, product_listing, shop, ProductListing};
use crate::errors::ServiceError;
use crate::ListQuery;

/// Read-side of the catalog: the public, searchable listing view.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

/// One row of the public product listing view.
#[derive(Debug, Clone, Serialize, FromQueryResult, ToSchema)]
pub struct ListingView {
    pub id: Uuid,
    pub model: String,
    pub quantity: i32,
    pub price_rrc: Decimal,
    pub product_id: Uuid,
    pub product_name: String,
    pub category_name: String,
    pub shop_id: Uuid,
    pub shop_name: String,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Paginated, searchable, sortable listing view across all shops.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: &ListQuery,
    ) -> Result<(Vec<ListingView>, u64), ServiceError> {
        let mut select = ProductListing::find()
            .join(JoinType::InnerJoin, product_listing::Relation::Product.def())
            .join(JoinType::InnerJoin, product_listing::Relation::Shop.def())
            .join(JoinType::InnerJoin, product::Relation::Category.def())
            .select_only()
            .column(product_listing::Column::Id)
            .column(product_listing::Column::Model)
            .column(product_listing::Column::Quantity)
            .column(product_listing::Column::PriceRrc)
            .column_as(product::Column::Id, "product_id")
            .column_as(product::Column::Name, "product_name")
            .column_as(category::Column::Name, "category_name")
            .column_as(shop::Column::Id, "shop_id")
            .column_as(shop::Column::Name, "shop_name");

        if let Some(term) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let term = term.trim();
            select = select.filter(
                Condition::any()
                    .add(product_listing::Column::Model.contains(term))
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
            Some("price_rrc") => select.order_by(product_listing::Column::PriceRrc, direction),
            Some("quantity") => select.order_by(product_listing::Column::Quantity, direction),
            Some("model") => select.order_by(product_listing::Column::Model, direction),
            Some(other) => {
                return Err(ServiceError::ValidationError(format!(
                    "Unknown sort field '{}'",
                    other
                )))
            }
            None => select.order_by(product_listing::Column::Model, Order::Asc),
        };

        let paginator = select
            .into_model::<ListingView>()
            .paginate(&*self.db, query.limit);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(query.page.saturating_sub(1)).await?;

        Ok((rows, total))
    }
}
