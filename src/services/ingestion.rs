use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::entities::{
    category, listing_parameter, parameter, product, product_listing, shop, shop_category,
    Category, ListingParameter, Parameter, Product, ProductListing, Shop, ShopCategory,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Typed shape of a shop's YAML catalog feed.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogFeed {
    pub shop: String,
    #[serde(default)]
    pub categories: Vec<FeedCategory>,
    #[serde(default)]
    pub goods: Vec<FeedGood>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedCategory {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedGood {
    pub id: i32,
    pub name: String,
    pub category: i32,
    #[serde(default)]
    pub model: String,
    pub price: Decimal,
    pub price_rrc: Decimal,
    pub quantity: i32,
    /// Values arrive as arbitrary YAML scalars ("blue", 4096, true) and are
    /// stored as strings.
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_yaml::Value>,
}

/// Aggregate result of one feed ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub shop_id: Uuid,
    pub categories: usize,
    pub goods: usize,
    pub skipped: usize,
}

/// Ingests shop catalog feeds. Deliberately best-effort: every get-or-create
/// is its own commit point, so a mid-feed failure leaves the catalog
/// partially refreshed rather than rolling the whole feed back.
#[derive(Clone)]
pub struct IngestionService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    http: reqwest::Client,
    fetch_timeout: Duration,
}

impl IngestionService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            db,
            event_sender,
            http: reqwest::Client::new(),
            fetch_timeout,
        }
    }

    /// Fetch a feed from `url_str` and ingest it for the calling shop user.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn ingest_from_url(
        &self,
        user_id: Uuid,
        url_str: &str,
    ) -> Result<IngestReport, ServiceError> {
        let url = Url::parse(url_str)
            .map_err(|e| ServiceError::ValidationError(format!("Invalid feed URL: {}", e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ServiceError::ValidationError(format!(
                "Unsupported feed URL scheme '{}'",
                url.scheme()
            )));
        }

        let response = self
            .http
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| ServiceError::UpstreamFetch(format!("Failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::UpstreamFetch(format!(
                "Feed server answered {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::UpstreamFetch(format!("Failed to read feed: {}", e)))?;

        let feed = parse_feed(&body)?;
        self.ingest(user_id, feed).await
    }

    /// Upsert a parsed feed into the catalog store.
    #[instrument(skip(self, feed), fields(user_id = %user_id, shop = %feed.shop))]
    pub async fn ingest(
        &self,
        user_id: Uuid,
        feed: CatalogFeed,
    ) -> Result<IngestReport, ServiceError> {
        let db = &*self.db;
        let shop = self.resolve_shop(user_id, &feed.shop).await?;

        for cat in &feed.categories {
            let category = self.resolve_category(cat).await?;
            self.attach_shop_category(shop.id, category.id).await?;
        }

        let mut goods = 0usize;
        let mut skipped = 0usize;

        for good in &feed.goods {
            let category = Category::find()
                .filter(category::Column::ExternalId.eq(good.category))
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Good '{}' references unknown category {}",
                        good.name, good.category
                    ))
                })?;

            let product = self.resolve_product(&good.name, category.id).await?;

            let listing = match self.resolve_listing(product.id, shop.id, good).await? {
                Some(listing) => listing,
                None => {
                    // Same (external_id, shop) with different fields: the
                    // uniqueness constraint rejects it and the item is skipped.
                    warn!(
                        external_id = good.id,
                        shop_id = %shop.id,
                        "Skipping good with conflicting listing"
                    );
                    skipped += 1;
                    continue;
                }
            };
            goods += 1;

            for (name, value) in &good.parameters {
                let parameter = self.resolve_parameter(name).await?;
                self.resolve_listing_parameter(listing.id, parameter.id, &scalar_to_string(value))
                    .await?;
            }
        }

        info!(
            shop_id = %shop.id,
            categories = feed.categories.len(),
            goods = goods,
            skipped = skipped,
            "Feed ingested"
        );

        self.event_sender
            .send_or_log(Event::CatalogIngested {
                shop_id: shop.id,
                categories: feed.categories.len(),
                goods,
                skipped,
            })
            .await;

        Ok(IngestReport {
            shop_id: shop.id,
            categories: feed.categories.len(),
            goods,
            skipped,
        })
    }

    async fn resolve_shop(&self, user_id: Uuid, name: &str) -> Result<shop::Model, ServiceError> {
        let db = &*self.db;
        if let Some(existing) = Shop::find()
            .filter(shop::Column::Name.eq(name))
            .filter(shop::Column::UserId.eq(user_id))
            .one(db)
            .await?
        {
            return Ok(existing);
        }

        let created = shop::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            user_id: Set(Some(user_id)),
            url: Set(None),
        }
        .insert(db)
        .await;

        match created {
            Ok(model) => Ok(model),
            // Lost a race against a concurrent upload of the same feed.
            Err(e) if is_unique_violation(&e) => Shop::find()
                .filter(shop::Column::Name.eq(name))
                .filter(shop::Column::UserId.eq(user_id))
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::DatabaseError(e)),
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve_category(&self, cat: &FeedCategory) -> Result<category::Model, ServiceError> {
        let db = &*self.db;
        if let Some(existing) = Category::find()
            .filter(category::Column::ExternalId.eq(cat.id))
            .filter(category::Column::Name.eq(cat.name.as_str()))
            .one(db)
            .await?
        {
            return Ok(existing);
        }

        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            external_id: Set(cat.id),
            name: Set(cat.name.clone()),
        }
        .insert(db)
        .await?;
        Ok(model)
    }

    async fn attach_shop_category(
        &self,
        shop_id: Uuid,
        category_id: Uuid,
    ) -> Result<(), ServiceError> {
        let db = &*self.db;
        if ShopCategory::find_by_id((shop_id, category_id))
            .one(db)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let inserted = shop_category::ActiveModel {
            shop_id: Set(shop_id),
            category_id: Set(category_id),
        }
        .insert(db)
        .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve_product(
        &self,
        name: &str,
        category_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        let db = &*self.db;
        if let Some(existing) = Product::find()
            .filter(product::Column::Name.eq(name))
            .filter(product::Column::CategoryId.eq(category_id))
            .one(db)
            .await?
        {
            return Ok(existing);
        }

        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            category_id: Set(category_id),
            name: Set(name.to_string()),
        }
        .insert(db)
        .await;

        match created {
            Ok(model) => Ok(model),
            Err(e) if is_unique_violation(&e) => Product::find()
                .filter(product::Column::Name.eq(name))
                .filter(product::Column::CategoryId.eq(category_id))
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::DatabaseError(e)),
            Err(e) => Err(e.into()),
        }
    }

    /// Get-or-create keyed by the full field tuple. Returns `None` when the
    /// (external_id, shop) pair exists with different fields.
    async fn resolve_listing(
        &self,
        product_id: Uuid,
        shop_id: Uuid,
        good: &FeedGood,
    ) -> Result<Option<product_listing::Model>, ServiceError> {
        let db = &*self.db;
        if let Some(existing) = ProductListing::find()
            .filter(product_listing::Column::ExternalId.eq(good.id))
            .filter(product_listing::Column::ShopId.eq(shop_id))
            .filter(product_listing::Column::ProductId.eq(product_id))
            .filter(product_listing::Column::Model.eq(good.model.as_str()))
            .filter(product_listing::Column::Quantity.eq(good.quantity))
            .filter(product_listing::Column::Price.eq(good.price))
            .filter(product_listing::Column::PriceRrc.eq(good.price_rrc))
            .one(db)
            .await?
        {
            return Ok(Some(existing));
        }

        let created = product_listing::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            shop_id: Set(shop_id),
            external_id: Set(good.id),
            model: Set(good.model.clone()),
            quantity: Set(good.quantity),
            price: Set(good.price),
            price_rrc: Set(good.price_rrc),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await;

        match created {
            Ok(model) => Ok(Some(model)),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve_parameter(&self, name: &str) -> Result<parameter::Model, ServiceError> {
        let db = &*self.db;
        if let Some(existing) = Parameter::find()
            .filter(parameter::Column::Name.eq(name))
            .one(db)
            .await?
        {
            return Ok(existing);
        }

        let created = parameter::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
        }
        .insert(db)
        .await;

        match created {
            Ok(model) => Ok(model),
            Err(e) if is_unique_violation(&e) => Parameter::find()
                .filter(parameter::Column::Name.eq(name))
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::DatabaseError(e)),
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve_listing_parameter(
        &self,
        listing_id: Uuid,
        parameter_id: Uuid,
        value: &str,
    ) -> Result<(), ServiceError> {
        let db = &*self.db;
        if ListingParameter::find()
            .filter(listing_parameter::Column::ListingId.eq(listing_id))
            .filter(listing_parameter::Column::ParameterId.eq(parameter_id))
            .one(db)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let inserted = listing_parameter::ActiveModel {
            id: Set(Uuid::new_v4()),
            listing_id: Set(listing_id),
            parameter_id: Set(parameter_id),
            value: Set(value.to_string()),
        }
        .insert(db)
        .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Parse the feed body, distinguishing a missing required key (caller error)
/// from a body that is not usable YAML at all (upstream error).
pub fn parse_feed(body: &str) -> Result<CatalogFeed, ServiceError> {
    serde_yaml::from_str::<CatalogFeed>(body).map_err(|e| {
        let message = e.to_string();
        if message.contains("missing field") {
            ServiceError::ValidationError(format!("Missing key in feed: {}", message))
        } else {
            ServiceError::UpstreamFetch(format!("Failed to parse feed: {}", message))
        }
    })
}

fn scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
