#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use retail_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::{
        category, contact, product, product_listing, shop, user, ContactModel, UserModel, UserRole,
    },
    events::{self, EventSender},
    handlers::AppServices,
    notifications::LogNotifier,
    AppState,
};

/// Test harness over an in-memory SQLite database running the real migrator.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub auth: Arc<AuthService>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single pooled connection keeps the in-memory database alive
        // across the whole test.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let cfg = Arc::new(cfg);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            cfg.auth_audience.clone(),
            cfg.jwt_expiration,
        )));

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            Arc::new(LogNotifier),
            &cfg,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", retail_api::api_v1_routes())
            .layer(axum::middleware::from_fn_with_state(
                auth.clone(),
                |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
                 mut req: axum::http::Request<Body>,
                 next: axum::middleware::Next| async move {
                    req.extensions_mut().insert(auth);
                    next.run(req).await
                },
            ))
            .layer(axum::middleware::from_fn(
                retail_api::middleware_helpers::request_id::request_id_middleware,
            ))
            .with_state(state.clone());

        Self {
            router,
            state,
            auth,
            _event_task: event_task,
        }
    }

    /// Insert a user row and mint a matching bearer token.
    pub async fn seed_user(&self, email: &str, role: UserRole) -> (UserModel, String) {
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            name: Set(email.split('@').next().unwrap_or("user").to_string()),
            role: Set(role),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed user");

        let token = self
            .auth
            .issue_token(model.id, &model.email, &model.name, role)
            .expect("failed to issue token");

        (model, token)
    }

    pub async fn seed_contact(&self, user_id: Uuid) -> ContactModel {
        contact::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            city: Set("Springfield".to_string()),
            street: Set("Evergreen Terrace".to_string()),
            house: Set("742".to_string()),
            structure: Set(String::new()),
            building: Set(String::new()),
            apartment: Set(String::new()),
            phone: Set("+1-555-0100".to_string()),
            note: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed contact")
    }

    /// Seed a shop with one listed product; returns (product_id, shop_id, listing_id).
    pub async fn seed_listing(
        &self,
        owner: Option<Uuid>,
        shop_name: &str,
        product_name: &str,
        price_rrc: Decimal,
        quantity: i32,
    ) -> (Uuid, Uuid, Uuid) {
        let category = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            external_id: Set(224),
            name: Set(format!("{}-category", product_name)),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed category");

        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            category_id: Set(category.id),
            name: Set(product_name.to_string()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed product");

        let shop = shop::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(shop_name.to_string()),
            user_id: Set(owner),
            url: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed shop");

        let listing = product_listing::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            shop_id: Set(shop.id),
            external_id: Set(rand_external_id()),
            model: Set(format!("{}-model", product_name)),
            quantity: Set(quantity),
            price: Set(price_rrc),
            price_rrc: Set(price_rrc),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed listing");

        (product.id, shop.id, listing.id)
    }

    /// Issue a request against the router, optionally authenticated.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request build"),
            None => builder.body(Body::empty()).expect("request build"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router call")
    }
}

/// Distinct external ids keep seeded listings clear of the
/// (external_id, shop) uniqueness constraint.
fn rand_external_id() -> i32 {
    (Uuid::new_v4().as_u128() % 1_000_000) as i32
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
