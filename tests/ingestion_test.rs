//! Catalog ingestion tests: idempotent upsert, conflicting-listing skips,
//! and the HTTP contract of POST /upload.

mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use retail_api::{
    entities::{Category, Parameter, Product, ProductListing, Shop, UserRole},
    services::ingestion::parse_feed,
};

const FEED: &str = r#"
shop: Acme
categories:
  - id: 224
    name: Smartphones
goods:
  - id: 4216292
    category: 224
    model: apple/iphone/xs-max
    name: Smartphone X
    price: 110000
    price_rrc: 116990
    quantity: 14
    parameters:
      "Display, inch": 6.5
      "Color": space gray
  - id: 4216313
    category: 224
    model: apple/iphone/xr
    name: Smartphone R
    price: 60000
    price_rrc: 64990
    quantity: 9
    parameters:
      "Color": red
"#;

async fn table_counts(app: &TestApp) -> (u64, u64, u64, u64, u64) {
    let db = &*app.state.db;
    (
        Shop::find().count(db).await.unwrap(),
        Category::find().count(db).await.unwrap(),
        Product::find().count(db).await.unwrap(),
        ProductListing::find().count(db).await.unwrap(),
        Parameter::find().count(db).await.unwrap(),
    )
}

#[tokio::test]
async fn ingest_creates_the_expected_rows_and_is_idempotent() {
    let app = TestApp::new().await;
    let (shop_user, _) = app.seed_user("acme@example.com", UserRole::Shop).await;

    let feed = parse_feed(FEED).expect("feed parses");
    let report = app
        .state
        .services
        .ingestion
        .ingest(shop_user.id, feed.clone())
        .await
        .expect("ingest");

    assert_eq!(report.categories, 1);
    assert_eq!(report.goods, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(table_counts(&app).await, (1, 1, 2, 2, 2));

    // Re-ingesting the identical feed produces no duplicate rows.
    let report = app
        .state
        .services
        .ingestion
        .ingest(shop_user.id, feed)
        .await
        .expect("re-ingest");
    assert_eq!(report.skipped, 0);
    assert_eq!(table_counts(&app).await, (1, 1, 2, 2, 2));
}

#[tokio::test]
async fn conflicting_listing_is_skipped_not_fatal() {
    let app = TestApp::new().await;
    let (shop_user, _) = app.seed_user("acme@example.com", UserRole::Shop).await;

    let feed = parse_feed(FEED).expect("feed parses");
    app.state
        .services
        .ingestion
        .ingest(shop_user.id, feed)
        .await
        .expect("ingest");

    // Same external ids, different quantities: the unique (external_id,
    // shop) constraint rejects the new rows and both goods are skipped.
    let changed = FEED.replace("quantity: 14", "quantity: 2").replace("quantity: 9", "quantity: 1");
    let report = app
        .state
        .services
        .ingestion
        .ingest(shop_user.id, parse_feed(&changed).expect("feed parses"))
        .await
        .expect("ingest of conflicting feed still succeeds");

    assert_eq!(report.goods, 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(table_counts(&app).await, (1, 1, 2, 2, 2));
}

#[tokio::test]
async fn goods_with_undeclared_categories_fail_validation() {
    let app = TestApp::new().await;
    let (shop_user, _) = app.seed_user("acme@example.com", UserRole::Shop).await;

    let feed = FEED.replace("category: 224", "category: 999");
    let err = app
        .state
        .services
        .ingestion
        .ingest(shop_user.id, parse_feed(&feed).expect("feed parses"))
        .await
        .expect_err("unknown category must fail");

    assert_eq!(
        err.status_code(),
        axum::http::StatusCode::BAD_REQUEST,
        "unknown categories are a caller error"
    );
    // Partial application: the shop and declared categories were committed
    // before the failing good.
    let (shops, categories, ..) = table_counts(&app).await;
    assert_eq!((shops, categories), (1, 1));
}

#[tokio::test]
async fn upload_endpoint_contract() {
    let app = TestApp::new().await;
    let (_, shop_token) = app.seed_user("acme@example.com", UserRole::Shop).await;
    let (_, buyer_token) = app.seed_user("buyer@example.com", UserRole::Buyer).await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(&server)
        .await;

    // Unauthenticated: 401.
    let response = app
        .request(
            Method::POST,
            "/api/v1/upload",
            None,
            Some(json!({"url": format!("{}/feed.yaml", server.uri())})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Buyers cannot upload: 403.
    let response = app
        .request(
            Method::POST,
            "/api/v1/upload",
            Some(&buyer_token),
            Some(json!({"url": format!("{}/feed.yaml", server.uri())})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Malformed URL: 400.
    let response = app
        .request(
            Method::POST,
            "/api/v1/upload",
            Some(&shop_token),
            Some(json!({"url": "not a url"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unreachable feed: 400.
    let response = app
        .request(
            Method::POST,
            "/api/v1/upload",
            Some(&shop_token),
            Some(json!({"url": format!("{}/missing.yaml", server.uri())})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Shop account with a good feed: 200.
    let response = app
        .request(
            Method::POST,
            "/api/v1/upload",
            Some(&shop_token),
            Some(json!({"url": format!("{}/feed.yaml", server.uri())})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let (shops, categories, products, listings, _) = table_counts(&app).await;
    assert_eq!((shops, categories, products, listings), (1, 1, 2, 2));
}

#[tokio::test]
async fn products_endpoint_is_public_and_searchable() {
    let app = TestApp::new().await;
    let (shop_user, _) = app.seed_user("acme@example.com", UserRole::Shop).await;
    app.state
        .services
        .ingestion
        .ingest(shop_user.id, parse_feed(FEED).expect("feed parses"))
        .await
        .expect("ingest");

    let response = app
        .request(Method::GET, "/api/v1/products", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::response_json(response).await;
    assert_eq!(body["data"]["total"], json!(2));

    let response = app
        .request(
            Method::GET,
            "/api/v1/products?search=Smartphone%20R",
            None,
            None,
        )
        .await;
    let body = common::response_json(response).await;
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(
        body["data"]["items"][0]["product_name"],
        json!("Smartphone R")
    );

    // Unknown sort fields are rejected.
    let response = app
        .request(Method::GET, "/api/v1/products?sort_by=bogus", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
