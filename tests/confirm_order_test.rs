//! Order confirmation tests: stock decrement, one-way transition, owner
//! scoping, and the HTTP contract of PATCH /confirm/:id.

mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::json;

use retail_api::{
    entities::{OrderStatus, ProductListing, UserRole},
    errors::ServiceError,
    services::basket::{AddItemsInput, BasketLine},
    ListQuery,
};

async fn listing_quantity(app: &TestApp, listing_id: uuid::Uuid) -> i32 {
    ProductListing::find_by_id(listing_id)
        .one(&*app.state.db)
        .await
        .expect("query listing")
        .expect("listing exists")
        .quantity
}

/// End-to-end walkthrough: stock 10, add 4, add 4, add 5 fails with
/// 2 available, confirm leaves stock at 2.
#[tokio::test]
async fn confirm_decrements_stock_by_the_confirmed_quantity() {
    let app = TestApp::new().await;
    let (buyer, _) = app.seed_user("buyer@example.com", UserRole::Buyer).await;
    let contact = app.seed_contact(buyer.id).await;
    let (product_id, shop_id, listing_id) = app
        .seed_listing(None, "Acme", "Smartphone X", dec!(116990), 10)
        .await;

    let basket = &app.state.services.basket;
    for _ in 0..2 {
        basket
            .add_items(
                buyer.id,
                AddItemsInput {
                    contact_id: contact.id,
                    items: vec![BasketLine {
                        product_id,
                        shop_id,
                        quantity: 4,
                    }],
                },
            )
            .await
            .expect("add 4");
    }

    let err = basket
        .add_items(
            buyer.id,
            AddItemsInput {
                contact_id: contact.id,
                items: vec![BasketLine {
                    product_id,
                    shop_id,
                    quantity: 5,
                }],
            },
        )
        .await
        .expect_err("8 + 5 exceeds stock");
    assert_matches!(err, ServiceError::InsufficientStock { available, .. } => assert_eq!(available, 2));

    let items = basket
        .list_items(buyer.id, &ListQuery::default())
        .await
        .expect("list basket");
    let order_id = items[0].order_id;

    let outcome = app
        .state
        .services
        .orders
        .confirm_order(buyer.id, order_id)
        .await
        .expect("confirm");
    assert_eq!(outcome.status, OrderStatus::Confirmed);
    assert_eq!(outcome.total, dec!(116990) * rust_decimal::Decimal::from(8));

    // Stock was only checked at add time; the decrement happens here.
    assert_eq!(listing_quantity(&app, listing_id).await, 2);
}

#[tokio::test]
async fn confirm_is_one_way_and_never_double_decrements() {
    let app = TestApp::new().await;
    let (buyer, _) = app.seed_user("buyer@example.com", UserRole::Buyer).await;
    let contact = app.seed_contact(buyer.id).await;
    let (product_id, shop_id, listing_id) =
        app.seed_listing(None, "Acme", "Widget", dec!(50), 10).await;

    app.state
        .services
        .basket
        .add_items(
            buyer.id,
            AddItemsInput {
                contact_id: contact.id,
                items: vec![BasketLine {
                    product_id,
                    shop_id,
                    quantity: 3,
                }],
            },
        )
        .await
        .expect("seed basket");

    let items = app
        .state
        .services
        .basket
        .list_items(buyer.id, &ListQuery::default())
        .await
        .expect("list");
    let order_id = items[0].order_id;

    app.state
        .services
        .orders
        .confirm_order(buyer.id, order_id)
        .await
        .expect("first confirm");
    assert_eq!(listing_quantity(&app, listing_id).await, 7);

    // Second confirmation is refused, reporting the current status.
    let err = app
        .state
        .services
        .orders
        .confirm_order(buyer.id, order_id)
        .await
        .expect_err("second confirm must fail");
    assert_matches!(err, ServiceError::AlreadyProgressed(ref status) => {
        assert_eq!(status, "confirmed");
    });

    // And stock is not decremented again.
    assert_eq!(listing_quantity(&app, listing_id).await, 7);
}

#[tokio::test]
async fn confirmed_orders_refuse_basket_mutations() {
    let app = TestApp::new().await;
    let (buyer, _) = app.seed_user("buyer@example.com", UserRole::Buyer).await;
    let contact = app.seed_contact(buyer.id).await;
    let (product_id, shop_id, _) = app.seed_listing(None, "Acme", "Widget", dec!(50), 10).await;

    app.state
        .services
        .basket
        .add_items(
            buyer.id,
            AddItemsInput {
                contact_id: contact.id,
                items: vec![BasketLine {
                    product_id,
                    shop_id,
                    quantity: 1,
                }],
            },
        )
        .await
        .expect("seed basket");

    let items = app
        .state
        .services
        .basket
        .list_items(buyer.id, &ListQuery::default())
        .await
        .expect("list");
    let (order_id, item_id) = (items[0].order_id, items[0].id);

    app.state
        .services
        .orders
        .confirm_order(buyer.id, order_id)
        .await
        .expect("confirm");

    let err = app
        .state
        .services
        .basket
        .delete_item(buyer.id, item_id)
        .await
        .expect_err("confirmed orders are immutable to basket operations");
    assert_matches!(err, ServiceError::AlreadyProgressed(_));
}

#[tokio::test]
async fn confirm_endpoint_contract() {
    let app = TestApp::new().await;
    let (buyer, buyer_token) = app.seed_user("buyer@example.com", UserRole::Buyer).await;
    let (_, intruder_token) = app.seed_user("intruder@example.com", UserRole::Buyer).await;
    let contact = app.seed_contact(buyer.id).await;
    let (product_id, shop_id, _) = app.seed_listing(None, "Acme", "Widget", dec!(50), 10).await;

    app.state
        .services
        .basket
        .add_items(
            buyer.id,
            AddItemsInput {
                contact_id: contact.id,
                items: vec![BasketLine {
                    product_id,
                    shop_id,
                    quantity: 2,
                }],
            },
        )
        .await
        .expect("seed basket");

    let items = app
        .state
        .services
        .basket
        .list_items(buyer.id, &ListQuery::default())
        .await
        .expect("list");
    let order_id = items[0].order_id;

    // Invalid status value: 400.
    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/confirm/{}", order_id),
            Some(&buyer_token),
            Some(json!({"status": "cancel"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Someone else's order: 403.
    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/confirm/{}", order_id),
            Some(&intruder_token),
            Some(json!({"status": "confirm"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Missing order: 404.
    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/confirm/{}", uuid::Uuid::new_v4()),
            Some(&buyer_token),
            Some(json!({"status": "confirm"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The owner confirms: 200 with a success marker and the new status.
    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/confirm/{}", order_id),
            Some(&buyer_token),
            Some(json!({"status": "confirm"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("confirmed"));

    // Re-confirming over HTTP: 403 naming the current status.
    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/confirm/{}", order_id),
            Some(&buyer_token),
            Some(json!({"status": "confirm"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("confirmed"));
}

#[tokio::test]
async fn order_views_expose_totals_and_ownership() {
    let app = TestApp::new().await;
    let (buyer, buyer_token) = app.seed_user("buyer@example.com", UserRole::Buyer).await;
    let (_, intruder_token) = app.seed_user("intruder@example.com", UserRole::Buyer).await;
    let contact = app.seed_contact(buyer.id).await;
    let (product_id, shop_id, _) = app.seed_listing(None, "Acme", "Widget", dec!(25), 10).await;

    app.state
        .services
        .basket
        .add_items(
            buyer.id,
            AddItemsInput {
                contact_id: contact.id,
                items: vec![BasketLine {
                    product_id,
                    shop_id,
                    quantity: 2,
                }],
            },
        )
        .await
        .expect("seed basket");

    let response = app
        .request(Method::GET, "/api/v1/orders", Some(&buyer_token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let orders = body["data"].as_array().expect("order list");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["status"], json!("new"));
    let order_id = orders[0]["id"].as_str().expect("order id").to_string();

    // Detail for the owner includes items and the total.
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/order/{}", order_id),
            Some(&buyer_token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));

    // Foreign detail access: 403.
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/order/{}", order_id),
            Some(&intruder_token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
