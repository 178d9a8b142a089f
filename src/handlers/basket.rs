use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::common::{created_response, no_content_response, validate_input};
use crate::services::basket::AddItemsInput;
use crate::{ApiResponse, AppState, ListQuery};

pub fn basket_routes() -> Router<AppState> {
    Router::new()
        .route("/add_order_items", post(add_order_items))
        .route("/basket", get(list_basket))
        .route("/delete_order_item/:id", delete(delete_order_item))
}

/// Add or merge items into the caller's basket.
///
/// Responds 201 with a per-product action map; an insufficient-stock line
/// aborts the call with 403 naming the product and the remaining headroom.
pub async fn add_order_items(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<AddItemsInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .basket
        .add_items(auth_user.user_id, payload)
        .await?;

    Ok(created_response(ApiResponse::message_with(
        "Item(s) added successfully",
        outcome,
    )))
}

/// List the caller's basket with computed line totals
pub async fn list_basket(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let items = state
        .services
        .basket
        .list_items(auth_user.user_id, &query)
        .await?;

    Ok(Json(ApiResponse::success(items)))
}

/// Delete one basket line (owner only)
pub async fn delete_order_item(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .basket
        .delete_item(auth_user.user_id, id)
        .await?;

    Ok(no_content_response())
}
