use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::{ApiResponse, AppState};

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/order/:id", get(get_order))
        .route("/confirm/:id", patch(confirm_order))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmOrderRequest {
    pub status: String,
}

/// List the caller's orders with totals
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_orders(auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Full order detail (owner only)
pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .get_order(auth_user.user_id, id)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Confirm an order, decrementing stock and notifying the buyer.
///
/// The body must carry the literal status value "confirm"; anything else is
/// a validation failure. Re-confirming a progressed order is refused with
/// 403 reporting the current status.
pub async fn confirm_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if payload.status != "confirm" {
        return Err(ServiceError::ValidationError(format!(
            "Invalid status value '{}'; expected 'confirm'",
            payload.status
        )));
    }

    let outcome = state
        .services
        .orders
        .confirm_order(auth_user.user_id, id)
        .await?;

    Ok(success_response(ApiResponse::message_with(
        "Order confirmed successfully",
        outcome,
    )))
}
