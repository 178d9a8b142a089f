use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::AuthUser;
use crate::entities::UserRole;
use crate::errors::ServiceError;
use crate::handlers::common::{success_response, validate_input};
use crate::{ApiResponse, AppState, ListQuery, PaginatedResponse};

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_catalog))
        .route("/products", get(list_products))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UploadRequest {
    /// URL of the shop's YAML catalog feed
    #[validate(length(min = 1, message = "URL parameter is missing"))]
    pub url: String,
}

/// Ingest a shop's catalog feed
#[utoipa::path(
    post,
    path = "/api/v1/upload",
    request_body = UploadRequest,
    responses(
        (status = 200, description = "Feed ingested successfully"),
        (status = 400, description = "Bad URL, unreachable feed, or missing feed key", body = crate::errors::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::errors::ErrorResponse),
        (status = 403, description = "Caller is not a shop account", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn upload_catalog(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<UploadRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_role(UserRole::Shop)?;
    validate_input(&payload)?;

    let report = state
        .services
        .ingestion
        .ingest_from_url(auth_user.user_id, &payload.url)
        .await?;

    Ok(success_response(ApiResponse::message_with(
        "Products uploaded successfully",
        report,
    )))
}

/// List product listings across all shops
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("search" = Option<String>, Query, description = "Match against model, product, shop, or category"),
        ("sort_by" = Option<String>, Query, description = "model | product | shop | category | price_rrc | quantity"),
        ("sort_order" = Option<String>, Query, description = "asc | desc"),
    ),
    responses(
        (status = 200, description = "Paginated listing view"),
        (status = 400, description = "Unknown sort field", body = crate::errors::ErrorResponse),
    )
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (rows, total) = state.services.catalog.list_products(&query).await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        rows,
        query.page,
        query.limit,
        total,
    ))))
}
