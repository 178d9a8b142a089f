use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::common::{created_response, no_content_response};
use crate::services::contacts::CreateContactInput;
use crate::{ApiResponse, AppState};

pub fn contacts_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", post(create_contact).get(list_contacts))
        .route("/contacts/:id", delete(delete_contact))
}

/// Create a shipping contact for the caller
pub async fn create_contact(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateContactInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let contact = state
        .services
        .contacts
        .create_contact(auth_user.user_id, payload)
        .await?;

    Ok(created_response(ApiResponse::success(contact)))
}

/// List the caller's contacts
pub async fn list_contacts(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let contacts = state
        .services
        .contacts
        .list_contacts(auth_user.user_id)
        .await?;

    Ok(Json(ApiResponse::success(contacts)))
}

/// Delete one of the caller's contacts
pub async fn delete_contact(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .contacts
        .delete_contact(auth_user.user_id, id)
        .await?;

    Ok(no_content_response())
}
