use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    api::rest::extract::{ApiJson, ApiPath},
    domain::policy::Capability,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        recipients::{CreateRecipientRequest, RecipientService, UpdateRecipientRequest},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_recipients).post(create_recipient))
        .route("/:id", put(update_recipient).delete(delete_recipient))
}

async fn list_recipients(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ManageRecipients)?;
    let recipients = RecipientService::new(state).list().await?;
    Ok(Json(serde_json::json!({ "recipients": recipients })))
}

async fn create_recipient(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<CreateRecipientRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServiceError> {
    user.require(Capability::ManageRecipients)?;
    let recipient = RecipientService::new(state).create(&user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "recipient": recipient })),
    ))
}

async fn update_recipient(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateRecipientRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ManageRecipients)?;
    let recipient = RecipientService::new(state)
        .update(&user, id, payload)
        .await?;
    Ok(Json(serde_json::json!({ "recipient": recipient })))
}

async fn delete_recipient(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ServiceError> {
    user.require(Capability::ManageRecipients)?;
    RecipientService::new(state).delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
