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
        users::{CreateUserRequest, UpdateUserRequest, UserService},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", put(update_user).delete(delete_user))
}

async fn list_users(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ManageUsers)?;
    let users = UserService::new(state).list().await?;
    Ok(Json(serde_json::json!({ "users": users })))
}

async fn create_user(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServiceError> {
    user.require(Capability::ManageUsers)?;
    let created = UserService::new(state).create(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "user": created }))))
}

async fn update_user(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ManageUsers)?;
    let updated = UserService::new(state).update(&user, id, payload).await?;
    Ok(Json(serde_json::json!({ "user": updated })))
}

async fn delete_user(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ServiceError> {
    user.require(Capability::ManageUsers)?;
    UserService::new(state).delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
