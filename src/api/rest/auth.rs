use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::rest::extract::ApiJson,
    domain::models::{Role, User},
    infrastructure::{
        auth::{issue_token, AuthenticatedUser},
        state::AppState,
    },
    services::{errors::ServiceError, users::UserService},
};

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    role: Role,
    user: User,
}

async fn login(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<serde_json::Value>)> {
    let service = UserService::new(Arc::clone(&state));
    let user = match service
        .authenticate(&payload.username, &payload.password)
        .await
    {
        Ok(user) => user,
        Err(ServiceError::Unauthenticated) => return Err(unauthorized()),
        Err(err) => return Err(to_response(err)),
    };

    let token = issue_token(&state, &user).map_err(to_response)?;

    Ok(Json(LoginResponse {
        token,
        role: user.role,
        user,
    }))
}

async fn me(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let profile = UserService::new(state).get(user.user_id).await?;
    if !profile.active {
        return Err(ServiceError::Unauthenticated);
    }
    Ok(Json(serde_json::json!({ "user": profile })))
}

fn unauthorized() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "invalid_credentials" })),
    )
}

fn to_response(err: ServiceError) -> (StatusCode, Json<serde_json::Value>) {
    (
        err.status_code(),
        Json(serde_json::json!({ "error": err.public_message() })),
    )
}
