use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    api::rest::extract::ApiQuery,
    domain::policy::Capability,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        activity::{ActivityFilter, ActivityService},
        errors::ServiceError,
    },
};

pub fn router() -> Router {
    Router::new().route("/", get(list_activity).delete(purge_activity))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurgeQuery {
    older_than_days: Option<i64>,
}

async fn list_activity(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(filter): ApiQuery<ActivityFilter>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewActivity)?;
    let logs = ActivityService::new(state).list(filter).await?;
    Ok(Json(serde_json::json!({ "activity": logs })))
}

async fn purge_activity(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<PurgeQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewActivity)?;
    let older_than_days = query.older_than_days.ok_or_else(|| {
        ServiceError::Validation("olderThanDays query parameter is required".to_string())
    })?;
    let deleted = ActivityService::new(state)
        .purge(user.user_id, older_than_days)
        .await?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
