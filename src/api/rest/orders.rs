use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::patch,
    Json, Router,
};

use crate::{
    api::rest::extract::{ApiJson, ApiPath},
    domain::policy::Capability,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        orders::{OrderService, UpdateOrderStatusRequest},
    },
};

pub fn router() -> Router {
    Router::new().route("/:reference/status", patch(update_status))
}

async fn update_status(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(reference): ApiPath<String>,
    ApiJson(payload): ApiJson<UpdateOrderStatusRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ManageOrders)?;
    let order = OrderService::new(state)
        .update_status(&user, &reference, payload)
        .await?;
    Ok(Json(serde_json::json!({ "order": order })))
}
