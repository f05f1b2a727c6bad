use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::Response,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use super::csv_response;
use crate::{
    api::rest::extract::{ApiJson, ApiPath, ApiQuery},
    domain::policy::Capability,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        items::{AdjustStockRequest, CreateItemRequest, ItemFilter, ItemService, UpdateItemRequest},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/export", get(export_items))
        .route("/import", post(import_items))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
        .route("/:id/adjust-stock", patch(adjust_stock))
}

async fn list_items(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(filter): ApiQuery<ItemFilter>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewInventory)?;
    let items = ItemService::new(state).list(filter).await?;
    Ok(Json(serde_json::json!({ "items": items })))
}

async fn get_item(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewInventory)?;
    let item = ItemService::new(state).get(id).await?;
    Ok(Json(serde_json::json!({ "item": item })))
}

async fn create_item(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<CreateItemRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServiceError> {
    user.require(Capability::ManageItems)?;
    let item = ItemService::new(state).create(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "item": item }))))
}

async fn update_item(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateItemRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ManageItems)?;
    let item = ItemService::new(state).update(&user, id, payload).await?;
    Ok(Json(serde_json::json!({ "item": item })))
}

async fn delete_item(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ServiceError> {
    user.require(Capability::ManageItems)?;
    ItemService::new(state).delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn adjust_stock(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AdjustStockRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::AdjustStock)?;
    let item = ItemService::new(state)
        .adjust_stock(&user, id, payload)
        .await?;
    Ok(Json(serde_json::json!({ "item": item })))
}

async fn export_items(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(filter): ApiQuery<ItemFilter>,
) -> Result<Response, ServiceError> {
    user.require(Capability::ViewInventory)?;
    let body = ItemService::new(state).export_csv(filter).await?;
    let filename = format!("inventory-{}.csv", Utc::now().format("%Y-%m-%d"));
    Ok(csv_response(&filename, body))
}

async fn import_items(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    body: String,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ManageItems)?;
    let summary = ItemService::new(state).import_csv(&user, &body).await?;
    Ok(Json(serde_json::json!({ "import": summary })))
}
