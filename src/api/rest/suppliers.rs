use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::{
    api::rest::extract::{ApiJson, ApiPath},
    domain::policy::Capability,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        suppliers::{SupplierRequest, SupplierService},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route(
            "/:id",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
        .route("/:id/items", get(supplier_items))
}

async fn list_suppliers(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewInventory)?;
    let suppliers = SupplierService::new(state).list().await?;
    Ok(Json(serde_json::json!({ "suppliers": suppliers })))
}

async fn get_supplier(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewInventory)?;
    let supplier = SupplierService::new(state).get(id).await?;
    Ok(Json(serde_json::json!({ "supplier": supplier })))
}

async fn create_supplier(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<SupplierRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServiceError> {
    user.require(Capability::ManageSuppliers)?;
    let supplier = SupplierService::new(state).create(&user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "supplier": supplier })),
    ))
}

async fn update_supplier(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<SupplierRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ManageSuppliers)?;
    let supplier = SupplierService::new(state)
        .update(&user, id, payload)
        .await?;
    Ok(Json(serde_json::json!({ "supplier": supplier })))
}

async fn delete_supplier(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, ServiceError> {
    user.require(Capability::ManageSuppliers)?;
    SupplierService::new(state).delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn supplier_items(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewInventory)?;
    let items = SupplierService::new(state).items(id).await?;
    Ok(Json(serde_json::json!({ "items": items })))
}
