//! Public storefront routes. No token is required.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    api::rest::extract::{ApiJson, ApiPath, ApiQuery},
    infrastructure::state::AppState,
    services::{
        errors::ServiceError,
        orders::{OrderService, PlaceOrderRequest, ProductFilter},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
        .route("/orders", post(place_order))
        .route("/orders/:reference", get(order_status))
}

async fn list_products(
    Extension(state): Extension<Arc<AppState>>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let products = OrderService::new(state).products(filter).await?;
    Ok(Json(serde_json::json!({ "products": products })))
}

async fn get_product(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let product = OrderService::new(state).product(id).await?;
    Ok(Json(serde_json::json!({ "product": product })))
}

async fn place_order(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServiceError> {
    let order = OrderService::new(state).place(payload).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "order": order }))))
}

async fn order_status(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(reference): ApiPath<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let order = OrderService::new(state).status(&reference).await?;
    Ok(Json(serde_json::json!({ "order": order })))
}
