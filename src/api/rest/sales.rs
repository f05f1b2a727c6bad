use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::{
    api::rest::extract::{ApiJson, ApiPath, ApiQuery},
    domain::policy::Capability,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        sales::{RangeQuery, RecordSaleRequest, SaleFilter, SaleService},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_sales).post(record_sale))
        .route("/summary/users", get(sales_by_user))
        .route("/:id", get(get_sale))
}

async fn record_sale(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<RecordSaleRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServiceError> {
    user.require(Capability::RecordSales)?;
    let receipt = SaleService::new(state).record(&user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "sale": receipt.sale, "item": receipt.item })),
    ))
}

async fn list_sales(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(filter): ApiQuery<SaleFilter>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewSales)?;
    let sales = SaleService::new(state).list(filter).await?;
    Ok(Json(serde_json::json!({ "sales": sales })))
}

async fn get_sale(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewSales)?;
    let sale = SaleService::new(state).get(id).await?;
    Ok(Json(serde_json::json!({ "sale": sale })))
}

async fn sales_by_user(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewReports)?;
    let report = SaleService::new(state).by_user(query).await?;
    Ok(Json(serde_json::json!({ "summary": report })))
}
