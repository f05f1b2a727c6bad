use std::sync::Arc;

use axum::{
    extract::Extension,
    response::Response,
    routing::get,
    Json, Router,
};

use super::csv_response;
use crate::{
    api::rest::extract::ApiQuery,
    domain::policy::Capability,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        reports::{ReorderQuery, ReportService, SummaryQuery, TopProductsQuery},
        sales::RangeQuery,
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/low-stock", get(low_stock))
        .route("/sales-summary", get(sales_summary))
        .route("/revenue", get(revenue))
        .route("/categories", get(categories))
        .route("/suppliers", get(suppliers))
        .route("/top-products", get(top_products))
        .route("/inventory-value", get(inventory_value))
        .route("/reorder-suggestions", get(reorder_suggestions))
        .route("/export/sales", get(export_sales))
        .route("/export/low-stock", get(export_low_stock))
}

async fn low_stock(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewInventory)?;
    let items = ReportService::new(state).low_stock().await?;
    Ok(Json(serde_json::json!({ "items": items })))
}

async fn sales_summary(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewReports)?;
    let summary = ReportService::new(state).sales_summary(query).await?;
    Ok(Json(serde_json::json!({ "summary": summary })))
}

async fn revenue(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewReports)?;
    let revenue = ReportService::new(state).revenue(query).await?;
    Ok(Json(serde_json::json!({ "revenue": revenue })))
}

async fn categories(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewReports)?;
    let report = ReportService::new(state).categories(query).await?;
    Ok(Json(serde_json::json!({ "report": report })))
}

async fn suppliers(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewReports)?;
    let suppliers = ReportService::new(state).suppliers().await?;
    Ok(Json(serde_json::json!({ "suppliers": suppliers })))
}

async fn top_products(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<TopProductsQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewReports)?;
    let report = ReportService::new(state).top_products(query).await?;
    Ok(Json(serde_json::json!({ "report": report })))
}

async fn inventory_value(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewReports)?;
    let value = ReportService::new(state).inventory_value().await?;
    Ok(Json(serde_json::json!({ "inventory": value })))
}

async fn reorder_suggestions(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<ReorderQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::ViewReports)?;
    let report = ReportService::new(state).reorder_suggestions(query).await?;
    Ok(Json(serde_json::json!({ "report": report })))
}

async fn export_sales(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Response, ServiceError> {
    user.require(Capability::ViewReports)?;
    let export = ReportService::new(state).export_sales(query).await?;
    Ok(csv_response(&export.filename, export.body))
}

async fn export_low_stock(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    user.require(Capability::ViewReports)?;
    let export = ReportService::new(state).export_low_stock().await?;
    Ok(csv_response(&export.filename, export.body))
}
