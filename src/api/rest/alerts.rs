use std::sync::Arc;

use axum::{extract::Extension, routing::post, Json, Router};

use crate::{
    domain::policy::Capability,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        alerts::{AlertKind, AlertService},
        errors::ServiceError,
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/low-stock/run", post(run_low_stock))
        .route("/daily-report/run", post(run_daily_report))
}

async fn run_low_stock(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    trigger(state, user, AlertKind::LowStock).await
}

async fn run_daily_report(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    trigger(state, user, AlertKind::DailyReport).await
}

async fn trigger(
    state: Arc<AppState>,
    user: AuthenticatedUser,
    kind: AlertKind,
) -> Result<Json<serde_json::Value>, ServiceError> {
    user.require(Capability::TriggerAlerts)?;
    let outcome = AlertService::new(state).trigger(kind).await?;
    Ok(Json(serde_json::json!({ "outcome": outcome })))
}
