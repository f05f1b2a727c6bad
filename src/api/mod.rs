use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method, StatusCode},
    Json, Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use self::rest::router as rest_router;

pub mod rest;

use crate::infrastructure::config::Config;

pub fn build_router(config: Arc<Config>) -> Router {
    Router::new()
        .nest("/api", rest_router())
        .fallback(not_found)
        .layer(cors_layer(config.as_ref()))
        .layer(TraceLayer::new_for_http())
}

pub async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "not_found"})),
    )
}

/// `"*"` in `app.cors_origins` opens the API to any origin; otherwise only
/// the listed origins are allowed.
fn cors_layer(config: &Config) -> CorsLayer {
    let origins = &config.app.cors_origins;
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| warn!(%origin, "ignoring invalid CORS origin"))
                .ok()
        }))
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::list([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]))
}
