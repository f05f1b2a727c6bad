use axum::{
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::{
    api::rest::{
        activity::router as activity_router, alerts::router as alerts_router,
        auth::router as auth_router, items::router as items_router,
        orders::router as orders_router, recipients::router as recipients_router,
        reports::router as reports_router, sales::router as sales_router,
        storefront::router as storefront_router, suppliers::router as suppliers_router,
        users::router as users_router,
    },
    services::export::CSV_CONTENT_TYPE,
};

pub mod activity;
pub mod alerts;
pub mod auth;
pub mod extract;
pub mod health;
pub mod items;
pub mod orders;
pub mod recipients;
pub mod reports;
pub mod sales;
pub mod storefront;
pub mod suppliers;
pub mod users;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health::healthcheck))
        .nest("/auth", auth_router())
        .nest("/items", items_router())
        .nest("/suppliers", suppliers_router())
        .nest("/sales", sales_router())
        .nest("/orders", orders_router())
        .nest("/reports", reports_router())
        .nest("/users", users_router())
        .nest("/recipients", recipients_router())
        .nest("/alerts", alerts_router())
        .nest("/activity", activity_router())
        .nest("/store", storefront_router())
}

/// CSV download with an attachment filename.
pub(crate) fn csv_response(filename: &str, body: String) -> Response {
    (
        [
            (CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}
