use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::{
    domain::{reports::RangeError, stock::StockError},
    validation::rules::describe_errors,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { available: i32, requested: i32 },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Delivery(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if let ServiceError::Internal(detail) = &self {
            error!(error = %detail, "request failed");
        }
        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            let constraint = db_err.constraint().unwrap_or("constraint").to_string();
            match db_err.code().as_deref() {
                Some("23505") => return ServiceError::Conflict(duplicate_message(&constraint)),
                Some("23503") => {
                    return ServiceError::Conflict(format!("record is still referenced ({constraint})"))
                }
                Some("23514") => {
                    return ServiceError::Validation(format!("value violates {constraint}"))
                }
                Some("22003") => {
                    return ServiceError::Validation("numeric value out of range".to_string())
                }
                _ => {}
            }
        }
        ServiceError::Internal(err.to_string())
    }
}

fn duplicate_message(constraint: &str) -> String {
    // PostgreSQL names unique constraints `<table>_<column>_key`.
    let field = constraint
        .strip_suffix("_key")
        .and_then(|rest| rest.split_once('_').map(|(_, column)| column))
        .unwrap_or(constraint);
    format!("{field} already exists")
}

impl From<StockError> for ServiceError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::InvalidAmount(message) => ServiceError::Validation(message),
            StockError::Insufficient {
                available,
                requested,
            } => ServiceError::InsufficientStock {
                available,
                requested,
            },
        }
    }
}

impl From<RangeError> for ServiceError {
    fn from(err: RangeError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation(describe_errors(&errors))
    }
}
