//! `Json`, `Path` and `Query` wrappers whose rejections are [`ServiceError`]s,
//! so malformed input gets the same `{"error": ..}` body as every other
//! failure.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
};

use crate::services::errors::ServiceError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ServiceError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServiceError))]
pub struct ApiQuery<T>(pub T);

fn rejected(status: StatusCode, detail: String) -> ServiceError {
    if status.is_server_error() {
        ServiceError::Internal(detail)
    } else {
        ServiceError::Validation(detail)
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        rejected(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ServiceError {
    fn from(rejection: PathRejection) -> Self {
        rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        rejected(rejection.status(), rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_rejections_become_validation_errors() {
        let err = rejected(StatusCode::UNPROCESSABLE_ENTITY, "unknown variant".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "validation error: unknown variant");
    }

    #[test]
    fn server_side_rejections_stay_internal() {
        let err = rejected(StatusCode::INTERNAL_SERVER_ERROR, "missing params".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "internal error");
    }
}
