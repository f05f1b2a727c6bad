use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use stockroom::domain::models::Role;
use uuid::Uuid;

#[path = "test_harness.rs"]
mod test_harness;

use test_harness::{offline_app, offline_user, send, token_for};

fn validation_message(body: &Value) -> &str {
    body["error"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn malformed_input_is_a_json_validation_error() -> Result<()> {
    let app = offline_app()?;
    let staff = offline_user(Role::Staff);
    let token = token_for(&app, &staff)?;
    let item_id = Uuid::new_v4();

    let cases = [
        (
            Method::PATCH,
            format!("/api/items/{item_id}/adjust-stock"),
            Some(json!({ "amount": 3, "operation": "multiply" })),
        ),
        (
            Method::POST,
            "/api/sales".to_string(),
            Some(json!({ "itemId": "not-a-uuid", "quantitySold": 1 })),
        ),
        (
            Method::PATCH,
            "/api/items/xyz/adjust-stock".to_string(),
            Some(json!({ "amount": 1, "operation": "increase" })),
        ),
        (Method::GET, "/api/sales?itemId=nope".to_string(), None),
        (Method::GET, "/api/store/products/42".to_string(), None),
    ];

    for (method, uri, body) in cases {
        let (status, response) = send(&app, method, &uri, Some(&token), body).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}: {response}");
        assert!(
            validation_message(&response).starts_with("validation error"),
            "{uri}: {response}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn purge_rejects_unrepresentable_retention() -> Result<()> {
    let app = offline_app()?;
    let admin = offline_user(Role::Admin);
    let token = token_for(&app, &admin)?;

    for uri in [
        "/api/activity?olderThanDays=9000000000000",
        "/api/activity?olderThanDays=0",
        "/api/activity?olderThanDays=soon",
    ] {
        let (status, response) = send(&app, Method::DELETE, uri, Some(&token), None).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}: {response}");
        assert!(
            validation_message(&response).starts_with("validation error"),
            "{uri}: {response}"
        );
    }
    Ok(())
}
