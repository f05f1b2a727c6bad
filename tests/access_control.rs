use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;
use sqlx::PgPool;
use stockroom::domain::models::Role;
use uuid::Uuid;

#[path = "test_harness.rs"]
mod test_harness;

use test_harness::{cleanup_items, cleanup_users, run_test, seed_user, send, test_app, token_for, unique};

#[tokio::test]
async fn role_gate_login_and_supplier_references() -> Result<()> {
    run_test(run_scenario).await
}

async fn run_scenario(pool: PgPool) -> Result<()> {
    let app = test_app(pool.clone());
    let admin = seed_user(&pool, Role::Admin).await?;
    let manager = seed_user(&pool, Role::Manager).await?;
    let staff = seed_user(&pool, Role::Staff).await?;
    let shop = seed_user(&pool, Role::Ecommerce).await?;
    let admin_token = token_for(&app, &admin)?;
    let manager_token = token_for(&app, &manager)?;
    let staff_token = token_for(&app, &staff)?;
    let shop_token = token_for(&app, &shop)?;

    let (status, _) = send(&app, Method::GET, "/api/items", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, Method::GET, "/api/items", Some("not-a-token"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/sales",
        Some(&shop_token),
        Some(json!({ "itemId": Uuid::new_v4(), "quantitySold": 1 })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::GET, "/api/reports/revenue", Some(&staff_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::GET, "/api/users", Some(&manager_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/reports/revenue?from=1990-01-01&to=1990-01-31",
        Some(&admin_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revenue"]["totalRevenue"], json!(0.0));
    assert_eq!(body["revenue"]["totalQuantity"], json!(0));
    assert_eq!(body["revenue"]["orderCount"], json!(0));
    assert_eq!(body["revenue"]["averageOrderValue"], json!(0.0));

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/reports/revenue?from=2024-02-01&to=2024-01-01",
        Some(&admin_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": staff.username, "password": "correct horse battery" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], json!("staff"));
    assert!(body["user"].get("passwordHash").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": staff.username, "password": "wrong" })),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "invalid_credentials" }));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/suppliers",
        Some(&manager_token),
        Some(json!({ "name": unique("Acme"), "email": "orders@acme.example" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let supplier_id: Uuid = serde_json::from_value(body["supplier"]["id"].clone())?;
    let supplier_uri = format!("/api/suppliers/{supplier_id}");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/items",
        Some(&manager_token),
        Some(json!({
            "name": unique("Bolt"),
            "category": "Hardware",
            "price": 0.25,
            "supplierId": supplier_id
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let item_id: Uuid = serde_json::from_value(body["item"]["id"].clone())?;

    let (status, body) = send(&app, Method::DELETE, &supplier_uri, Some(&manager_token), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap_or_default().contains("1 item"));

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/items/{item_id}"),
        Some(&manager_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &supplier_uri, Some(&manager_token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    cleanup_items(&pool, &[item_id]).await?;
    cleanup_users(&pool, &[admin.id, manager.id, staff.id, shop.id]).await?;
    Ok(())
}
