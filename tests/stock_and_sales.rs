use anyhow::Result;
use axum::http::{Method, StatusCode};
use futures::future::join_all;
use serde_json::{json, Value};
use sqlx::PgPool;
use stockroom::domain::models::Role;
use uuid::Uuid;

#[path = "test_harness.rs"]
mod test_harness;

use test_harness::{cleanup_items, cleanup_users, run_test, seed_user, send, test_app, token_for, unique};

#[tokio::test]
async fn sales_and_adjustments_keep_quantity_consistent() -> Result<()> {
    run_test(run_scenario).await
}

async fn run_scenario(pool: PgPool) -> Result<()> {
    let app = test_app(pool.clone());
    let manager = seed_user(&pool, Role::Manager).await?;
    let staff = seed_user(&pool, Role::Staff).await?;
    let manager_token = token_for(&app, &manager)?;
    let staff_token = token_for(&app, &staff)?;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/items",
        Some(&manager_token),
        Some(json!({
            "name": unique("Widget"),
            "category": "Hardware",
            "quantity": 10,
            "reorderLevel": 5,
            "price": 2.00
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let item_id: Uuid = serde_json::from_value(body["item"]["id"].clone())?;
    let item_uri = format!("/api/items/{item_id}");
    let adjust_uri = format!("/api/items/{item_id}/adjust-stock");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/sales",
        Some(&staff_token),
        Some(json!({ "itemId": item_id, "quantitySold": 3 })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sale"]["totalAmount"], json!(6.0));
    assert_eq!(body["item"]["quantity"], json!(7));
    assert_eq!(body["item"]["lowStock"], json!(false));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/sales",
        Some(&staff_token),
        Some(json!({ "itemId": item_id, "quantitySold": 12 })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .contains("insufficient stock"));

    let (_, body) = send(&app, Method::GET, &item_uri, Some(&staff_token), None).await?;
    assert_eq!(body["item"]["quantity"], json!(7));
    let sales: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM sales WHERE item_id = $1")
        .bind(item_id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(sales, 1);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/sales",
        Some(&staff_token),
        Some(json!({ "itemId": item_id, "quantitySold": "abc" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &adjust_uri,
        Some(&staff_token),
        Some(json!({ "amount": 2, "operation": "decrease" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["quantity"], json!(5));
    assert_eq!(body["item"]["lowStock"], json!(false));

    let (_, body) = send(
        &app,
        Method::PATCH,
        &adjust_uri,
        Some(&staff_token),
        Some(json!({ "amount": 1.9, "operation": "decrease" })),
    )
    .await?;
    assert_eq!(body["item"]["quantity"], json!(4));
    assert_eq!(body["item"]["lowStock"], json!(true));

    let (status, _) = send(
        &app,
        Method::PATCH,
        &adjust_uri,
        Some(&staff_token),
        Some(json!({ "amount": 10, "operation": "decrease" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, body) = send(&app, Method::GET, &item_uri, Some(&staff_token), None).await?;
    assert_eq!(body["item"]["quantity"], json!(4));

    let (status, _) = send(
        &app,
        Method::PATCH,
        &adjust_uri,
        Some(&staff_token),
        Some(json!({ "amount": 0, "operation": "increase" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for (amount, expected) in [(json!(0), 0), (json!("12"), 12)] {
        let (status, body) = send(
            &app,
            Method::PATCH,
            &adjust_uri,
            Some(&staff_token),
            Some(json!({ "amount": amount, "operation": "set" })),
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item"]["quantity"], json!(expected));
    }

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/sales?itemId={item_id}"),
        Some(&staff_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let listed = body["sales"].as_array().cloned().unwrap_or_default();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["quantitySold"], json!(3));
    assert_eq!(listed[0]["soldByUsername"], Value::String(staff.username.clone()));

    let (status, _) = send(&app, Method::DELETE, &item_uri, Some(&manager_token), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    cleanup_items(&pool, &[item_id]).await?;
    cleanup_users(&pool, &[manager.id, staff.id]).await?;
    Ok(())
}

#[tokio::test]
async fn concurrent_sales_never_oversell() -> Result<()> {
    run_test(run_concurrent_sales).await
}

async fn run_concurrent_sales(pool: PgPool) -> Result<()> {
    let app = test_app(pool.clone());
    let manager = seed_user(&pool, Role::Manager).await?;
    let token = token_for(&app, &manager)?;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/items",
        Some(&token),
        Some(json!({
            "name": unique("Contended"),
            "category": "Hardware",
            "quantity": 5,
            "reorderLevel": 1,
            "price": 1.50
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let item_id: Uuid = serde_json::from_value(body["item"]["id"].clone())?;

    let attempts = (0..10).map(|_| {
        send(
            &app,
            Method::POST,
            "/api/sales",
            Some(&token),
            Some(json!({ "itemId": item_id, "quantitySold": 1 })),
        )
    });
    let responses = join_all(attempts)
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let sold = responses
        .iter()
        .filter(|(status, _)| *status == StatusCode::CREATED)
        .count();
    let refused: Vec<&Value> = responses
        .iter()
        .filter(|(status, _)| *status == StatusCode::BAD_REQUEST)
        .map(|(_, body)| body)
        .collect();
    assert_eq!(sold, 5);
    assert_eq!(refused.len(), 5);
    assert!(refused.iter().all(|body| body["error"]
        .as_str()
        .unwrap_or_default()
        .contains("insufficient stock")));

    let quantity: i32 = sqlx::query_scalar("SELECT quantity FROM items WHERE id = $1")
        .bind(item_id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(quantity, 0);
    let sales: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM sales WHERE item_id = $1")
        .bind(item_id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(sales, 5);

    cleanup_items(&pool, &[item_id]).await?;
    cleanup_users(&pool, &[manager.id]).await?;
    Ok(())
}
