use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;
use sqlx::PgPool;
use stockroom::domain::models::Role;
use uuid::Uuid;

#[path = "test_harness.rs"]
mod test_harness;

use test_harness::{
    cleanup_items, cleanup_users, run_test, seed_user, send, test_app, token_for, unique, TestApp,
};

#[tokio::test]
async fn orders_are_all_or_nothing() -> Result<()> {
    run_test(run_scenario).await
}

async fn create_item(
    app: &TestApp,
    token: &str,
    quantity: i32,
    price: f64,
    public: bool,
) -> Result<Uuid> {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/items",
        Some(token),
        Some(json!({
            "name": unique("Mug"),
            "category": "Kitchen",
            "quantity": quantity,
            "price": price,
            "ecommerceEnabled": true,
            "isPublic": public
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    Ok(serde_json::from_value(body["item"]["id"].clone())?)
}

async fn quantity(pool: &PgPool, id: Uuid) -> Result<i32> {
    Ok(sqlx::query_scalar("SELECT quantity FROM items WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await?)
}

async fn run_scenario(pool: PgPool) -> Result<()> {
    let app = test_app(pool.clone());
    let manager = seed_user(&pool, Role::Manager).await?;
    let shop = seed_user(&pool, Role::Ecommerce).await?;
    let manager_token = token_for(&app, &manager)?;
    let shop_token = token_for(&app, &shop)?;

    let plenty = create_item(&app, &manager_token, 5, 4.50, true).await?;
    let scarce = create_item(&app, &manager_token, 1, 3.00, true).await?;
    let hidden = create_item(&app, &manager_token, 9, 1.00, false).await?;

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/store/products/{hidden}"),
        None,
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/store/products/{plenty}"),
        None,
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["product"]["price"], json!(4.5));
    assert_eq!(body["product"]["inStock"], json!(true));

    let customer = json!({
        "customerName": "Ada Lovelace",
        "customerEmail": "ada@example.com",
        "shippingAddress": "12 Analytical Row"
    });

    let mut short_order = customer.clone();
    short_order["items"] = json!([
        { "itemId": plenty, "quantity": 2 },
        { "itemId": scarce, "quantity": 3 }
    ]);
    let (status, _) = send(&app, Method::POST, "/api/store/orders", None, Some(short_order)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(quantity(&pool, plenty).await?, 5);
    assert_eq!(quantity(&pool, scarce).await?, 1);
    let sales: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM sales WHERE item_id = ANY($1)")
        .bind(&[plenty, scarce][..])
        .fetch_one(&pool)
        .await?;
    assert_eq!(sales, 0);

    let mut hidden_order = customer.clone();
    hidden_order["items"] = json!([{ "itemId": hidden, "quantity": 1 }]);
    let (status, _) = send(&app, Method::POST, "/api/store/orders", None, Some(hidden_order)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(quantity(&pool, hidden).await?, 9);

    let mut order = customer.clone();
    order["items"] = json!([
        { "itemId": plenty, "quantity": 1 },
        { "itemId": scarce, "quantity": 1 },
        { "itemId": plenty, "quantity": 1 }
    ]);
    let (status, body) = send(&app, Method::POST, "/api/store/orders", None, Some(order)).await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["order"]["status"], json!("pending"));
    assert_eq!(body["order"]["total"], json!(12.0));
    assert_eq!(body["order"]["lines"].as_array().map(Vec::len), Some(2));
    assert_eq!(quantity(&pool, plenty).await?, 3);
    assert_eq!(quantity(&pool, scarce).await?, 0);

    let reference = body["order"]["reference"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let status_uri = format!("/api/orders/{reference}/status");

    let (status, _) = send(
        &app,
        Method::PATCH,
        &status_uri,
        Some(&shop_token),
        Some(json!({ "status": "lost" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &status_uri,
        Some(&shop_token),
        Some(json!({ "status": "shipped" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], json!("shipped"));

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/store/orders/{reference}"),
        None,
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], json!("shipped"));

    let (status, _) = send(&app, Method::GET, "/api/store/orders/ORD-MISSING", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    cleanup_items(&pool, &[plenty, scarce, hidden]).await?;
    cleanup_users(&pool, &[manager.id, shop.id]).await?;
    Ok(())
}

#[tokio::test]
async fn product_search_treats_wildcards_literally() -> Result<()> {
    run_test(run_search).await
}

async fn run_search(pool: PgPool) -> Result<()> {
    let app = test_app(pool.clone());
    let manager = seed_user(&pool, Role::Manager).await?;
    let token = token_for(&app, &manager)?;
    let mug = create_item(&app, &token, 3, 2.00, true).await?;

    let listed = |body: &serde_json::Value| {
        body["products"]
            .as_array()
            .map(|products| products.iter().any(|p| p["id"] == json!(mug)))
            .unwrap_or(false)
    };

    let (status, body) = send(&app, Method::GET, "/api/store/products?search=mug", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(listed(&body));

    for wildcard in ["_", "%25", "M_g"] {
        let uri = format!("/api/store/products?search={wildcard}");
        let (status, body) = send(&app, Method::GET, &uri, None, None).await?;
        assert_eq!(status, StatusCode::OK);
        assert!(!listed(&body), "{uri} matched as a wildcard");
    }

    cleanup_items(&pool, &[mug]).await?;
    cleanup_users(&pool, &[manager.id]).await?;
    Ok(())
}
