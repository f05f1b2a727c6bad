use anyhow::Result;
use axum::http::{Method, StatusCode};
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::PgPool;
use stockroom::domain::models::Role;
use uuid::Uuid;

#[path = "test_harness.rs"]
mod test_harness;

use test_harness::{cleanup_items, cleanup_users, run_test, seed_user, send, test_app, token_for, unique};

#[tokio::test]
async fn low_stock_alert_continues_past_failed_recipient() -> Result<()> {
    run_test(run_scenario).await
}

async fn insert_recipient(pool: &PgPool, email: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO recipients (id, email, name, low_stock, daily_report, active, created_at)
         VALUES ($1,$2,NULL,TRUE,TRUE,TRUE,$3)",
    )
    .bind(id)
    .bind(email)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(id)
}

async fn run_scenario(pool: PgPool) -> Result<()> {
    let app = test_app(pool.clone());
    let manager = seed_user(&pool, Role::Manager).await?;
    let staff = seed_user(&pool, Role::Staff).await?;
    let manager_token = token_for(&app, &manager)?;
    let staff_token = token_for(&app, &staff)?;

    let item_name = unique("Flour");
    let item_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO items (id, name, category, quantity, reorder_level, price_cents)
         VALUES ($1,$2,'Baking',1,10,349)",
    )
    .bind(item_id)
    .bind(&item_name)
    .execute(&pool)
    .await?;

    let good = format!("{}@example.com", Uuid::new_v4().simple());
    let bad = format!("{}@example.com", Uuid::new_v4().simple());
    let recipient_ids = [
        insert_recipient(&pool, &good).await?,
        insert_recipient(&pool, &bad).await?,
    ];
    app.mailer.reject(&bad);

    let (status, _) = send(&app, Method::POST, "/api/alerts/low-stock/run", Some(&staff_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/alerts/low-stock/run",
        Some(&manager_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    let outcome = &body["outcome"];
    let recipients: Vec<&str> = outcome["recipients"]
        .as_array()
        .map(|list| list.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    assert!(recipients.contains(&good.as_str()));
    assert!(recipients.contains(&bad.as_str()));
    assert!(outcome["failed"]
        .as_array()
        .map(|failed| failed.iter().any(|f| f["recipient"] == json!(bad)))
        .unwrap_or(false));

    let sent = app.mailer.sent();
    let delivered = sent
        .iter()
        .find(|email| email.to == good)
        .expect("good recipient received the alert");
    assert!(delivered.body.contains(&item_name));
    assert!(!sent.iter().any(|email| email.to == bad));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/alerts/daily-report/run",
        Some(&manager_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    let report = app
        .mailer
        .sent()
        .into_iter()
        .find(|email| email.to == good && email.subject.starts_with("Daily inventory report"))
        .expect("daily report delivered");
    assert_eq!(report.attachments.len(), 1);
    assert!(report.attachments[0].filename.starts_with("inventory-"));
    assert!(String::from_utf8_lossy(&report.attachments[0].data).contains(&item_name));

    sqlx::query("DELETE FROM recipients WHERE id = ANY($1)")
        .bind(&recipient_ids[..])
        .execute(&pool)
        .await?;
    cleanup_items(&pool, &[item_id]).await?;
    cleanup_users(&pool, &[manager.id, staff.id]).await?;
    Ok(())
}
