//! Append-only audit trail of privileged actions.
//!
//! Writers call [`record`] on the same executor as the change being audited,
//! so a rolled-back transaction leaves no log entry behind.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{domain::models::ActivityLog, infrastructure::state::AppState};

use super::errors::ServiceError;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1_000;
const MAX_RETENTION_DAYS: i64 = 36_500;

pub async fn record<'e, E>(
    executor: E,
    actor: Option<Uuid>,
    action: &str,
    resource_type: &str,
    resource_id: Option<Uuid>,
    details: serde_json::Value,
) -> Result<(), ServiceError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO activity_logs (id, user_id, action, resource_type, resource_id, details, created_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7)",
    )
    .bind(Uuid::new_v4())
    .bind(actor)
    .bind(action)
    .bind(resource_type)
    .bind(resource_id)
    .bind(details)
    .bind(Utc::now())
    .execute(executor)
    .await?;
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFilter {
    pub user_id: Option<Uuid>,
    pub resource_type: Option<String>,
    pub limit: Option<i64>,
}

pub struct ActivityService {
    state: Arc<AppState>,
}

impl ActivityService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Most recent entries first.
    pub async fn list(&self, filter: ActivityFilter) -> Result<Vec<ActivityLog>, ServiceError> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let logs = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, user_id, action, resource_type, resource_id, details, created_at
            FROM activity_logs
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR resource_type = $2)
            ORDER BY created_at DESC, id
            LIMIT $3
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.resource_type)
        .bind(limit)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(logs)
    }

    /// Deletes entries older than `older_than_days` and returns how many went.
    pub async fn purge(&self, actor: Uuid, older_than_days: i64) -> Result<u64, ServiceError> {
        let cutoff = purge_cutoff(Utc::now(), older_than_days)?;
        let mut tx = self.state.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM activity_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        record(
            &mut *tx,
            Some(actor),
            "purge",
            "activity_log",
            None,
            serde_json::json!({ "olderThanDays": older_than_days, "deleted": deleted }),
        )
        .await?;
        tx.commit().await?;
        Ok(deleted)
    }
}

fn purge_cutoff(now: DateTime<Utc>, older_than_days: i64) -> Result<DateTime<Utc>, ServiceError> {
    if !(1..=MAX_RETENTION_DAYS).contains(&older_than_days) {
        return Err(ServiceError::Validation(format!(
            "olderThanDays must be between 1 and {MAX_RETENTION_DAYS}"
        )));
    }
    Ok(now - Duration::days(older_than_days))
}
