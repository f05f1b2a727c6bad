use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::models::Recipient,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::{activity, errors::ServiceError};

const RECIPIENT_COLUMNS: &str = "id, email, name, low_stock, daily_report, active, created_at";

/// Which alert a recipient list is being built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    LowStock,
    DailyReport,
}

impl Subscription {
    fn column(self) -> &'static str {
        match self {
            Subscription::LowStock => "low_stock",
            Subscription::DailyReport => "daily_report",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecipientRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 200))]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub low_stock: bool,
    #[serde(default = "default_true")]
    pub daily_report: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecipientRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub name: Option<Option<String>>,
    pub low_stock: Option<bool>,
    pub daily_report: Option<bool>,
    pub active: Option<bool>,
}

pub struct RecipientService {
    state: Arc<AppState>,
}

impl RecipientService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list(&self) -> Result<Vec<Recipient>, ServiceError> {
        let recipients = sqlx::query_as::<_, Recipient>(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM recipients ORDER BY email"
        ))
        .fetch_all(&self.state.pool)
        .await?;
        Ok(recipients)
    }

    /// Active recipients subscribed to `subscription`.
    pub async fn subscribed(&self, subscription: Subscription) -> Result<Vec<String>, ServiceError> {
        let emails = sqlx::query_scalar::<_, String>(&format!(
            "SELECT email FROM recipients WHERE active AND {} ORDER BY email",
            subscription.column()
        ))
        .fetch_all(&self.state.pool)
        .await?;
        Ok(emails)
    }

    pub async fn create(
        &self,
        actor: &AuthenticatedUser,
        payload: CreateRecipientRequest,
    ) -> Result<Recipient, ServiceError> {
        payload.validate()?;
        let mut tx = self.state.pool.begin().await?;
        let recipient = sqlx::query_as::<_, Recipient>(&format!(
            "INSERT INTO recipients (id, email, name, low_stock, daily_report, active, created_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7)
             RETURNING {RECIPIENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(payload.email.trim().to_lowercase())
        .bind(payload.name)
        .bind(payload.low_stock)
        .bind(payload.daily_report)
        .bind(payload.active)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "create",
            "recipient",
            Some(recipient.id),
            serde_json::json!({ "email": recipient.email }),
        )
        .await?;
        tx.commit().await?;
        Ok(recipient)
    }

    pub async fn update(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: UpdateRecipientRequest,
    ) -> Result<Recipient, ServiceError> {
        payload.validate()?;
        let mut tx = self.state.pool.begin().await?;
        let mut recipient = sqlx::query_as::<_, Recipient>(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::NotFound("recipient"))?;

        if let Some(email) = payload.email {
            recipient.email = email.trim().to_lowercase();
        }
        if let Some(name) = payload.name {
            recipient.name = name;
        }
        if let Some(low_stock) = payload.low_stock {
            recipient.low_stock = low_stock;
        }
        if let Some(daily_report) = payload.daily_report {
            recipient.daily_report = daily_report;
        }
        if let Some(active) = payload.active {
            recipient.active = active;
        }

        let recipient = sqlx::query_as::<_, Recipient>(&format!(
            "UPDATE recipients
             SET email = $1, name = $2, low_stock = $3, daily_report = $4, active = $5
             WHERE id = $6
             RETURNING {RECIPIENT_COLUMNS}"
        ))
        .bind(&recipient.email)
        .bind(&recipient.name)
        .bind(recipient.low_stock)
        .bind(recipient.daily_report)
        .bind(recipient.active)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "update",
            "recipient",
            Some(id),
            serde_json::json!({ "email": recipient.email, "active": recipient.active }),
        )
        .await?;
        tx.commit().await?;
        Ok(recipient)
    }

    pub async fn delete(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.state.pool.begin().await?;
        let email = sqlx::query_scalar::<_, String>("DELETE FROM recipients WHERE id = $1 RETURNING email")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::NotFound("recipient"))?;
        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "delete",
            "recipient",
            Some(id),
            serde_json::json!({ "email": email }),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriptions_default_to_enabled() {
        let payload: CreateRecipientRequest =
            serde_json::from_value(serde_json::json!({ "email": "ops@example.com" })).unwrap();
        assert!(payload.low_stock && payload.daily_report && payload.active);
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn invalid_email_is_rejected() {
        let payload: CreateRecipientRequest =
            serde_json::from_value(serde_json::json!({ "email": "not-an-address" })).unwrap();
        assert!(payload.validate().is_err());
    }
}
