use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::models::{Role, User},
    infrastructure::{
        auth::{hash_password, verify_password, AuthenticatedUser},
        state::AppState,
    },
};

use super::{activity, errors::ServiceError};

const USER_COLUMNS: &str = "id, username, password_hash, role, active, created_at, updated_at";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 8, max = 256))]
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    pub role: Option<Role>,
    pub active: Option<bool>,
    #[validate(length(min = 8, max = 256))]
    pub password: Option<String>,
}

pub struct UserService {
    state: Arc<AppState>,
}

impl UserService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Checks credentials; unknown users, wrong passwords, and inactive
    /// accounts all come back as `Unauthenticated`.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, ServiceError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username.trim())
        .fetch_optional(&self.state.pool)
        .await?;

        match user {
            Some(user) if user.active && verify_password(password, &user.password_hash) => Ok(user),
            _ => Err(ServiceError::Unauthenticated),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<User, ServiceError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.state.pool)
            .await?
            .ok_or(ServiceError::NotFound("user"))
    }

    pub async fn list(&self) -> Result<Vec<User>, ServiceError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username"
        ))
        .fetch_all(&self.state.pool)
        .await?;
        Ok(users)
    }

    pub async fn create(
        &self,
        actor: &AuthenticatedUser,
        payload: CreateUserRequest,
    ) -> Result<User, ServiceError> {
        payload.validate()?;
        let password_hash = hash_password(&payload.password)?;
        let now = Utc::now();
        let mut tx = self.state.pool.begin().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, password_hash, role, active, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(payload.username.trim())
        .bind(password_hash)
        .bind(payload.role)
        .bind(payload.active.unwrap_or(true))
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "create",
            "user",
            Some(user.id),
            serde_json::json!({ "username": user.username, "role": user.role }),
        )
        .await?;
        tx.commit().await?;
        Ok(user)
    }

    pub async fn update(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: UpdateUserRequest,
    ) -> Result<User, ServiceError> {
        payload.validate()?;
        if id == actor.user_id && payload.active == Some(false) {
            return Err(ServiceError::Validation(
                "you cannot deactivate your own account".to_string(),
            ));
        }
        let password_hash = payload.password.as_deref().map(hash_password).transpose()?;

        let mut tx = self.state.pool.begin().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET role = COALESCE($1, role),
                 active = COALESCE($2, active),
                 password_hash = COALESCE($3, password_hash),
                 updated_at = $4
             WHERE id = $5
             RETURNING {USER_COLUMNS}"
        ))
        .bind(payload.role)
        .bind(payload.active)
        .bind(password_hash.as_ref())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::NotFound("user"))?;
        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "update",
            "user",
            Some(id),
            serde_json::json!({
                "role": payload.role,
                "active": payload.active,
                "passwordChanged": password_hash.is_some(),
            }),
        )
        .await?;
        tx.commit().await?;
        Ok(user)
    }

    pub async fn delete(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<(), ServiceError> {
        if id == actor.user_id {
            return Err(ServiceError::Validation(
                "you cannot delete your own account".to_string(),
            ));
        }
        let mut tx = self.state.pool.begin().await?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("user"));
        }
        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "delete",
            "user",
            Some(id),
            serde_json::Value::Null,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Creates the configured bootstrap admin when the users table is empty.
pub async fn ensure_bootstrap_admin(state: &AppState) -> Result<bool, ServiceError> {
    let (Some(username), Some(password)) = (
        state.config.auth.bootstrap_admin_username.as_deref(),
        state.config.auth.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(false);
    };

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM users")
        .fetch_one(&state.pool)
        .await?;
    if existing > 0 {
        return Ok(false);
    }

    let now = Utc::now();
    sqlx::query(
        "INSERT INTO users (id, username, password_hash, role, active, created_at, updated_at)
         VALUES ($1,$2,$3,$4,TRUE,$5,$5)
         ON CONFLICT (username) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(username.trim())
    .bind(hash_password(password)?)
    .bind(Role::Admin)
    .bind(now)
    .execute(&state.pool)
    .await?;
    info!(%username, "bootstrap admin account created");
    Ok(true)
}
