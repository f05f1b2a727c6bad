use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::models::{Item, ItemView, Supplier},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::{activity, errors::ServiceError, items::ITEM_COLUMNS};

const SUPPLIER_COLUMNS: &str =
    "id, name, contact_name, email, phone, address, products, created_at, updated_at";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SupplierRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub products: Option<String>,
}

pub struct SupplierService {
    state: Arc<AppState>,
}

impl SupplierService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list(&self) -> Result<Vec<Supplier>, ServiceError> {
        let suppliers = sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers ORDER BY name"
        ))
        .fetch_all(&self.state.pool)
        .await?;
        Ok(suppliers)
    }

    pub async fn get(&self, id: Uuid) -> Result<Supplier, ServiceError> {
        sqlx::query_as::<_, Supplier>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound("supplier"))
    }

    pub async fn create(
        &self,
        actor: &AuthenticatedUser,
        payload: SupplierRequest,
    ) -> Result<Supplier, ServiceError> {
        payload.validate()?;
        let now = Utc::now();
        let mut tx = self.state.pool.begin().await?;
        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            "INSERT INTO suppliers (id, name, contact_name, email, phone, address, products, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8)
             RETURNING {SUPPLIER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(payload.name.trim())
        .bind(payload.contact_name)
        .bind(payload.email)
        .bind(payload.phone)
        .bind(payload.address)
        .bind(payload.products)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "create",
            "supplier",
            Some(supplier.id),
            serde_json::json!({ "name": supplier.name }),
        )
        .await?;
        tx.commit().await?;
        Ok(supplier)
    }

    pub async fn update(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: SupplierRequest,
    ) -> Result<Supplier, ServiceError> {
        payload.validate()?;
        let mut tx = self.state.pool.begin().await?;
        let supplier = sqlx::query_as::<_, Supplier>(&format!(
            "UPDATE suppliers
             SET name = $1, contact_name = $2, email = $3, phone = $4, address = $5,
                 products = $6, updated_at = $7
             WHERE id = $8
             RETURNING {SUPPLIER_COLUMNS}"
        ))
        .bind(payload.name.trim())
        .bind(payload.contact_name)
        .bind(payload.email)
        .bind(payload.phone)
        .bind(payload.address)
        .bind(payload.products)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::NotFound("supplier"))?;
        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "update",
            "supplier",
            Some(id),
            serde_json::json!({ "name": supplier.name }),
        )
        .await?;
        tx.commit().await?;
        Ok(supplier)
    }

    /// Refuses while any item still references the supplier.
    pub async fn delete(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.state.pool.begin().await?;
        let referencing =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM items WHERE supplier_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if referencing > 0 {
            return Err(ServiceError::Conflict(format!(
                "supplier is referenced by {referencing} item(s)"
            )));
        }
        let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("supplier"));
        }
        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "delete",
            "supplier",
            Some(id),
            serde_json::Value::Null,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn items(&self, id: Uuid) -> Result<Vec<ItemView>, ServiceError> {
        self.get(id).await?;
        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE supplier_id = $1 ORDER BY name"
        ))
        .bind(id)
        .fetch_all(&self.state.pool)
        .await?;
        let now = Utc::now();
        Ok(items.iter().map(|item| item.view(now)).collect())
    }
}
