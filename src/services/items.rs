//! Item catalogue and stock adjustments.

use std::{collections::HashMap, sync::Arc};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        models::{Item, ItemView},
        money::amount_to_cents,
        stock::{StockAdjustment, StockOperation},
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    validation::rules::NumericInput,
};

use super::{
    activity,
    errors::ServiceError,
    export::{self, RowError},
};

pub const ITEM_COLUMNS: &str = "id, name, category, quantity, reorder_level, price_cents, \
     supplier_id, sku, expiry_date, description, ecommerce_enabled, is_public, tags, \
     created_by, updated_by, created_at, updated_at";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub reorder_level: i32,
    #[validate(range(min = 0.0))]
    pub price: f64,
    pub supplier_id: Option<Uuid>,
    #[validate(length(max = 64))]
    pub sku: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub description: Option<String>,
    #[serde(default)]
    pub ecommerce_enabled: bool,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update. Nullable fields distinguish "absent" (keep) from an
/// explicit `null` (clear).
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    #[validate(range(min = 0))]
    pub reorder_level: Option<i32>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub supplier_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub sku: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub expiry_date: Option<Option<NaiveDate>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    pub ecommerce_enabled: Option<bool>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub low_stock: Option<bool>,
    pub supplier_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub amount: NumericInput,
    pub operation: StockOperation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<RowError>,
}

pub struct ItemService {
    state: Arc<AppState>,
}

impl ItemService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list(&self, filter: ItemFilter) -> Result<Vec<ItemView>, ServiceError> {
        let items = self.fetch(&filter).await?;
        let now = Utc::now();
        Ok(items.iter().map(|item| item.view(now)).collect())
    }

    async fn fetch(&self, filter: &ItemFilter) -> Result<Vec<Item>, ServiceError> {
        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {ITEM_COLUMNS} FROM items WHERE TRUE"));
        if let Some(category) = filter.category.as_deref().filter(|c| !c.trim().is_empty()) {
            query.push(" AND category = ").push_bind(category.trim().to_string());
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = contains_pattern(search);
            query
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR sku ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if filter.low_stock == Some(true) {
            query.push(" AND quantity < reorder_level");
        }
        if let Some(supplier_id) = filter.supplier_id {
            query.push(" AND supplier_id = ").push_bind(supplier_id);
        }
        query.push(" ORDER BY name");

        let items = query
            .build_query_as::<Item>()
            .fetch_all(&self.state.pool)
            .await?;
        Ok(items)
    }

    pub async fn get(&self, id: Uuid) -> Result<ItemView, ServiceError> {
        let item = sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.state.pool)
            .await?
            .ok_or(ServiceError::NotFound("item"))?;
        Ok(item.view(Utc::now()))
    }

    pub async fn create(
        &self,
        actor: &AuthenticatedUser,
        payload: CreateItemRequest,
    ) -> Result<ItemView, ServiceError> {
        payload.validate()?;
        let price_cents = price_to_cents(payload.price)?;
        let now = Utc::now();

        let mut tx = self.state.pool.begin().await?;
        if let Some(supplier_id) = payload.supplier_id {
            ensure_supplier(&mut tx, supplier_id).await?;
        }
        let item = sqlx::query_as::<_, Item>(&format!(
            "INSERT INTO items (id, name, category, quantity, reorder_level, price_cents, supplier_id,
                                sku, expiry_date, description, ecommerce_enabled, is_public, tags,
                                created_by, updated_by, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$14,$15,$15)
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(payload.name.trim())
        .bind(payload.category.trim())
        .bind(payload.quantity)
        .bind(payload.reorder_level)
        .bind(price_cents)
        .bind(payload.supplier_id)
        .bind(normalize_sku(payload.sku))
        .bind(payload.expiry_date)
        .bind(payload.description)
        .bind(payload.ecommerce_enabled)
        .bind(payload.is_public)
        .bind(normalize_tags(payload.tags))
        .bind(actor.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "create",
            "item",
            Some(item.id),
            serde_json::json!({ "name": item.name, "quantity": item.quantity }),
        )
        .await?;
        tx.commit().await?;
        Ok(item.view(now))
    }

    pub async fn update(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: UpdateItemRequest,
    ) -> Result<ItemView, ServiceError> {
        payload.validate()?;
        let mut tx = self.state.pool.begin().await?;
        let mut item = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::NotFound("item"))?;

        if let Some(name) = payload.name {
            item.name = name.trim().to_string();
        }
        if let Some(category) = payload.category {
            item.category = category.trim().to_string();
        }
        if let Some(quantity) = payload.quantity {
            item.quantity = quantity;
        }
        if let Some(reorder_level) = payload.reorder_level {
            item.reorder_level = reorder_level;
        }
        if let Some(price) = payload.price {
            item.price_cents = price_to_cents(price)?;
        }
        if let Some(supplier_id) = payload.supplier_id {
            if let Some(supplier_id) = supplier_id {
                ensure_supplier(&mut tx, supplier_id).await?;
            }
            item.supplier_id = supplier_id;
        }
        if let Some(sku) = payload.sku {
            item.sku = normalize_sku(sku);
        }
        if let Some(expiry_date) = payload.expiry_date {
            item.expiry_date = expiry_date;
        }
        if let Some(description) = payload.description {
            item.description = description;
        }
        if let Some(enabled) = payload.ecommerce_enabled {
            item.ecommerce_enabled = enabled;
        }
        if let Some(is_public) = payload.is_public {
            item.is_public = is_public;
        }
        if let Some(tags) = payload.tags {
            item.tags = normalize_tags(tags);
        }

        let now = Utc::now();
        let updated = sqlx::query_as::<_, Item>(&format!(
            "UPDATE items
             SET name = $1, category = $2, quantity = $3, reorder_level = $4, price_cents = $5,
                 supplier_id = $6, sku = $7, expiry_date = $8, description = $9,
                 ecommerce_enabled = $10, is_public = $11, tags = $12,
                 updated_by = $13, updated_at = $14
             WHERE id = $15
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.quantity)
        .bind(item.reorder_level)
        .bind(item.price_cents)
        .bind(item.supplier_id)
        .bind(&item.sku)
        .bind(item.expiry_date)
        .bind(&item.description)
        .bind(item.ecommerce_enabled)
        .bind(item.is_public)
        .bind(&item.tags)
        .bind(actor.user_id)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "update",
            "item",
            Some(id),
            serde_json::json!({ "name": updated.name }),
        )
        .await?;
        tx.commit().await?;
        Ok(updated.view(now))
    }

    /// Items with recorded sales cannot be deleted; sales keep their item.
    pub async fn delete(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.state.pool.begin().await?;
        let sales = sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM sales WHERE item_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if sales > 0 {
            return Err(ServiceError::Conflict(format!(
                "item has {sales} recorded sale(s)"
            )));
        }
        let name = sqlx::query_scalar::<_, String>("DELETE FROM items WHERE id = $1 RETURNING name")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::NotFound("item"))?;
        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "delete",
            "item",
            Some(id),
            serde_json::json!({ "name": name }),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Applies an increase, decrease, or set in one conditional statement.
    /// A decrease that would go below zero matches no row and leaves the
    /// quantity untouched.
    pub async fn adjust_stock(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: AdjustStockRequest,
    ) -> Result<ItemView, ServiceError> {
        let adjustment = StockAdjustment::parse(payload.operation, payload.amount.as_f64())?;
        let assignment = match adjustment.operation {
            StockOperation::Increase => "quantity = quantity + $1",
            StockOperation::Decrease => "quantity = quantity - $1",
            StockOperation::Set => "quantity = $1",
        };
        let guard = match adjustment.operation {
            StockOperation::Decrease => " AND quantity >= $1",
            _ => "",
        };

        let mut tx = self.state.pool.begin().await?;
        let updated = sqlx::query_as::<_, Item>(&format!(
            "UPDATE items SET {assignment}, updated_by = $2, updated_at = $3
             WHERE id = $4{guard}
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(adjustment.amount)
        .bind(actor.user_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let item = match updated {
            Some(item) => item,
            None => {
                let available = current_quantity(&mut tx, id).await?;
                return Err(adjustment.apply(available).err().map_or_else(
                    || ServiceError::Internal("stock update matched no row".into()),
                    ServiceError::from,
                ));
            }
        };

        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "adjust_stock",
            "item",
            Some(id),
            serde_json::json!({
                "operation": adjustment.operation,
                "amount": adjustment.amount,
                "newQuantity": item.quantity,
            }),
        )
        .await?;
        tx.commit().await?;

        info!(
            item_id = %id,
            operation = adjustment.operation.as_str(),
            amount = adjustment.amount,
            quantity = item.quantity,
            "stock adjusted"
        );
        Ok(item.view(Utc::now()))
    }

    pub async fn export_csv(&self, filter: ItemFilter) -> Result<String, ServiceError> {
        let items = self.fetch(&filter).await?;
        let suppliers = supplier_names(&self.state).await?;
        export::items_csv(&items, &suppliers, Utc::now())
    }

    /// Upserts rows by item name. Invalid rows are reported and skipped; the
    /// remaining rows are still applied.
    pub async fn import_csv(
        &self,
        actor: &AuthenticatedUser,
        body: &str,
    ) -> Result<ImportSummary, ServiceError> {
        let rows = export::parse_item_rows(body);
        if rows.is_empty() {
            return Err(ServiceError::Validation("csv contains no rows".to_string()));
        }
        let suppliers_by_name: HashMap<String, Uuid> = supplier_names(&self.state)
            .await?
            .into_iter()
            .map(|(id, name)| (name.to_lowercase(), id))
            .collect();

        let mut summary = ImportSummary {
            created: 0,
            updated: 0,
            errors: Vec::new(),
        };
        let now = Utc::now();
        for row in rows {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    summary.errors.push(err);
                    continue;
                }
            };
            let supplier_id = match &row.supplier {
                Some(name) => match suppliers_by_name.get(&name.to_lowercase()) {
                    Some(id) => Some(*id),
                    None => {
                        summary.errors.push(RowError {
                            line: row.line,
                            message: format!("unknown supplier {name}"),
                        });
                        continue;
                    }
                },
                None => None,
            };

            let result = sqlx::query_scalar::<_, bool>(
                "INSERT INTO items (id, name, category, quantity, reorder_level, price_cents,
                                    supplier_id, sku, expiry_date, created_by, updated_by,
                                    created_at, updated_at)
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$10,$11,$11)
                 ON CONFLICT (name) DO UPDATE
                 SET category = EXCLUDED.category,
                     quantity = EXCLUDED.quantity,
                     reorder_level = EXCLUDED.reorder_level,
                     price_cents = EXCLUDED.price_cents,
                     supplier_id = EXCLUDED.supplier_id,
                     sku = EXCLUDED.sku,
                     expiry_date = EXCLUDED.expiry_date,
                     updated_by = EXCLUDED.updated_by,
                     updated_at = EXCLUDED.updated_at
                 RETURNING (xmax = 0)",
            )
            .bind(Uuid::new_v4())
            .bind(&row.name)
            .bind(&row.category)
            .bind(row.quantity)
            .bind(row.reorder_level)
            .bind(row.price_cents)
            .bind(supplier_id)
            .bind(&row.sku)
            .bind(row.expiry_date)
            .bind(actor.user_id)
            .bind(now)
            .fetch_one(&self.state.pool)
            .await;

            match result {
                Ok(true) => summary.created += 1,
                Ok(false) => summary.updated += 1,
                Err(err) => summary.errors.push(RowError {
                    line: row.line,
                    message: ServiceError::from(err).public_message(),
                }),
            }
        }

        activity::record(
            &self.state.pool,
            Some(actor.user_id),
            "import",
            "item",
            None,
            serde_json::json!({
                "created": summary.created,
                "updated": summary.updated,
                "failed": summary.errors.len(),
            }),
        )
        .await?;
        Ok(summary)
    }
}

pub(crate) async fn supplier_names(state: &AppState) -> Result<HashMap<Uuid, String>, ServiceError> {
    let rows = sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM suppliers")
        .fetch_all(&state.pool)
        .await?;
    Ok(rows.into_iter().collect())
}

pub(crate) async fn current_quantity(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<i32, ServiceError> {
    sqlx::query_scalar::<_, i32>("SELECT quantity FROM items WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(ServiceError::NotFound("item"))
}

async fn ensure_supplier(conn: &mut PgConnection, id: Uuid) -> Result<(), ServiceError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM suppliers WHERE id = $1)")
        .bind(id)
        .fetch_one(conn)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!("supplier {id} does not exist")))
    }
}

fn price_to_cents(price: f64) -> Result<i64, ServiceError> {
    amount_to_cents(price)
        .ok_or_else(|| ServiceError::Validation("price must be zero or greater".to_string()))
}

fn normalize_sku(sku: Option<String>) -> Option<String> {
    sku.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut tags: Vec<String> = tags
        .into_iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// `ILIKE` pattern matching `search` literally anywhere in the column.
pub(crate) fn contains_pattern(search: &str) -> String {
    format!("%{}%", escape_like(search.trim()))
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
