//! Storefront catalogue and orders.
//!
//! An order is a set of sales sharing one reference. Placing it decrements
//! every line inside a single transaction, so one short line rolls back the
//! whole order.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        models::{Item, OrderStatus},
        money::cents_to_amount,
        stock::{check_sale, parse_sale_quantity, sale_total_cents},
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    validation::rules::NumericInput,
};

use super::{
    activity,
    errors::ServiceError,
    items::{contains_pattern, ITEM_COLUMNS},
};

const VISIBLE: &str = "ecommerce_enabled AND is_public";
const MAX_ORDER_LINES: usize = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreProduct {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: f64,
    pub sku: Option<String>,
    pub tags: Vec<String>,
    pub available: i32,
    pub in_stock: bool,
}

impl From<Item> for StoreProduct {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            price: cents_to_amount(item.price_cents),
            available: item.quantity,
            in_stock: item.quantity > 0,
            name: item.name,
            category: item.category,
            description: item.description,
            sku: item.sku,
            tags: item.tags,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub item_id: Uuid,
    pub quantity: Option<NumericInput>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderLineRequest>,
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    #[validate(email)]
    pub customer_email: String,
    #[validate(length(max = 1000))]
    pub shipping_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub line_total: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub reference: String,
    pub status: OrderStatus,
    pub total: f64,
    pub lines: Vec<OrderLine>,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct OrderLineRow {
    item_id: Uuid,
    name: String,
    quantity_sold: i32,
    total_amount_cents: i64,
    order_status: Option<String>,
    sale_date: DateTime<Utc>,
}

fn summarize(reference: String, rows: Vec<OrderLineRow>) -> Result<OrderSummary, ServiceError> {
    let first = rows.first().ok_or(ServiceError::NotFound("order"))?;
    let status = first
        .order_status
        .as_deref()
        .unwrap_or(OrderStatus::Pending.as_str())
        .parse::<OrderStatus>()
        .map_err(|err| ServiceError::Internal(err.to_string()))?;
    let placed_at = first.sale_date;
    let total_cents: i64 = rows.iter().map(|row| row.total_amount_cents).sum();
    let lines = rows
        .into_iter()
        .map(|row| OrderLine {
            item_id: row.item_id,
            name: row.name,
            quantity: row.quantity_sold,
            unit_price: cents_to_amount(row.total_amount_cents / i64::from(row.quantity_sold.max(1))),
            line_total: cents_to_amount(row.total_amount_cents),
        })
        .collect();
    Ok(OrderSummary {
        reference,
        status,
        total: cents_to_amount(total_cents),
        lines,
        placed_at,
    })
}

/// Sums duplicate lines per item. The map is ordered by item id so that
/// concurrent orders lock rows in the same order.
fn merge_lines(lines: &[OrderLineRequest]) -> Result<BTreeMap<Uuid, i32>, ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::Validation(
            "order must contain at least one item".to_string(),
        ));
    }
    if lines.len() > MAX_ORDER_LINES {
        return Err(ServiceError::Validation(format!(
            "order may contain at most {MAX_ORDER_LINES} lines"
        )));
    }
    let mut merged = BTreeMap::new();
    for line in lines {
        let quantity = parse_sale_quantity(line.quantity.as_ref().and_then(NumericInput::as_f64))?;
        let entry: &mut i32 = merged.entry(line.item_id).or_insert(0);
        *entry = entry
            .checked_add(quantity)
            .ok_or_else(|| ServiceError::Validation("order quantity is too large".to_string()))?;
    }
    Ok(merged)
}

fn new_reference() -> String {
    let id = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("ORD-{}", &id[..12])
}

pub struct OrderService {
    state: Arc<AppState>,
}

impl OrderService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn products(&self, filter: ProductFilter) -> Result<Vec<StoreProduct>, ServiceError> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE {VISIBLE}"
        ));
        if let Some(category) = filter.category.as_deref().filter(|c| !c.trim().is_empty()) {
            query.push(" AND category = ").push_bind(category.trim().to_string());
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = contains_pattern(search);
            query
                .push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(tag) = filter.tag.as_deref().filter(|t| !t.trim().is_empty()) {
            query
                .push(" AND ")
                .push_bind(tag.trim().to_lowercase())
                .push(" = ANY(tags)");
        }
        query.push(" ORDER BY name");

        let items = query
            .build_query_as::<Item>()
            .fetch_all(&self.state.pool)
            .await?;
        Ok(items.into_iter().map(StoreProduct::from).collect())
    }

    pub async fn product(&self, id: Uuid) -> Result<StoreProduct, ServiceError> {
        sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 AND {VISIBLE}"
        ))
        .bind(id)
        .fetch_optional(&self.state.pool)
        .await?
        .map(StoreProduct::from)
        .ok_or(ServiceError::NotFound("product"))
    }

    pub async fn place(&self, payload: PlaceOrderRequest) -> Result<OrderSummary, ServiceError> {
        payload.validate()?;
        let lines = merge_lines(&payload.items)?;
        let reference = new_reference();
        let now = Utc::now();

        let mut tx = self.state.pool.begin().await?;
        for (&item_id, &quantity) in &lines {
            let decremented = sqlx::query_as::<_, (i64,)>(&format!(
                "UPDATE items SET quantity = quantity - $1, updated_at = $2
                 WHERE id = $3 AND {VISIBLE} AND quantity >= $1
                 RETURNING price_cents"
            ))
            .bind(quantity)
            .bind(now)
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await?;

            let (price_cents,) = match decremented {
                Some(row) => row,
                None => return Err(shortfall(&mut tx, item_id, quantity).await),
            };

            sqlx::query(
                "INSERT INTO sales (id, item_id, quantity_sold, total_amount_cents, sale_date,
                                    order_reference, order_status, customer_name, customer_email,
                                    shipping_address, created_at)
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$5)",
            )
            .bind(Uuid::new_v4())
            .bind(item_id)
            .bind(quantity)
            .bind(sale_total_cents(price_cents, quantity))
            .bind(now)
            .bind(&reference)
            .bind(OrderStatus::Pending.as_str())
            .bind(payload.customer_name.trim())
            .bind(payload.customer_email.trim())
            .bind(payload.shipping_address.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        activity::record(
            &mut *tx,
            None,
            "place_order",
            "order",
            None,
            serde_json::json!({ "reference": reference, "lines": lines.len() }),
        )
        .await?;
        tx.commit().await?;

        info!(%reference, lines = lines.len(), "storefront order placed");
        self.status(&reference).await
    }

    pub async fn status(&self, reference: &str) -> Result<OrderSummary, ServiceError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            r#"
            SELECT s.item_id, i.name, s.quantity_sold, s.total_amount_cents, s.order_status, s.sale_date
            FROM sales s
            JOIN items i ON i.id = s.item_id
            WHERE s.order_reference = $1
            ORDER BY i.name
            "#,
        )
        .bind(reference.trim())
        .fetch_all(&self.state.pool)
        .await?;
        summarize(reference.trim().to_string(), rows)
    }

    /// Sets the status on every line of the order. Any status may follow
    /// any other.
    pub async fn update_status(
        &self,
        actor: &AuthenticatedUser,
        reference: &str,
        payload: UpdateOrderStatusRequest,
    ) -> Result<OrderSummary, ServiceError> {
        let status = payload
            .status
            .parse::<OrderStatus>()
            .map_err(|err| ServiceError::Validation(err.to_string()))?;

        let mut tx = self.state.pool.begin().await?;
        let updated = sqlx::query("UPDATE sales SET order_status = $1 WHERE order_reference = $2")
            .bind(status.as_str())
            .bind(reference.trim())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(ServiceError::NotFound("order"));
        }
        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "update_order_status",
            "order",
            None,
            serde_json::json!({ "reference": reference.trim(), "status": status }),
        )
        .await?;
        tx.commit().await?;
        self.status(reference).await
    }
}

/// Explains why a line's decrement matched no row.
async fn shortfall(conn: &mut PgConnection, item_id: Uuid, requested: i32) -> ServiceError {
    let available = sqlx::query_scalar::<_, i32>(&format!(
        "SELECT quantity FROM items WHERE id = $1 AND {VISIBLE}"
    ))
    .bind(item_id)
    .fetch_optional(conn)
    .await;
    match available {
        Ok(Some(available)) => check_sale(available, requested).err().map_or_else(
            || ServiceError::Internal("order decrement matched no row".into()),
            ServiceError::from,
        ),
        Ok(None) => ServiceError::NotFound("product"),
        Err(err) => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(item_id: Uuid, quantity: i64) -> OrderLineRequest {
        OrderLineRequest {
            item_id,
            quantity: Some(NumericInput::from(quantity)),
        }
    }

    #[test]
    fn duplicate_lines_are_merged() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let merged = merge_lines(&[line(a, 2), line(b, 1), line(a, 3)]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&a], 5);
        assert_eq!(merged[&b], 1);
    }

    #[test]
    fn empty_orders_and_zero_quantities_are_rejected() {
        assert!(matches!(merge_lines(&[]), Err(ServiceError::Validation(_))));
        assert!(matches!(
            merge_lines(&[line(Uuid::new_v4(), 0)]),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn references_have_a_fixed_shape() {
        let reference = new_reference();
        assert!(reference.starts_with("ORD-"));
        assert_eq!(reference.len(), 16);
        assert!(reference[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn summary_totals_lines() {
        let now = Utc::now();
        let rows = vec![
            OrderLineRow {
                item_id: Uuid::new_v4(),
                name: "Mug".into(),
                quantity_sold: 2,
                total_amount_cents: 1_000,
                order_status: Some("shipped".into()),
                sale_date: now,
            },
            OrderLineRow {
                item_id: Uuid::new_v4(),
                name: "Tea".into(),
                quantity_sold: 1,
                total_amount_cents: 350,
                order_status: Some("shipped".into()),
                sale_date: now,
            },
        ];
        let summary = summarize("ORD-ABC".into(), rows).unwrap();
        assert_eq!(summary.status, OrderStatus::Shipped);
        assert_eq!(summary.total, 13.5);
        assert_eq!(summary.lines[0].unit_price, 5.0);
        assert!(matches!(
            summarize("ORD-NONE".into(), Vec::new()),
            Err(ServiceError::NotFound("order"))
        ));
    }
}
