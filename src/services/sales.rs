//! Counter sales. Recording a sale decrements stock and inserts the sale row
//! in one transaction, with the decrement guarded by `quantity >= n`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::{
    domain::{
        models::{Item, ItemView, Sale, SaleView},
        money::cents_to_amount,
        reports::DateRange,
        stock::{check_sale, parse_sale_quantity, sale_total_cents},
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    validation::rules::{parse_instant, Bound, NumericInput},
};

use super::{
    activity,
    errors::ServiceError,
    items::{current_quantity, ITEM_COLUMNS},
};

pub(crate) const SALE_COLUMNS: &str = "id, item_id, quantity_sold, total_amount_cents, sale_date, \
     sold_by, order_reference, order_status, customer_name, customer_email, shipping_address, \
     created_at";

pub(crate) const SALE_SELECT: &str = "SELECT s.id, s.item_id, s.quantity_sold, \
     s.total_amount_cents, s.sale_date, s.sold_by, s.order_reference, s.order_status, \
     s.customer_name, s.customer_email, s.shipping_address, s.created_at, \
     i.name AS item_name, u.username AS sold_by_username \
     FROM sales s \
     JOIN items i ON i.id = s.item_id \
     LEFT JOIN users u ON u.id = s.sold_by";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSaleRequest {
    pub item_id: Uuid,
    pub quantity_sold: Option<NumericInput>,
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaleReceipt {
    pub sale: SaleView,
    pub item: ItemView,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleFilter {
    pub from: Option<String>,
    pub to: Option<String>,
    pub user_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, FromRow)]
struct UserSalesRow {
    user_id: Uuid,
    username: String,
    units: i64,
    revenue_cents: i64,
    sale_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSalesSummary {
    pub user_id: Uuid,
    pub username: String,
    pub units: i64,
    pub revenue: f64,
    pub sale_count: i64,
}

#[derive(Debug, Serialize)]
pub struct UserSalesReport {
    pub range: DateRange,
    pub users: Vec<UserSalesSummary>,
}

/// Parses an optional query bound, rejecting anything that is neither an
/// RFC 3339 timestamp nor a `YYYY-MM-DD` date.
pub(crate) fn optional_instant(
    raw: Option<&str>,
    bound: Bound,
    field: &str,
) -> Result<Option<DateTime<Utc>>, ServiceError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => parse_instant(value, bound).map(Some).ok_or_else(|| {
            ServiceError::Validation(format!("{field} must be a date or RFC 3339 timestamp"))
        }),
    }
}

pub struct SaleService {
    state: Arc<AppState>,
}

impl SaleService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn record(
        &self,
        actor: &AuthenticatedUser,
        payload: RecordSaleRequest,
    ) -> Result<SaleReceipt, ServiceError> {
        let quantity = parse_sale_quantity(
            payload.quantity_sold.as_ref().and_then(NumericInput::as_f64),
        )?;
        let now = Utc::now();
        let sale_date = optional_instant(payload.date.as_deref(), Bound::Start, "date")?.unwrap_or(now);

        let mut tx = self.state.pool.begin().await?;
        let decremented = sqlx::query_as::<_, Item>(&format!(
            "UPDATE items SET quantity = quantity - $1, updated_by = $2, updated_at = $3
             WHERE id = $4 AND quantity >= $1
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(quantity)
        .bind(actor.user_id)
        .bind(now)
        .bind(payload.item_id)
        .fetch_optional(&mut *tx)
        .await?;

        let item = match decremented {
            Some(item) => item,
            None => {
                let available = current_quantity(&mut tx, payload.item_id).await?;
                return Err(check_sale(available, quantity).err().map_or_else(
                    || ServiceError::Internal("sale decrement matched no row".into()),
                    ServiceError::from,
                ));
            }
        };

        let total_cents = sale_total_cents(item.price_cents, quantity);
        let mut sale = sqlx::query_as::<_, Sale>(&format!(
            "INSERT INTO sales (id, item_id, quantity_sold, total_amount_cents, sale_date, sold_by, created_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7)
             RETURNING {SALE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(item.id)
        .bind(quantity)
        .bind(total_cents)
        .bind(sale_date)
        .bind(actor.user_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        sale.item_name = Some(item.name.clone());

        activity::record(
            &mut *tx,
            Some(actor.user_id),
            "record_sale",
            "sale",
            Some(sale.id),
            serde_json::json!({
                "itemId": item.id,
                "quantitySold": quantity,
                "totalAmount": cents_to_amount(total_cents),
            }),
        )
        .await?;
        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            item_id = %item.id,
            quantity,
            remaining = item.quantity,
            "sale recorded"
        );
        Ok(SaleReceipt {
            sale: sale.view(),
            item: item.view(now),
        })
    }

    pub async fn list(&self, filter: SaleFilter) -> Result<Vec<SaleView>, ServiceError> {
        let from = optional_instant(filter.from.as_deref(), Bound::Start, "from")?;
        let to = optional_instant(filter.to.as_deref(), Bound::End, "to")?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ServiceError::Validation(
                    "'from' must not be after 'to'".to_string(),
                ));
            }
        }

        let mut query = QueryBuilder::<Postgres>::new(SALE_SELECT);
        query.push(" WHERE TRUE");
        if let Some(from) = from {
            query.push(" AND s.sale_date >= ").push_bind(from);
        }
        if let Some(to) = to {
            query.push(" AND s.sale_date <= ").push_bind(to);
        }
        if let Some(user_id) = filter.user_id {
            query.push(" AND s.sold_by = ").push_bind(user_id);
        }
        if let Some(item_id) = filter.item_id {
            query.push(" AND s.item_id = ").push_bind(item_id);
        }
        query.push(" ORDER BY s.sale_date DESC, s.id");

        let sales = query
            .build_query_as::<Sale>()
            .fetch_all(&self.state.pool)
            .await?;
        Ok(sales.iter().map(Sale::view).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<SaleView, ServiceError> {
        let sale = sqlx::query_as::<_, Sale>(&format!("{SALE_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_optional(&self.state.pool)
            .await?
            .ok_or(ServiceError::NotFound("sale"))?;
        Ok(sale.view())
    }

    /// Units, revenue, and sale count per selling user. Storefront orders
    /// have no seller and are left out.
    pub async fn by_user(&self, query: RangeQuery) -> Result<UserSalesReport, ServiceError> {
        let range = DateRange::resolve(
            optional_instant(query.from.as_deref(), Bound::Start, "from")?,
            optional_instant(query.to.as_deref(), Bound::End, "to")?,
            Utc::now(),
        )?;
        let rows = sqlx::query_as::<_, UserSalesRow>(
            r#"
            SELECT u.id AS user_id,
                   u.username,
                   COALESCE(SUM(s.quantity_sold), 0)::BIGINT AS units,
                   COALESCE(SUM(s.total_amount_cents), 0)::BIGINT AS revenue_cents,
                   COUNT(s.id) AS sale_count
            FROM sales s
            JOIN users u ON u.id = s.sold_by
            WHERE s.sale_date >= $1 AND s.sale_date <= $2
            GROUP BY u.id, u.username
            ORDER BY revenue_cents DESC, u.username
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.state.pool)
        .await?;

        Ok(UserSalesReport {
            range,
            users: rows
                .into_iter()
                .map(|row| UserSalesSummary {
                    user_id: row.user_id,
                    username: row.username,
                    units: row.units,
                    revenue: cents_to_amount(row.revenue_cents),
                    sale_count: row.sale_count,
                })
                .collect(),
        })
    }
}
