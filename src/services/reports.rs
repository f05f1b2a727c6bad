//! Read-only aggregation over sales and items. All money leaves this module
//! rounded to two decimals.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    domain::{
        models::{Item, ItemView, Sale},
        money::cents_to_amount,
        reports::{
            self, category_breakdown, sort_suggestions, suggest_reorder, CategoryBreakdown,
            DateRange, Period, ProductSales, ProductSalesRow, ReorderCandidate, ReorderSuggestion,
            RevenueSummary, SalesBucket, DEFAULT_TOP_PRODUCTS, TOP_PRODUCTS_PER_CATEGORY,
        },
    },
    infrastructure::state::AppState,
    validation::rules::Bound,
};

use super::{
    errors::ServiceError,
    export,
    items::{supplier_names, ITEM_COLUMNS},
    sales::{optional_instant, RangeQuery, SALE_SELECT},
};

const MAX_TOP_PRODUCTS: i64 = 100;
const MAX_WINDOW_DAYS: i64 = 365;

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub period: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopProductsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderQuery {
    pub window_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SalesSummary {
    pub period: Period,
    pub range: DateRange,
    pub buckets: Vec<SalesBucket>,
}

#[derive(Debug, Serialize)]
pub struct CategoryReport {
    pub range: DateRange,
    pub categories: Vec<CategoryBreakdown>,
}

#[derive(Debug, Serialize)]
pub struct TopProductsReport {
    pub range: DateRange,
    pub products: Vec<ProductSales>,
}

#[derive(Debug, FromRow)]
struct BucketRow {
    period_start: NaiveDate,
    quantity: i64,
    amount_cents: i64,
}

#[derive(Debug, FromRow)]
struct RevenueRow {
    revenue_cents: i64,
    quantity: i64,
    orders: i64,
}

#[derive(Debug, FromRow)]
struct SupplierRow {
    supplier_id: Option<Uuid>,
    supplier_name: Option<String>,
    item_count: i64,
    units: i64,
    value_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierBreakdown {
    pub supplier_id: Option<Uuid>,
    pub supplier_name: String,
    pub item_count: i64,
    pub units_in_stock: i64,
    pub stock_value: f64,
}

#[derive(Debug, FromRow)]
struct InventoryTotalsRow {
    item_count: i64,
    units: i64,
    value_cents: i64,
    low_stock_count: i64,
    expired_count: i64,
}

#[derive(Debug, FromRow)]
struct CategoryValueRow {
    category: String,
    item_count: i64,
    units: i64,
    value_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryValue {
    pub category: String,
    pub item_count: i64,
    pub units: i64,
    pub stock_value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryValue {
    pub item_count: i64,
    pub total_units: i64,
    pub total_value: f64,
    pub low_stock_count: i64,
    pub expired_count: i64,
    pub categories: Vec<CategoryValue>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderReport {
    pub window_days: i64,
    pub supply_days: i64,
    pub suggestions: Vec<ReorderSuggestion>,
}

/// A rendered CSV download.
pub struct CsvExport {
    pub filename: String,
    pub body: String,
}

fn resolve_range(from: Option<&str>, to: Option<&str>) -> Result<DateRange, ServiceError> {
    Ok(DateRange::resolve(
        optional_instant(from, Bound::Start, "from")?,
        optional_instant(to, Bound::End, "to")?,
        Utc::now(),
    )?)
}

pub struct ReportService {
    state: Arc<AppState>,
}

impl ReportService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub(crate) async fn low_stock_items(&self) -> Result<Vec<Item>, ServiceError> {
        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE quantity < reorder_level
             ORDER BY reorder_level ASC, quantity ASC, name"
        ))
        .fetch_all(&self.state.pool)
        .await?;
        Ok(items)
    }

    pub async fn low_stock(&self) -> Result<Vec<ItemView>, ServiceError> {
        let now = Utc::now();
        Ok(self
            .low_stock_items()
            .await?
            .iter()
            .map(|item| item.view(now))
            .collect())
    }

    pub async fn sales_summary(&self, query: SummaryQuery) -> Result<SalesSummary, ServiceError> {
        let period = match query.period.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(raw) => raw.parse::<Period>()?,
            None => Period::Daily,
        };
        let range = DateRange::resolve_for_period(
            period,
            optional_instant(query.from.as_deref(), Bound::Start, "from")?,
            optional_instant(query.to.as_deref(), Bound::End, "to")?,
            Utc::now(),
        )?;

        let rows = sqlx::query_as::<_, BucketRow>(
            r#"
            SELECT date_trunc($1, sale_date AT TIME ZONE 'UTC')::date AS period_start,
                   SUM(quantity_sold)::BIGINT AS quantity,
                   SUM(total_amount_cents)::BIGINT AS amount_cents
            FROM sales
            WHERE sale_date >= $2 AND sale_date <= $3
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(period.trunc_unit())
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.state.pool)
        .await?;

        let buckets = rows
            .into_iter()
            .map(|row| SalesBucket {
                label: period.label(row.period_start),
                period_start: row.period_start,
                quantity: row.quantity,
                amount: cents_to_amount(row.amount_cents),
            })
            .collect();
        Ok(SalesSummary {
            period,
            range,
            buckets,
        })
    }

    /// Lines of one storefront order count as a single order.
    pub async fn revenue(&self, query: RangeQuery) -> Result<RevenueSummary, ServiceError> {
        let range = resolve_range(query.from.as_deref(), query.to.as_deref())?;
        let row = sqlx::query_as::<_, RevenueRow>(
            r#"
            SELECT COALESCE(SUM(total_amount_cents), 0)::BIGINT AS revenue_cents,
                   COALESCE(SUM(quantity_sold), 0)::BIGINT AS quantity,
                   COUNT(DISTINCT COALESCE(order_reference, id::text)) AS orders
            FROM sales
            WHERE sale_date >= $1 AND sale_date <= $2
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&self.state.pool)
        .await?;
        Ok(RevenueSummary::from_totals(
            range,
            row.revenue_cents,
            row.quantity,
            row.orders,
        ))
    }

    async fn product_rows(&self, range: DateRange) -> Result<Vec<ProductSalesRow>, ServiceError> {
        let rows = sqlx::query_as::<_, ProductSalesRow>(
            r#"
            SELECT i.id AS item_id,
                   i.name,
                   i.category,
                   SUM(s.quantity_sold)::BIGINT AS quantity,
                   SUM(s.total_amount_cents)::BIGINT AS revenue_cents
            FROM sales s
            JOIN items i ON i.id = s.item_id
            WHERE s.sale_date >= $1 AND s.sale_date <= $2
            GROUP BY i.id, i.name, i.category
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(rows)
    }

    pub async fn categories(&self, query: RangeQuery) -> Result<CategoryReport, ServiceError> {
        let range = resolve_range(query.from.as_deref(), query.to.as_deref())?;
        let rows = self.product_rows(range).await?;
        Ok(CategoryReport {
            range,
            categories: category_breakdown(&rows, TOP_PRODUCTS_PER_CATEGORY),
        })
    }

    pub async fn top_products(
        &self,
        query: TopProductsQuery,
    ) -> Result<TopProductsReport, ServiceError> {
        let range = resolve_range(query.from.as_deref(), query.to.as_deref())?;
        let limit = query
            .limit
            .unwrap_or(DEFAULT_TOP_PRODUCTS)
            .clamp(1, MAX_TOP_PRODUCTS);
        let rows = self.product_rows(range).await?;
        Ok(TopProductsReport {
            range,
            products: reports::top_products(&rows, limit as usize),
        })
    }

    /// Suppliers with no items appear with zero totals; items without a
    /// supplier are grouped under "Unassigned".
    pub async fn suppliers(&self) -> Result<Vec<SupplierBreakdown>, ServiceError> {
        let rows = sqlx::query_as::<_, SupplierRow>(
            r#"
            SELECT sup.id AS supplier_id,
                   sup.name AS supplier_name,
                   COUNT(i.id) AS item_count,
                   COALESCE(SUM(i.quantity), 0)::BIGINT AS units,
                   COALESCE(SUM(i.quantity::BIGINT * i.price_cents), 0)::BIGINT AS value_cents
            FROM items i
            FULL OUTER JOIN suppliers sup ON sup.id = i.supplier_id
            GROUP BY sup.id, sup.name
            ORDER BY value_cents DESC, supplier_name
            "#,
        )
        .fetch_all(&self.state.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SupplierBreakdown {
                supplier_id: row.supplier_id,
                supplier_name: row
                    .supplier_name
                    .unwrap_or_else(|| "Unassigned".to_string()),
                item_count: row.item_count,
                units_in_stock: row.units,
                stock_value: cents_to_amount(row.value_cents),
            })
            .collect())
    }

    pub async fn inventory_value(&self) -> Result<InventoryValue, ServiceError> {
        let totals = sqlx::query_as::<_, InventoryTotalsRow>(
            r#"
            SELECT COUNT(*) AS item_count,
                   COALESCE(SUM(quantity), 0)::BIGINT AS units,
                   COALESCE(SUM(quantity::BIGINT * price_cents), 0)::BIGINT AS value_cents,
                   COUNT(*) FILTER (WHERE quantity < reorder_level) AS low_stock_count,
                   COUNT(*) FILTER (
                       WHERE expiry_date IS NOT NULL
                         AND (expiry_date::timestamp AT TIME ZONE 'UTC') < NOW()
                   ) AS expired_count
            FROM items
            "#,
        )
        .fetch_one(&self.state.pool)
        .await?;

        let categories = sqlx::query_as::<_, CategoryValueRow>(
            r#"
            SELECT category,
                   COUNT(*) AS item_count,
                   COALESCE(SUM(quantity), 0)::BIGINT AS units,
                   COALESCE(SUM(quantity::BIGINT * price_cents), 0)::BIGINT AS value_cents
            FROM items
            GROUP BY category
            ORDER BY value_cents DESC, category
            "#,
        )
        .fetch_all(&self.state.pool)
        .await?;

        Ok(InventoryValue {
            item_count: totals.item_count,
            total_units: totals.units,
            total_value: cents_to_amount(totals.value_cents),
            low_stock_count: totals.low_stock_count,
            expired_count: totals.expired_count,
            categories: categories
                .into_iter()
                .map(|row| CategoryValue {
                    category: row.category,
                    item_count: row.item_count,
                    units: row.units,
                    stock_value: cents_to_amount(row.value_cents),
                })
                .collect(),
        })
    }

    pub async fn reorder_suggestions(
        &self,
        query: ReorderQuery,
    ) -> Result<ReorderReport, ServiceError> {
        let window_days = query
            .window_days
            .unwrap_or(self.state.config.reports.reorder_window_days);
        if !(1..=MAX_WINDOW_DAYS).contains(&window_days) {
            return Err(ServiceError::Validation(format!(
                "windowDays must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        let supply_days = self.state.config.reports.reorder_supply_days;
        let since: DateTime<Utc> = Utc::now() - Duration::days(window_days);

        let candidates = sqlx::query_as::<_, ReorderCandidate>(
            r#"
            SELECT i.id AS item_id,
                   i.name,
                   i.sku,
                   i.category,
                   i.supplier_id,
                   sup.name AS supplier_name,
                   i.quantity,
                   i.reorder_level,
                   COALESCE(SUM(s.quantity_sold), 0)::BIGINT AS units_sold
            FROM items i
            LEFT JOIN suppliers sup ON sup.id = i.supplier_id
            LEFT JOIN sales s ON s.item_id = i.id AND s.sale_date >= $1
            WHERE i.quantity < i.reorder_level
            GROUP BY i.id, sup.name
            "#,
        )
        .bind(since)
        .fetch_all(&self.state.pool)
        .await?;

        let mut suggestions: Vec<ReorderSuggestion> = candidates
            .into_iter()
            .map(|candidate| suggest_reorder(candidate, window_days, supply_days))
            .collect();
        sort_suggestions(&mut suggestions);
        Ok(ReorderReport {
            window_days,
            supply_days,
            suggestions,
        })
    }

    pub async fn export_sales(&self, query: RangeQuery) -> Result<CsvExport, ServiceError> {
        let range = resolve_range(query.from.as_deref(), query.to.as_deref())?;
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "{SALE_SELECT} WHERE s.sale_date >= $1 AND s.sale_date <= $2 ORDER BY s.sale_date, s.id"
        ))
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(CsvExport {
            filename: format!(
                "sales-{}-to-{}.csv",
                range.from.format("%Y-%m-%d"),
                range.to.format("%Y-%m-%d")
            ),
            body: export::sales_csv(&sales)?,
        })
    }

    pub async fn export_low_stock(&self) -> Result<CsvExport, ServiceError> {
        let items = self.low_stock_items().await?;
        let suppliers = supplier_names(&self.state).await?;
        Ok(CsvExport {
            filename: format!("low-stock-{}.csv", Utc::now().format("%Y-%m-%d")),
            body: export::low_stock_csv(&items, &suppliers)?,
        })
    }
}
