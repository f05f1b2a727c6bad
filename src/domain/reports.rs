//! Date-range resolution and in-memory aggregation used by the report
//! service. SQL does the grouping; the shaping, truncation, and reorder
//! arithmetic live here so they can be tested without a database.

use std::{cmp::Ordering, collections::HashMap, str::FromStr};

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use super::money::{cents_to_amount, round2};

pub const DEFAULT_RANGE_DAYS: i64 = 30;
pub const TOP_PRODUCTS_PER_CATEGORY: usize = 5;
pub const DEFAULT_TOP_PRODUCTS: i64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("'from' must not be after 'to'")]
    Inverted,
    #[error("unsupported period: {0}")]
    UnknownPeriod(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    /// Unit passed to PostgreSQL `date_trunc`.
    pub fn trunc_unit(&self) -> &'static str {
        match self {
            Period::Daily => "day",
            Period::Weekly => "week",
            Period::Monthly => "month",
        }
    }

    /// Start of the default window ending at `now`: 7 days, 8 weeks, or 12
    /// months back.
    pub fn default_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Period::Daily => now - Duration::days(7),
            Period::Weekly => now - Duration::weeks(8),
            Period::Monthly => now
                .checked_sub_months(Months::new(12))
                .unwrap_or(now - Duration::days(365)),
        }
    }

    fn span_before(&self, end: DateTime<Utc>) -> DateTime<Utc> {
        self.default_start(end)
    }

    pub fn label(&self, bucket: NaiveDate) -> String {
        match self {
            Period::Daily => bucket.format("%Y-%m-%d").to_string(),
            Period::Weekly => bucket.format("%G-W%V").to_string(),
            Period::Monthly => bucket.format("%Y-%m").to_string(),
        }
    }
}

impl FromStr for Period {
    type Err = RangeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Period::Daily),
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            other => Err(RangeError::UnknownPeriod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    fn checked(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, RangeError> {
        if from > to {
            return Err(RangeError::Inverted);
        }
        Ok(Self { from, to })
    }

    /// Revenue-style defaults: a missing bound sits 30 days from the given one;
    /// with neither bound the range is the trailing 30 days.
    pub fn resolve(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self, RangeError> {
        let span = Duration::days(DEFAULT_RANGE_DAYS);
        match (from, to) {
            (Some(from), Some(to)) => Self::checked(from, to),
            (Some(from), None) => Self::checked(from, from + span),
            (None, Some(to)) => Self::checked(to - span, to),
            (None, None) => Self::checked(now - span, now),
        }
    }

    /// Sales-summary defaults: the period's default window back from `to`
    /// (or from now), and `to` defaults to now.
    pub fn resolve_for_period(
        period: Period,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self, RangeError> {
        match (from, to) {
            (Some(from), Some(to)) => Self::checked(from, to),
            (Some(from), None) => Self::checked(from, now.max(from)),
            (None, Some(to)) => Self::checked(period.span_before(to), to),
            (None, None) => Self::checked(period.default_start(now), now),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesBucket {
    pub period_start: NaiveDate,
    pub label: String,
    pub quantity: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total_revenue: f64,
    pub total_quantity: i64,
    pub order_count: i64,
    pub average_order_value: f64,
}

impl RevenueSummary {
    pub fn from_totals(range: DateRange, revenue_cents: i64, quantity: i64, orders: i64) -> Self {
        let average_order_value = if orders == 0 {
            0.0
        } else {
            round2(revenue_cents as f64 / 100.0 / orders as f64)
        };
        Self {
            from: range.from,
            to: range.to,
            total_revenue: cents_to_amount(revenue_cents),
            total_quantity: quantity,
            order_count: orders,
            average_order_value,
        }
    }
}

/// Per-item sales totals as returned by the grouping query.
#[derive(Debug, Clone, FromRow)]
pub struct ProductSalesRow {
    pub item_id: Uuid,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub item_id: Uuid,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub revenue: f64,
}

impl From<&ProductSalesRow> for ProductSales {
    fn from(row: &ProductSalesRow) -> Self {
        Self {
            item_id: row.item_id,
            name: row.name.clone(),
            category: row.category.clone(),
            quantity: row.quantity,
            revenue: cents_to_amount(row.revenue_cents),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub category: String,
    pub quantity: i64,
    pub revenue: f64,
    pub top_products: Vec<ProductSales>,
}

fn by_revenue_desc(a: &ProductSalesRow, b: &ProductSalesRow) -> Ordering {
    b.revenue_cents
        .cmp(&a.revenue_cents)
        .then_with(|| b.quantity.cmp(&a.quantity))
        .then_with(|| a.name.cmp(&b.name))
}

/// Groups per-item totals by category, keeping the top `top_n` products of
/// each. Categories are ordered by revenue, highest first.
pub fn category_breakdown(rows: &[ProductSalesRow], top_n: usize) -> Vec<CategoryBreakdown> {
    let mut grouped: HashMap<&str, Vec<&ProductSalesRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.category.as_str()).or_default().push(row);
    }

    let mut totals: Vec<(i64, CategoryBreakdown)> = grouped
        .into_iter()
        .map(|(category, mut products)| {
            products.sort_by(|a, b| by_revenue_desc(a, b));
            let revenue_cents: i64 = products.iter().map(|row| row.revenue_cents).sum();
            let quantity = products.iter().map(|row| row.quantity).sum();
            let breakdown = CategoryBreakdown {
                category: category.to_string(),
                quantity,
                revenue: cents_to_amount(revenue_cents),
                top_products: products
                    .into_iter()
                    .take(top_n)
                    .map(ProductSales::from)
                    .collect(),
            };
            (revenue_cents, breakdown)
        })
        .collect();

    totals.sort_by(|(a_rev, a), (b_rev, b)| {
        b_rev.cmp(a_rev).then_with(|| a.category.cmp(&b.category))
    });
    totals.into_iter().map(|(_, breakdown)| breakdown).collect()
}

pub fn top_products(rows: &[ProductSalesRow], limit: usize) -> Vec<ProductSales> {
    let mut sorted: Vec<&ProductSalesRow> = rows.iter().collect();
    sorted.sort_by(|a, b| by_revenue_desc(a, b));
    sorted
        .into_iter()
        .take(limit)
        .map(ProductSales::from)
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Urgency {
    High,
    Medium,
}

/// HIGH when stock has fallen below half the reorder level.
pub fn classify_urgency(quantity: i32, reorder_level: i32) -> Urgency {
    if f64::from(quantity) < f64::from(reorder_level) / 2.0 {
        Urgency::High
    } else {
        Urgency::Medium
    }
}

/// Below-reorder item joined with its sales volume in the trailing window.
#[derive(Debug, Clone, FromRow)]
pub struct ReorderCandidate {
    pub item_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub category: String,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub quantity: i32,
    pub reorder_level: i32,
    pub units_sold: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderSuggestion {
    pub item_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub category: String,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub current_quantity: i32,
    pub reorder_level: i32,
    pub units_sold: i64,
    pub avg_daily_sales: f64,
    /// Units needed to cover `supply_days` at the trailing sales rate.
    pub projected_demand: i64,
    /// Units needed to bring stock back to twice the reorder level.
    pub refill_gap: i64,
    /// The larger of the two, never below one.
    pub suggested_quantity: i64,
    pub urgency: Urgency,
}

/// Projects demand over `supply_days` from the trailing `window_days`
/// velocity and sizes the order to cover it or the refill gap.
pub fn suggest_reorder(
    candidate: ReorderCandidate,
    window_days: i64,
    supply_days: i64,
) -> ReorderSuggestion {
    let window = window_days.max(1) as f64;
    let avg_daily = candidate.units_sold as f64 / window;
    let projected_demand = (avg_daily * supply_days.max(0) as f64).ceil() as i64;
    let refill_gap =
        (i64::from(candidate.reorder_level) * 2 - i64::from(candidate.quantity)).max(0);
    let suggested_quantity = projected_demand.max(refill_gap).max(1);

    ReorderSuggestion {
        urgency: classify_urgency(candidate.quantity, candidate.reorder_level),
        item_id: candidate.item_id,
        name: candidate.name,
        sku: candidate.sku,
        category: candidate.category,
        supplier_id: candidate.supplier_id,
        supplier_name: candidate.supplier_name,
        current_quantity: candidate.quantity,
        reorder_level: candidate.reorder_level,
        units_sold: candidate.units_sold,
        avg_daily_sales: round2(avg_daily),
        projected_demand,
        refill_gap,
        suggested_quantity,
    }
}

/// HIGH before MEDIUM, then ascending current quantity.
pub fn sort_suggestions(suggestions: &mut [ReorderSuggestion]) {
    suggestions.sort_by(|a, b| {
        a.urgency
            .cmp(&b.urgency)
            .then_with(|| a.current_quantity.cmp(&b.current_quantity))
            .then_with(|| a.name.cmp(&b.name))
    });
}
