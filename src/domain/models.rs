use std::{convert::TryFrom, fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    decode::Decode,
    encode::{Encode, IsNull},
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    FromRow, Postgres, Type,
};
use uuid::Uuid;

use super::money::cents_to_amount;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Staff,
    Ecommerce,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Staff => "staff",
            Role::Ecommerce => "ecommerce",
        }
    }

    fn parse_normalized(value: &str) -> Result<Self, ParseEnumError> {
        match value {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "staff" => Ok(Role::Staff),
            "ecommerce" => Ok(Role::Ecommerce),
            _ => Err(ParseEnumError::new("role", value)),
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Role::parse_normalized(&normalized)
    }
}

impl Type<Postgres> for Role {
    fn type_info() -> PgTypeInfo {
        <&str as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <&str as Type<Postgres>>::compatible(ty)
    }
}

impl<'q> Encode<'q, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        let value = self.as_str();
        <&str as Encode<Postgres>>::encode_by_ref(&value, buf)
    }

    fn size_hint(&self) -> usize {
        let value = self.as_str();
        <&str as Encode<Postgres>>::size_hint(&value)
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <&str as Decode<Postgres>>::decode(value)?;
        Role::try_from(raw).map_err(|err| Box::new(err) as BoxDynError)
    }
}

#[derive(Debug, Clone)]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported {} value: {}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

/// Storefront fulfilment status carried by sales that belong to an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(ParseEnumError::new("order status", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub products: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub quantity: i32,
    pub reorder_level: i32,
    pub price_cents: i64,
    pub supplier_id: Option<Uuid>,
    pub sku: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub ecommerce_enabled: bool,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn low_stock(&self) -> bool {
        self.quantity < self.reorder_level
    }

    /// An item expires once the current instant passes the start (UTC) of its
    /// expiry date.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry_date.and_then(|date| date.and_hms_opt(0, 0, 0)) {
            Some(expiry) => now > expiry.and_utc(),
            None => false,
        }
    }

    pub fn stock_value_cents(&self) -> i64 {
        i64::from(self.quantity) * self.price_cents
    }

    pub fn view(&self, now: DateTime<Utc>) -> ItemView {
        ItemView {
            id: self.id,
            name: self.name.clone(),
            category: self.category.clone(),
            quantity: self.quantity,
            reorder_level: self.reorder_level,
            price: cents_to_amount(self.price_cents),
            supplier_id: self.supplier_id,
            sku: self.sku.clone(),
            expiry_date: self.expiry_date,
            description: self.description.clone(),
            ecommerce_enabled: self.ecommerce_enabled,
            is_public: self.is_public,
            tags: self.tags.clone(),
            created_by: self.created_by,
            updated_by: self.updated_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            low_stock: self.low_stock(),
            is_expired: self.is_expired(now),
            stock_value: cents_to_amount(self.stock_value_cents()),
        }
    }
}

/// Item as returned over the API, including the derived fields computed on
/// every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub quantity: i32,
    pub reorder_level: i32,
    pub price: f64,
    pub supplier_id: Option<Uuid>,
    pub sku: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub ecommerce_enabled: bool,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub low_stock: bool,
    pub is_expired: bool,
    pub stock_value: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Sale {
    pub id: Uuid,
    pub item_id: Uuid,
    pub quantity_sold: i32,
    pub total_amount_cents: i64,
    pub sale_date: DateTime<Utc>,
    pub sold_by: Option<Uuid>,
    pub order_reference: Option<String>,
    pub order_status: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub shipping_address: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub item_name: Option<String>,
    #[sqlx(default)]
    pub sold_by_username: Option<String>,
}

impl Sale {
    pub fn view(&self) -> SaleView {
        SaleView {
            id: self.id,
            item_id: self.item_id,
            item_name: self.item_name.clone(),
            quantity_sold: self.quantity_sold,
            total_amount: cents_to_amount(self.total_amount_cents),
            date: self.sale_date,
            sold_by: self.sold_by,
            sold_by_username: self.sold_by_username.clone(),
            order_reference: self.order_reference.clone(),
            order_status: self
                .order_status
                .as_deref()
                .and_then(|status| status.parse().ok()),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleView {
    pub id: Uuid,
    pub item_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    pub quantity_sold: i32,
    pub total_amount: f64,
    pub date: DateTime<Utc>,
    pub sold_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sold_by_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_status: Option<OrderStatus>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub low_stock: bool,
    pub daily_report: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
