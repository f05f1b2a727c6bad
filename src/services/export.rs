//! CSV rendering for exports and the daily snapshot attachment, and CSV
//! parsing for item imports.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    models::{Item, Sale},
    money::{amount_to_cents, cents_to_amount},
};

use super::errors::ServiceError;

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

fn csv_error(err: impl std::fmt::Display) -> ServiceError {
    ServiceError::Internal(format!("csv encoding failed: {err}"))
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ServiceError> {
    let bytes = writer.into_inner().map_err(csv_error)?;
    String::from_utf8(bytes).map_err(csv_error)
}

fn supplier_name<'a>(suppliers: &'a HashMap<Uuid, String>, id: Option<Uuid>) -> &'a str {
    id.and_then(|id| suppliers.get(&id))
        .map(String::as_str)
        .unwrap_or("")
}

pub fn items_csv(
    items: &[Item],
    suppliers: &HashMap<Uuid, String>,
    now: DateTime<Utc>,
) -> Result<String, ServiceError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "name",
            "category",
            "sku",
            "quantity",
            "reorderLevel",
            "price",
            "supplier",
            "expiryDate",
            "lowStock",
            "isExpired",
            "stockValue",
        ])
        .map_err(csv_error)?;
    for item in items {
        writer
            .write_record([
                item.name.clone(),
                item.category.clone(),
                item.sku.clone().unwrap_or_default(),
                item.quantity.to_string(),
                item.reorder_level.to_string(),
                format!("{:.2}", cents_to_amount(item.price_cents)),
                supplier_name(suppliers, item.supplier_id).to_string(),
                item.expiry_date
                    .map(|date| date.to_string())
                    .unwrap_or_default(),
                item.low_stock().to_string(),
                item.is_expired(now).to_string(),
                format!("{:.2}", cents_to_amount(item.stock_value_cents())),
            ])
            .map_err(csv_error)?;
    }
    finish(writer)
}

pub fn low_stock_csv(
    items: &[Item],
    suppliers: &HashMap<Uuid, String>,
) -> Result<String, ServiceError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "name",
            "sku",
            "category",
            "quantity",
            "reorderLevel",
            "shortfall",
            "supplier",
        ])
        .map_err(csv_error)?;
    for item in items {
        writer
            .write_record([
                item.name.clone(),
                item.sku.clone().unwrap_or_default(),
                item.category.clone(),
                item.quantity.to_string(),
                item.reorder_level.to_string(),
                (item.reorder_level - item.quantity).max(0).to_string(),
                supplier_name(suppliers, item.supplier_id).to_string(),
            ])
            .map_err(csv_error)?;
    }
    finish(writer)
}

pub fn sales_csv(sales: &[Sale]) -> Result<String, ServiceError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "date",
            "item",
            "quantitySold",
            "totalAmount",
            "soldBy",
            "orderReference",
            "orderStatus",
        ])
        .map_err(csv_error)?;
    for sale in sales {
        writer
            .write_record([
                sale.sale_date.to_rfc3339(),
                sale.item_name.clone().unwrap_or_default(),
                sale.quantity_sold.to_string(),
                format!("{:.2}", cents_to_amount(sale.total_amount_cents)),
                sale.sold_by_username.clone().unwrap_or_default(),
                sale.order_reference.clone().unwrap_or_default(),
                sale.order_status.clone().unwrap_or_default(),
            ])
            .map_err(csv_error)?;
    }
    finish(writer)
}

#[derive(Debug, Deserialize)]
struct ImportRecord {
    name: String,
    category: String,
    quantity: Option<i32>,
    #[serde(rename = "reorderLevel")]
    reorder_level: Option<i32>,
    price: Option<f64>,
    sku: Option<String>,
    supplier: Option<String>,
    #[serde(rename = "expiryDate")]
    expiry_date: Option<NaiveDate>,
}

/// A validated import line.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub line: usize,
    pub name: String,
    pub category: String,
    pub quantity: i32,
    pub reorder_level: i32,
    pub price_cents: i64,
    pub sku: Option<String>,
    pub supplier: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_record(line: usize, record: ImportRecord) -> Result<ImportRow, RowError> {
    let fail = |message: &str| RowError {
        line,
        message: message.to_string(),
    };
    let name = record.name.trim().to_string();
    let category = record.category.trim().to_string();
    if name.is_empty() {
        return Err(fail("name is required"));
    }
    if category.is_empty() {
        return Err(fail("category is required"));
    }
    let quantity = record.quantity.unwrap_or(0);
    if quantity < 0 {
        return Err(fail("quantity must be zero or greater"));
    }
    let reorder_level = record.reorder_level.unwrap_or(0);
    if reorder_level < 0 {
        return Err(fail("reorderLevel must be zero or greater"));
    }
    let price_cents = amount_to_cents(record.price.unwrap_or(0.0))
        .ok_or_else(|| fail("price must be zero or greater"))?;

    Ok(ImportRow {
        line,
        name,
        category,
        quantity,
        reorder_level,
        price_cents,
        sku: non_empty(record.sku),
        supplier: non_empty(record.supplier),
        expiry_date: record.expiry_date,
    })
}

/// Parses an item CSV with a header row. Line numbers are 1-based and count
/// the header, so the first data row is line 2.
pub fn parse_item_rows(body: &str) -> Vec<Result<ImportRow, RowError>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());
    reader
        .deserialize::<ImportRecord>()
        .enumerate()
        .map(|(index, record)| {
            let line = index + 2;
            match record {
                Ok(record) => validate_record(line, record),
                Err(err) => Err(RowError {
                    line,
                    message: format!("malformed row: {err}"),
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, quantity: i32, reorder_level: i32, price_cents: i64) -> Item {
        let now = Utc::now();
        Item {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category: "Pantry".to_string(),
            quantity,
            reorder_level,
            price_cents,
            supplier_id: None,
            sku: Some(format!("SKU-{name}")),
            expiry_date: None,
            description: None,
            ecommerce_enabled: false,
            is_public: false,
            tags: Vec::new(),
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn items_csv_includes_derived_columns() {
        let supplier_id = Uuid::new_v4();
        let mut rice = item("Rice, long grain", 3, 5, 250);
        rice.supplier_id = Some(supplier_id);
        let suppliers = HashMap::from([(supplier_id, "Acme Foods".to_string())]);

        let csv = items_csv(&[rice], &suppliers, Utc::now()).unwrap();
        let mut lines = csv.lines();

        assert!(lines.next().unwrap().starts_with("name,category,sku"));
        assert_eq!(
            lines.next().unwrap(),
            "\"Rice, long grain\",Pantry,\"SKU-Rice, long grain\",3,5,2.50,Acme Foods,,true,false,7.50"
        );
    }

    #[test]
    fn low_stock_csv_reports_shortfall() {
        let csv = low_stock_csv(&[item("Beans", 2, 10, 100)], &HashMap::new()).unwrap();
        assert!(csv.lines().nth(1).unwrap().contains(",2,10,8,"));
    }

    #[test]
    fn import_collects_valid_rows_and_row_errors() {
        let body = "name,category,quantity,reorderLevel,price,sku,supplier,expiryDate\n\
                    Flour,Baking,20,5,3.49,FL-1,Acme,2025-01-31\n\
                    ,Baking,1,1,1.00,,,\n\
                    Sugar,Baking,-3,1,1.00,,,\n\
                    Salt,Baking,lots,1,1.00,,,\n\
                    Yeast,Baking,,,,,,\n";

        let rows = parse_item_rows(body);

        assert_eq!(rows.len(), 5);
        let flour = rows[0].as_ref().unwrap();
        assert_eq!(flour.line, 2);
        assert_eq!(flour.price_cents, 349);
        assert_eq!(flour.sku.as_deref(), Some("FL-1"));
        assert_eq!(flour.expiry_date, NaiveDate::from_ymd_opt(2025, 1, 31));

        assert_eq!(rows[1].as_ref().unwrap_err().message, "name is required");
        assert_eq!(
            rows[2].as_ref().unwrap_err().message,
            "quantity must be zero or greater"
        );
        assert!(rows[3]
            .as_ref()
            .unwrap_err()
            .message
            .starts_with("malformed row"));

        let yeast = rows[4].as_ref().unwrap();
        assert_eq!(yeast.quantity, 0);
        assert_eq!(yeast.sku, None);
    }
}
