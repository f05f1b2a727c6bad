//! Low-stock and daily inventory emails.
//!
//! Each delivery is attempted independently; one failing recipient never
//! stops the rest. The scheduler logs the outcome, while manual triggers
//! surface a total delivery failure to the caller.

use std::{fmt::Write as _, sync::Arc};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    domain::{models::Item, money::cents_to_amount},
    infrastructure::{
        mailer::{Attachment, Email},
        state::AppState,
    },
};

use super::{
    errors::ServiceError,
    export::{self, CSV_CONTENT_TYPE},
    items::{supplier_names, ITEM_COLUMNS},
    recipients::{RecipientService, Subscription},
    reports::ReportService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    LowStock,
    DailyReport,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LowStock => "low-stock",
            AlertKind::DailyReport => "daily-report",
        }
    }

    fn subscription(&self) -> Subscription {
        match self {
            AlertKind::LowStock => Subscription::LowStock,
            AlertKind::DailyReport => Subscription::DailyReport,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailedDelivery {
    pub recipient: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertOutcome {
    pub kind: AlertKind,
    pub items: usize,
    pub recipients: Vec<String>,
    pub delivered: usize,
    pub failed: Vec<FailedDelivery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl AlertOutcome {
    fn skipped(kind: AlertKind, items: usize, reason: &str) -> Self {
        Self {
            kind,
            items,
            recipients: Vec::new(),
            delivered: 0,
            failed: Vec::new(),
            skipped: Some(reason.to_string()),
        }
    }

    /// True when at least one send was attempted and none succeeded.
    pub fn all_failed(&self) -> bool {
        !self.recipients.is_empty() && self.delivered == 0
    }
}

pub struct AlertService {
    state: Arc<AppState>,
}

impl AlertService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Runs a job on behalf of an operator.
    pub async fn trigger(&self, kind: AlertKind) -> Result<AlertOutcome, ServiceError> {
        let outcome = self.run(kind).await?;
        if outcome.all_failed() {
            let detail = outcome
                .failed
                .iter()
                .map(|failure| format!("{}: {}", failure.recipient, failure.error))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ServiceError::Delivery(detail));
        }
        Ok(outcome)
    }

    pub async fn run(&self, kind: AlertKind) -> Result<AlertOutcome, ServiceError> {
        match kind {
            AlertKind::LowStock => self.run_low_stock().await,
            AlertKind::DailyReport => self.run_daily_report().await,
        }
    }

    async fn run_low_stock(&self) -> Result<AlertOutcome, ServiceError> {
        let kind = AlertKind::LowStock;
        let items = ReportService::new(Arc::clone(&self.state))
            .low_stock_items()
            .await?;
        if items.is_empty() {
            return Ok(AlertOutcome::skipped(kind, 0, "no items below reorder level"));
        }

        let subject = format!("Low stock alert: {} item(s) below reorder level", items.len());
        let body = low_stock_body(&items);
        self.deliver(kind, items.len(), subject, body, Vec::new())
            .await
    }

    async fn run_daily_report(&self) -> Result<AlertOutcome, ServiceError> {
        let kind = AlertKind::DailyReport;
        let now = Utc::now();
        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY category, name"
        ))
        .fetch_all(&self.state.pool)
        .await?;
        let suppliers = supplier_names(&self.state).await?;
        let csv = export::items_csv(&items, &suppliers, now)?;

        let date = now.format("%Y-%m-%d");
        let attachment = Attachment {
            filename: format!("inventory-{date}.csv"),
            content_type: CSV_CONTENT_TYPE.to_string(),
            data: Bytes::from(csv),
        };
        let subject = format!("Daily inventory report {date}");
        let body = daily_report_body(&items, now);
        self.deliver(kind, items.len(), subject, body, vec![attachment])
            .await
    }

    async fn recipients(&self, kind: AlertKind) -> Result<Vec<String>, ServiceError> {
        let subscribed = RecipientService::new(Arc::clone(&self.state))
            .subscribed(kind.subscription())
            .await?;
        if !subscribed.is_empty() {
            return Ok(subscribed);
        }
        Ok(self
            .state
            .config
            .mail
            .fallback_recipient
            .iter()
            .map(|address| address.trim().to_string())
            .filter(|address| !address.is_empty())
            .collect())
    }

    async fn deliver(
        &self,
        kind: AlertKind,
        items: usize,
        subject: String,
        body: String,
        attachments: Vec<Attachment>,
    ) -> Result<AlertOutcome, ServiceError> {
        let recipients = self.recipients(kind).await?;
        if recipients.is_empty() {
            warn!(kind = kind.as_str(), "no alert recipients configured");
            return Ok(AlertOutcome::skipped(kind, items, "no recipients configured"));
        }

        let from = self.state.config.mail.from_address.clone();
        let emails: Vec<Email> = recipients
            .iter()
            .map(|to| Email {
                from: from.clone(),
                to: to.clone(),
                subject: subject.clone(),
                body: body.clone(),
                attachments: attachments.clone(),
            })
            .collect();

        let mailer = &self.state.mailer;
        let results = join_all(emails.iter().map(|email| mailer.send(email))).await;

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (email, result) in emails.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(kind = kind.as_str(), to = %email.to, error = %err, "alert delivery failed");
                    failed.push(FailedDelivery {
                        recipient: email.to.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            kind = kind.as_str(),
            items,
            delivered,
            failed = failed.len(),
            "alert job finished"
        );
        Ok(AlertOutcome {
            kind,
            items,
            recipients,
            delivered,
            failed,
            skipped: None,
        })
    }
}

fn low_stock_body(items: &[Item]) -> String {
    let mut body = String::from("The following items are below their reorder level:\n\n");
    for item in items {
        let sku = item
            .sku
            .as_deref()
            .map(|sku| format!(" [{sku}]"))
            .unwrap_or_default();
        let _ = writeln!(
            body,
            "- {}{}: {} on hand, reorder level {}",
            item.name, sku, item.quantity, item.reorder_level
        );
    }
    body
}

fn daily_report_body(items: &[Item], now: DateTime<Utc>) -> String {
    let units: i64 = items.iter().map(|item| i64::from(item.quantity)).sum();
    let value_cents: i64 = items.iter().map(Item::stock_value_cents).sum();
    let low = items.iter().filter(|item| item.low_stock()).count();
    let expired = items.iter().filter(|item| item.is_expired(now)).count();

    let mut body = format!("Inventory snapshot for {}\n\n", now.format("%Y-%m-%d"));
    let _ = writeln!(body, "Items: {}", items.len());
    let _ = writeln!(body, "Units in stock: {units}");
    let _ = writeln!(body, "Stock value: {:.2}", cents_to_amount(value_cents));
    let _ = writeln!(body, "Below reorder level: {low}");
    let _ = writeln!(body, "Expired: {expired}");
    body.push_str("\nThe full inventory is attached as CSV.\n");
    body
}
