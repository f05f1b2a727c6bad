use std::{collections::HashSet, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::infrastructure::config::MailConfig;

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> anyhow::Result<()>;
}

pub fn build_mailer(config: &MailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    match config.provider.as_str() {
        "log" => Ok(Arc::new(LogMailer)),
        "memory" => Ok(Arc::new(MemoryMailer::default())),
        "http" => Ok(Arc::new(HttpMailer::new(config)?)),
        other => anyhow::bail!("unsupported mail provider: {other}"),
    }
}

/// Writes messages to the log instead of delivering them.
struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        info!(
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "mail delivery (log provider)"
        );
        Ok(())
    }
}

/// Keeps sent messages in memory. Addresses registered through
/// [`MemoryMailer::reject`] fail delivery.
#[derive(Default)]
pub struct MemoryMailer {
    sent: RwLock<Vec<Email>>,
    rejected: RwLock<HashSet<String>>,
}

impl MemoryMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.read().clone()
    }

    pub fn reject(&self, address: &str) {
        self.rejected.write().insert(address.to_ascii_lowercase());
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        if self.rejected.read().contains(&email.to.to_ascii_lowercase()) {
            anyhow::bail!("mailbox unavailable: {}", email.to);
        }
        self.sent.write().push(email.clone());
        Ok(())
    }
}

/// Posts messages as JSON to a transactional mail relay.
struct HttpMailer {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    attachments: Vec<RelayAttachment<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayAttachment<'a> {
    filename: &'a str,
    content_type: &'a str,
    content: String,
}

impl HttpMailer {
    fn new(config: &MailConfig) -> anyhow::Result<Self> {
        let raw = config
            .endpoint
            .as_deref()
            .context("mail.endpoint is required for the http provider")?;
        let endpoint = Url::parse(raw).with_context(|| format!("invalid mail.endpoint {raw}"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        let message = RelayMessage {
            from: &email.from,
            to: &email.to,
            subject: &email.subject,
            text: &email.body,
            attachments: email
                .attachments
                .iter()
                .map(|attachment| RelayAttachment {
                    filename: &attachment.filename,
                    content_type: &attachment.content_type,
                    content: base64::engine::general_purpose::STANDARD.encode(&attachment.data),
                })
                .collect(),
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request
            .send()
            .await
            .context("mail relay unreachable")?
            .error_for_status()
            .context("mail relay rejected message")?;
        Ok(())
    }
}
