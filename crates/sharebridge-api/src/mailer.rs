use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use serde::Serialize;
use tracing::info;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound email. Delivery itself belongs to an external service.
pub trait Mailer: Send + Sync {
    fn send(&self, mail: Mail) -> BoxFuture<'_, Result<()>>;
}

/// Writes mail to the log instead of delivering it. Development default.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: Mail) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            info!(to = %mail.to, subject = %mail.subject, "Mail (not delivered): {}", mail.body);
            Ok(())
        })
    }
}

/// Posts mail as JSON to an HTTP relay (any transactional mail API that
/// accepts `{from, to, subject, text}`).
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: Option<String>, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            from,
        }
    }
}

impl Mailer for HttpMailer {
    fn send(&self, mail: Mail) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let payload = RelayPayload {
                from: &self.from,
                to: &mail.to,
                subject: &mail.subject,
                text: &mail.body,
            };

            let mut request = self.client.post(&self.endpoint).json(&payload);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            request
                .send()
                .await
                .context("mail relay unreachable")?
                .error_for_status()
                .context("mail relay rejected message")?;

            info!(to = %mail.to, subject = %mail.subject, "Mail handed to relay");
            Ok(())
        })
    }
}

pub fn from_config(config: &Config) -> Arc<dyn Mailer> {
    match &config.mail_relay_url {
        Some(url) => {
            info!("Mail relay: {}", url);
            Arc::new(HttpMailer::new(url.clone(), config.mail_api_key.clone(), config.mail_from.clone()))
        }
        None => {
            info!("No mail relay configured, mail will only be logged");
            Arc::new(LogMailer)
        }
    }
}
