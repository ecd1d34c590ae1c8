//! HTTP sender for webhook, Slack and Discord notifications.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header::HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::ChannelSender;
use crate::notification::types::{Notification, NotificationPriority};
use crate::{Error, Result};

/// Body layout expected by the receiving endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// The full notification as JSON.
    #[default]
    Generic,
    /// Slack incoming webhook (`text` plus optional `channel`).
    Slack,
    /// Discord webhook with a single embed.
    Discord,
}

/// Webhook sender configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Endpoint used when the notification's channel is not itself a URL.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format: PayloadFormat,
    /// Custom headers.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub auth: Option<WebhookAuth>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

/// Webhook authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebhookAuth {
    Bearer { token: String },
    Basic { username: String, password: String },
    Header { name: String, value: String },
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            format: PayloadFormat::Generic,
            headers: Vec::new(),
            auth: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>, format: PayloadFormat) -> Self {
        Self {
            url: Some(url.into()),
            format,
            ..Default::default()
        }
    }
}

/// Posts notifications to an HTTP endpoint.
pub struct WebhookSender {
    config: WebhookConfig,
    client: Client,
}

impl WebhookSender {
    pub fn new(config: WebhookConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    fn is_url(value: &str) -> bool {
        value.starts_with("http://") || value.starts_with("https://")
    }

    /// Where to post `notification`.
    ///
    /// A URL in the notification's channel wins over the configured one.
    fn target_url<'a>(&'a self, notification: &'a Notification) -> Result<&'a str> {
        if Self::is_url(&notification.channel) {
            return Ok(&notification.channel);
        }
        self.config.url.as_deref().ok_or_else(|| {
            Error::config(format!(
                "no webhook URL for {} notification {}",
                notification.kind, notification.id
            ))
        })
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        for (name, value) in &self.config.headers {
            if let (Ok(name), Ok(value)) = (
                name.parse::<reqwest::header::HeaderName>(),
                value.parse::<reqwest::header::HeaderValue>(),
            ) {
                headers.insert(name, value);
            }
        }

        match &self.config.auth {
            Some(WebhookAuth::Bearer { token }) => {
                if let Ok(value) = format!("Bearer {}", token).parse() {
                    headers.insert(reqwest::header::AUTHORIZATION, value);
                }
            }
            Some(WebhookAuth::Header { name, value }) => {
                if let (Ok(name), Ok(value)) = (
                    name.parse::<reqwest::header::HeaderName>(),
                    value.parse::<reqwest::header::HeaderValue>(),
                ) {
                    headers.insert(name, value);
                }
            }
            // Applied on the request builder.
            Some(WebhookAuth::Basic { .. }) | None => {}
        }

        headers
    }

    fn discord_color(priority: NotificationPriority) -> u32 {
        match priority {
            NotificationPriority::Low => 0x95a5a6,
            NotificationPriority::Normal => 0x3498db,
            NotificationPriority::High => 0xe67e22,
            NotificationPriority::Critical => 0xe74c3c,
        }
    }

    fn build_payload(&self, notification: &Notification) -> serde_json::Value {
        match self.config.format {
            PayloadFormat::Generic => json!({
                "id": notification.id,
                "type": notification.kind,
                "trigger": notification.trigger,
                "priority": notification.priority,
                "user_id": notification.user_id,
                "task_id": notification.task_id,
                "title": notification.title,
                "message": notification.message,
                "created_at": notification.created_at.to_rfc3339(),
                "metadata": notification.metadata,
            }),
            PayloadFormat::Slack => {
                let mut payload = json!({
                    "text": format!("*{}*\n{}", notification.title, notification.message),
                });
                if !notification.channel.is_empty() && !Self::is_url(&notification.channel) {
                    payload["channel"] = json!(notification.channel);
                }
                payload
            }
            PayloadFormat::Discord => json!({
                "embeds": [{
                    "title": notification.title,
                    "description": notification.message,
                    "color": Self::discord_color(notification.priority),
                    "timestamp": notification.created_at.to_rfc3339(),
                }]
            }),
        }
    }
}

#[async_trait]
impl ChannelSender for WebhookSender {
    fn name(&self) -> &'static str {
        match self.config.format {
            PayloadFormat::Generic => "webhook",
            PayloadFormat::Slack => "slack",
            PayloadFormat::Discord => "discord",
        }
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let url = self.target_url(notification)?;
        let payload = self.build_payload(notification);

        let mut request = self
            .client
            .post(url)
            .headers(self.build_headers())
            .json(&payload);
        if let Some(WebhookAuth::Basic { username, password }) = &self.config.auth {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(
                notification_id = notification.id,
                "{} webhook failed: {} - {}",
                self.name(),
                status,
                body
            );
            return Err(Error::send(format!("webhook returned {}: {}", status, body)));
        }

        debug!(
            notification_id = notification.id,
            "{} notification posted",
            self.name()
        );
        Ok(())
    }
}
