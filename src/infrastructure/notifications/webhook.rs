use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::entities::alert::AlertRecord;
use crate::domain::ports::notifier::{DeliverySettings, NotificationError, NotificationGateway};

/// Webhook notification format, auto-detected from the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WebhookFormat {
    Slack,
    Discord,
    Generic,
}

/// Slack and Discord reject oversized messages.
const MAX_TEXT_LEN: usize = 3000;

/// Posts alerts to an HTTP webhook endpoint.
///
/// Supports Slack (colored attachments), Discord (embeds) and generic JSON
/// payloads. The format is auto-detected from the webhook URL.
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
    settings: Mutex<DeliverySettings>,
}

impl WebhookChannel {
    /// Every request is bounded by a 5 second timeout.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::ChannelUnavailable` when the HTTP client
    /// cannot be built.
    pub fn new(url: String) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                NotificationError::ChannelUnavailable(format!("cannot build HTTP client: {e}"))
            })?;

        Ok(Self {
            url,
            client,
            settings: Mutex::new(DeliverySettings::default()),
        })
    }

    fn detect_format(&self) -> WebhookFormat {
        // Match on the host only; paths may contain anything.
        let host = self
            .url
            .split("//")
            .nth(1)
            .and_then(|s| s.split('/').next())
            .and_then(|h| h.split(':').next())
            .unwrap_or("");

        if host == "hooks.slack.com" {
            WebhookFormat::Slack
        } else if host == "discord.com" || host == "discordapp.com" {
            WebhookFormat::Discord
        } else {
            WebhookFormat::Generic
        }
    }

    fn format_alert(&self, alert: &AlertRecord) -> Value {
        match self.detect_format() {
            WebhookFormat::Slack => Self::format_slack(alert),
            WebhookFormat::Discord => Self::format_discord(alert),
            WebhookFormat::Generic => {
                let settings = self
                    .settings
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                Self::format_generic(alert, &settings)
            }
        }
    }

    fn format_slack(alert: &AlertRecord) -> Value {
        json!({
            "attachments": [{
                "color": alert.priority.color_hex(),
                "blocks": [
                    {
                        "type": "header",
                        "text": { "type": "plain_text", "text": truncate(&alert.subject, 150) }
                    },
                    {
                        "type": "section",
                        "text": {
                            "type": "mrkdwn",
                            "text": format!("```{}```", truncate(&alert.body, MAX_TEXT_LEN))
                        }
                    }
                ]
            }]
        })
    }

    fn format_discord(alert: &AlertRecord) -> Value {
        json!({
            "username": "fleetwatch",
            "embeds": [{
                "title": truncate(&alert.subject, 256),
                "description": format!("```{}```", truncate(&alert.body, MAX_TEXT_LEN)),
                "color": alert.priority.color_decimal(),
                "timestamp": alert.timestamp.to_rfc3339()
            }]
        })
    }

    fn format_generic(alert: &AlertRecord, settings: &DeliverySettings) -> Value {
        json!({
            "source": "fleetwatch",
            "priority": alert.priority,
            "subject": &alert.subject,
            "body": &alert.body,
            "timestamp": alert.timestamp.to_rfc3339(),
            "to": settings.mail_to,
            "reply_to": settings.reply_to,
            "attachments": &alert.attachments
        })
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl NotificationGateway for WebhookChannel {
    async fn send(&self, alert: &AlertRecord) -> Result<(), NotificationError> {
        let payload = self.format_alert(alert);
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(format!("webhook error: {e}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotificationError::SendFailed(format!("webhook HTTP {status}")))
        }
    }

    fn config_changed(&self, settings: &DeliverySettings) {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings.clone();
    }
}
