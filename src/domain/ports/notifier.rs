use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::entities::alert::AlertRecord;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("failed to send notification: {0}")]
    SendFailed(String),
    #[error("notification channel unavailable: {0}")]
    ChannelUnavailable(String),
}

/// Delivery-side settings the gateway re-reads whenever configuration
/// changes (batching and recipients).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeliverySettings {
    pub batch_period_m: u64,
    pub batch_max_messages: usize,
    pub mail_to: Option<String>,
    pub reply_to: Option<String>,
}

/// Outbound side of the engine: accepts alert records and owns delivery
/// policy (batching, hold windows, transport).
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Deliver (or enqueue) an alert.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError` if the alert could not be handed to the
    /// underlying channel.
    async fn send(&self, alert: &AlertRecord) -> Result<(), NotificationError>;

    /// Pause normal-priority delivery until `until`, or resume with `None`.
    fn hold(&self, _until: Option<DateTime<Utc>>) {}

    /// Apply changed delivery settings.
    fn config_changed(&self, _settings: &DeliverySettings) {}

    /// Deliver anything queued for batching.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError` if the batched delivery fails.
    async fn flush(&self) -> Result<(), NotificationError> {
        Ok(())
    }
}
