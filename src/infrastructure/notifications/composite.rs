use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::alert::AlertRecord;
use crate::domain::ports::notifier::{DeliverySettings, NotificationError, NotificationGateway};

/// Forwards alerts to multiple channels.
///
/// Calls each channel in order and returns the first error encountered (if
/// any), but always calls all channels.
pub struct CompositeChannel {
    channels: Vec<Box<dyn NotificationGateway>>,
}

impl CompositeChannel {
    #[must_use]
    pub fn new(channels: Vec<Box<dyn NotificationGateway>>) -> Self {
        Self { channels }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl Default for CompositeChannel {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl NotificationGateway for CompositeChannel {
    async fn send(&self, alert: &AlertRecord) -> Result<(), NotificationError> {
        let mut first_error = None;
        for channel in &self.channels {
            if let Err(e) = channel.send(alert).await {
                tracing::warn!("Notification failed: {e}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn hold(&self, until: Option<DateTime<Utc>>) {
        for channel in &self.channels {
            channel.hold(until);
        }
    }

    fn config_changed(&self, settings: &DeliverySettings) {
        for channel in &self.channels {
            channel.config_changed(settings);
        }
    }
}
