use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::alert::AlertRecord;
use crate::domain::ports::notifier::{DeliverySettings, NotificationError, NotificationGateway};
use crate::domain::value_objects::priority::Priority;

#[derive(Default)]
struct DispatchState {
    held_until: Option<DateTime<Utc>>,
    queue: Vec<AlertRecord>,
    settings: DeliverySettings,
}

impl DispatchState {
    fn is_held(&self, now: DateTime<Utc>) -> bool {
        self.held_until.is_some_and(|until| until > now)
    }

    const fn batching(&self) -> bool {
        self.settings.batch_period_m > 0 && self.settings.batch_max_messages > 1
    }
}

/// Delivery policy in front of the channels.
///
/// High-priority alerts go out at once, even while held. Normal alerts are
/// dropped during a hold, otherwise queued and delivered as one digest when
/// the batch is full or on the periodic flush.
pub struct NotificationDispatcher {
    channel: Box<dyn NotificationGateway>,
    state: Mutex<DispatchState>,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(channel: Box<dyn NotificationGateway>) -> Self {
        Self {
            channel,
            state: Mutex::default(),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.state().queue.len()
    }

    #[must_use]
    pub fn held_until(&self) -> Option<DateTime<Utc>> {
        self.state().held_until
    }

    /// Flush on the configured batch period for the lifetime of the process.
    pub async fn run_flusher(&self) {
        loop {
            let minutes = self.state().settings.batch_period_m.max(1);
            tokio::time::sleep(Duration::from_secs(minutes.saturating_mul(60))).await;
            if let Err(e) = self.flush().await {
                tracing::warn!("Batched notifications not delivered: {e}");
            }
        }
    }
}

#[async_trait]
impl NotificationGateway for NotificationDispatcher {
    async fn send(&self, alert: &AlertRecord) -> Result<(), NotificationError> {
        if alert.priority.is_high() {
            return self.channel.send(alert).await;
        }

        let full = {
            let mut state = self.state();
            if state.is_held(Utc::now()) {
                tracing::debug!("held, dropping [{}]", alert.subject);
                return Ok(());
            }
            if !state.batching() {
                None
            } else {
                state.queue.push(alert.clone());
                Some(state.queue.len() >= state.settings.batch_max_messages)
            }
        };

        match full {
            None => self.channel.send(alert).await,
            Some(true) => self.flush().await,
            Some(false) => Ok(()),
        }
    }

    fn hold(&self, until: Option<DateTime<Utc>>) {
        self.state().held_until = until;
        self.channel.hold(until);
    }

    fn config_changed(&self, settings: &DeliverySettings) {
        self.state().settings = settings.clone();
        self.channel.config_changed(settings);
    }

    async fn flush(&self) -> Result<(), NotificationError> {
        let queue = std::mem::take(&mut self.state().queue);
        match queue.len() {
            0 => Ok(()),
            1 => self.channel.send(&queue[0]).await,
            _ => self.channel.send(&digest(&queue)).await,
        }
    }
}

fn digest(alerts: &[AlertRecord]) -> AlertRecord {
    let mut body = String::new();
    for alert in alerts {
        let _ = writeln!(
            body,
            "== {} [{}]\n{}\n",
            alert.subject,
            alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
            alert.body
        );
    }
    let attachments = alerts
        .iter()
        .flat_map(|a| a.attachments.iter().cloned())
        .collect();
    AlertRecord::new(
        format!("{} notification(s)", alerts.len()),
        body,
        Priority::Normal,
    )
    .with_attachments(attachments)
}
