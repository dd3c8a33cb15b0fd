use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::entities::alert::AlertRecord;
use crate::domain::ports::notifier::{DeliverySettings, NotificationError, NotificationGateway};

const DEFAULT_LOG_PATH: &str = "~/.local/share/fleetwatch/alerts.log";

/// Appends every alert as one JSON line.
pub struct LogFileChannel {
    path: PathBuf,
    recipients: Mutex<Option<String>>,
}

impl LogFileChannel {
    #[must_use]
    pub fn new(path: &str) -> Self {
        let expanded = shellexpand::tilde(path);
        Self {
            path: PathBuf::from(expanded.as_ref()),
            recipients: Mutex::new(None),
        }
    }

    fn append_json_line(&self, value: &serde_json::Value) -> Result<(), NotificationError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                NotificationError::SendFailed(format!("cannot create log directory: {e}"))
            })?;
        }

        let json = serde_json::to_string(value)
            .map_err(|e| NotificationError::SendFailed(format!("JSON serialization: {e}")))?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| NotificationError::SendFailed(format!("cannot open alert log: {e}")))?;

        writeln!(file, "{json}")
            .map_err(|e| NotificationError::SendFailed(format!("cannot write alert log: {e}")))
    }
}

impl Default for LogFileChannel {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_PATH)
    }
}

#[async_trait]
impl NotificationGateway for LogFileChannel {
    async fn send(&self, alert: &AlertRecord) -> Result<(), NotificationError> {
        let to = self
            .recipients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let entry = serde_json::json!({
            "timestamp": alert.timestamp.to_rfc3339(),
            "priority": alert.priority,
            "subject": alert.subject,
            "body": alert.body,
            "to": to,
            "attachments": alert.attachments,
        });

        self.append_json_line(&entry)
    }

    fn config_changed(&self, settings: &DeliverySettings) {
        *self.recipients.lock().unwrap_or_else(PoisonError::into_inner) = settings.mail_to.clone();
    }
}
