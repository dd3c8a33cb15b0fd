use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::priority::Priority;

/// A human-facing alert, immutable once built and handed to the
/// notification gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub subject: String,
    pub body: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl AlertRecord {
    #[must_use]
    pub fn new(subject: impl Into<String>, body: impl Into<String>, priority: Priority) -> Self {
        Self {
            timestamp: Utc::now(),
            subject: subject.into(),
            body: body.into(),
            priority,
            attachments: Vec::new(),
        }
    }

    #[must_use]
    pub fn high(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(subject, body, Priority::High)
    }

    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// A file referenced by an alert (typically a process log).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub path: String,
}

impl Attachment {
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let filename = Path::new(path)
            .file_name()
            .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            filename,
            path: path.to_string(),
        }
    }
}
