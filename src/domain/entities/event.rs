use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::process::ProcessRef;

/// An event published on the process manager's bus, tagged by `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BusEvent {
    #[serde(rename = "process:event")]
    Lifecycle(LifecycleEvent),
    #[serde(rename = "process:exception")]
    Exception(ExceptionEvent),
    #[serde(rename = "process:msg")]
    Message(MessageEvent),
}

impl BusEvent {
    #[must_use]
    pub const fn process(&self) -> &EventProcess {
        match self {
            Self::Lifecycle(e) => &e.process,
            Self::Exception(e) => &e.process,
            Self::Message(e) => &e.process,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Lifecycle(_) => "lifecycle",
            Self::Exception(_) => "exception",
            Self::Message(_) => "message",
        }
    }
}

/// Process descriptor carried by bus events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventProcess {
    pub name: String,
    pub pm_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm_err_log_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm_out_log_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventProcess {
    #[must_use]
    pub fn new(name: impl Into<String>, pm_id: u32) -> Self {
        Self {
            name: name.into(),
            pm_id,
            pm_err_log_path: None,
            pm_out_log_path: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn process_ref(&self) -> ProcessRef {
        ProcessRef::new(self.name.clone(), self.pm_id)
    }

    /// Log file paths present on the payload, error log first.
    pub fn log_paths(&self) -> impl Iterator<Item = &str> {
        [&self.pm_err_log_path, &self.pm_out_log_path]
            .into_iter()
            .filter_map(|p| p.as_deref())
    }
}

/// Lifecycle transition (start, stop, restart, exit, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub event: String,
    /// Set when the transition was triggered by an operator.
    #[serde(default)]
    pub manually: bool,
    pub process: EventProcess,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Uncaught exception reported by a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionEvent {
    pub process: EventProcess,
    #[serde(default)]
    pub data: Value,
}

/// Free-form message sent by a process. The string `"alive"` is reserved for
/// liveness signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub process: EventProcess,
    #[serde(default)]
    pub data: Value,
}

pub const ALIVE_TOKEN: &str = "alive";

impl MessageEvent {
    #[must_use]
    pub fn is_alive_signal(&self) -> bool {
        self.data.as_str() == Some(ALIVE_TOKEN)
    }
}
