use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity of a supervised process: its name and the manager-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessRef {
    pub name: String,
    pub pm_id: u32,
}

impl ProcessRef {
    #[must_use]
    pub fn new(name: impl Into<String>, pm_id: u32) -> Self {
        Self {
            name: name.into(),
            pm_id,
        }
    }
}

impl std::fmt::Display for ProcessRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.pm_id)
    }
}

/// One entry of the process manager's process list.
///
/// Mirrors the listing JSON closely enough to pull metrics out of it;
/// unrecognized fields are kept in `extra` so debug dumps stay complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessListing {
    pub name: String,
    pub pm_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monit: Option<ProcessMonit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm2_env: Option<ProcessEnv>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Resource usage sampled by the process manager.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessMonit {
    /// Resident memory in bytes
    #[serde(default)]
    pub memory: u64,
    /// CPU usage in percent
    #[serde(default)]
    pub cpu: f64,
}

/// Manager-side environment of a process, including exported custom metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessEnv {
    #[serde(default)]
    pub axm_monitor: BTreeMap<String, ExportedMetric>,
    #[serde(default, rename = "_pm2_version", skip_serializing_if = "Option::is_none")]
    pub pm2_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A custom metric exported by the process itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedMetric {
    #[serde(default)]
    pub value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProcessListing {
    #[must_use]
    pub fn process_ref(&self) -> ProcessRef {
        ProcessRef::new(self.name.clone(), self.pm_id)
    }
}
