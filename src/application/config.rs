use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::ports::notifier::DeliverySettings;
use crate::domain::rules::probe::MetricProbeRule;

/// Top-level application configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub web_config: WebConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Turn on debug-level logging without `--verbose`.
    #[serde(default)]
    pub debug_log: bool,
}

/// Alerting rules and event policy. Everything here except `apps_included`
/// can be overwritten by the remote configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Lifecycle event names to report; all when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<String>>,
    #[serde(default)]
    pub metric: BTreeMap<String, MetricProbeRule>,
    #[serde(default = "default_true")]
    pub exceptions: bool,
    #[serde(default = "default_true")]
    pub messages: bool,
    #[serde(default)]
    pub message_exclude_exps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apps_included: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apps_excluded: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_interval_s: Option<u64>,
    #[serde(default)]
    pub add_logs: bool,
    #[serde(default = "default_alive_timeout")]
    pub alive_timeout_s: u64,
}

/// Delivery channels and batching policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub terminal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default = "default_batch_period")]
    pub batch_period_m: u64,
    #[serde(default = "default_batch_max")]
    pub batch_max_messages: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub user: String,
    #[serde(default)]
    pub password: String,
}

/// Metric history digest target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<BasicAuth>,
    #[serde(default = "default_digest_period")]
    pub digest_period_m: u64,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default = "default_dump_path")]
    pub dump_path: String,
}

/// Remote configuration endpoint; disabled when `url` is unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<BasicAuth>,
    /// Refetch period; 0 fetches once at startup only.
    #[serde(default)]
    pub fetch_interval_m: u64,
}

/// How to reach the process manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Name this engine runs under; never monitored.
    #[serde(default = "default_identity")]
    pub identity: String,
    #[serde(default = "default_list_command")]
    pub list_command: Vec<String>,
    #[serde(default = "default_event_socket")]
    pub event_socket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_socket")]
    pub socket_path: String,
    #[serde(default = "default_debug_dir")]
    pub debug_dir: String,
}

// --- Defaults ---

const fn default_true() -> bool {
    true
}

const fn default_alive_timeout() -> u64 {
    60
}

const fn default_batch_period() -> u64 {
    15
}

const fn default_batch_max() -> usize {
    20
}

const fn default_digest_period() -> u64 {
    60
}

const fn default_history_size() -> usize {
    60
}

fn default_dump_path() -> String {
    "~/.local/share/fleetwatch/snapshot-dump.json".into()
}

fn default_identity() -> String {
    "fleetwatch".into()
}

fn default_list_command() -> Vec<String> {
    vec!["pm2".into(), "jlist".into()]
}

fn default_event_socket() -> String {
    "~/.pm2/fleetwatch-bus.sock".into()
}

fn default_admin_socket() -> String {
    "~/.local/share/fleetwatch/admin.sock".into()
}

fn default_debug_dir() -> String {
    ".".into()
}

// --- Default impls ---

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            events: None,
            metric: BTreeMap::new(),
            exceptions: default_true(),
            messages: default_true(),
            message_exclude_exps: Vec::new(),
            apps_included: None,
            apps_excluded: None,
            metric_interval_s: None,
            add_logs: false,
            alive_timeout_s: default_alive_timeout(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            terminal: default_true(),
            log_file: None,
            webhook_url: None,
            batch_period_m: default_batch_period(),
            batch_max_messages: default_batch_max(),
            mail_to: None,
            reply_to: None,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            url: None,
            auth: None,
            digest_period_m: default_digest_period(),
            history_size: default_history_size(),
            dump_path: default_dump_path(),
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            identity: default_identity(),
            list_command: default_list_command(),
            event_socket: default_event_socket(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            socket_path: default_admin_socket(),
            debug_dir: default_debug_dir(),
        }
    }
}

impl NotificationConfig {
    #[must_use]
    pub fn delivery_settings(&self) -> DeliverySettings {
        DeliverySettings {
            batch_period_m: self.batch_period_m,
            batch_max_messages: self.batch_max_messages,
            mail_to: self.mail_to.clone(),
            reply_to: self.reply_to.clone(),
        }
    }
}

// --- Remote merge ---

/// Keys a remote configuration may overwrite, by wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteKey {
    Events,
    Metric,
    Exceptions,
    Messages,
    MessageExcludeExps,
    AppsExcluded,
    MetricIntervalS,
    AddLogs,
    AliveTimeoutS,
    BatchPeriodM,
    BatchMaxMessages,
    MailTo,
    ReplyTo,
}

impl RemoteKey {
    pub const ALL: [Self; 13] = [
        Self::Events,
        Self::Metric,
        Self::Exceptions,
        Self::Messages,
        Self::MessageExcludeExps,
        Self::AppsExcluded,
        Self::MetricIntervalS,
        Self::AddLogs,
        Self::AliveTimeoutS,
        Self::BatchPeriodM,
        Self::BatchMaxMessages,
        Self::MailTo,
        Self::ReplyTo,
    ];

    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Metric => "metric",
            Self::Exceptions => "exceptions",
            Self::Messages => "messages",
            Self::MessageExcludeExps => "messageExcludeExps",
            Self::AppsExcluded => "appsExcluded",
            Self::MetricIntervalS => "metricIntervalS",
            Self::AddLogs => "addLogs",
            Self::AliveTimeoutS => "aliveTimeoutS",
            Self::BatchPeriodM => "batchPeriodM",
            Self::BatchMaxMessages => "batchMaxMessages",
            Self::MailTo => "mailTo",
            Self::ReplyTo => "replyTo",
        }
    }
}

impl std::fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// The part of the configuration that can change at runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuntimeSettings {
    pub monitor: MonitorConfig,
    pub notifications: NotificationConfig,
}

impl RuntimeSettings {
    /// Overwrite every whitelisted key present and non-null in `partial`.
    ///
    /// Keys outside the whitelist are ignored. A key whose value has the
    /// wrong shape is logged and skipped without affecting the others.
    /// Returns the keys that were applied, in whitelist order.
    pub fn apply_remote(&mut self, partial: &Map<String, Value>) -> Vec<RemoteKey> {
        let mut applied = Vec::new();
        for key in RemoteKey::ALL {
            let Some(value) = partial.get(key.wire_name()).filter(|v| !v.is_null()) else {
                continue;
            };
            match self.apply_key(key, value) {
                Ok(()) => {
                    tracing::info!("applying [{key}] = {value}");
                    applied.push(key);
                }
                Err(e) => tracing::warn!("ignoring remote [{key}]: {e}"),
            }
        }
        applied
    }

    fn apply_key(&mut self, key: RemoteKey, value: &Value) -> serde_json::Result<()> {
        let monitor = &mut self.monitor;
        let notifications = &mut self.notifications;
        match key {
            RemoteKey::Events => monitor.events = Some(decode(value)?),
            RemoteKey::Metric => monitor.metric = decode(value)?,
            RemoteKey::Exceptions => monitor.exceptions = decode(value)?,
            RemoteKey::Messages => monitor.messages = decode(value)?,
            RemoteKey::MessageExcludeExps => monitor.message_exclude_exps = decode(value)?,
            RemoteKey::AppsExcluded => monitor.apps_excluded = Some(decode(value)?),
            RemoteKey::MetricIntervalS => monitor.metric_interval_s = Some(decode(value)?),
            RemoteKey::AddLogs => monitor.add_logs = decode(value)?,
            RemoteKey::AliveTimeoutS => monitor.alive_timeout_s = decode(value)?,
            RemoteKey::BatchPeriodM => notifications.batch_period_m = decode(value)?,
            RemoteKey::BatchMaxMessages => notifications.batch_max_messages = decode(value)?,
            RemoteKey::MailTo => notifications.mail_to = Some(decode(value)?),
            RemoteKey::ReplyTo => notifications.reply_to = Some(decode(value)?),
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(value: &Value) -> serde_json::Result<T> {
    T::deserialize(value)
}

// --- AppConfig methods ---

impl AppConfig {
    /// Load config from default path or create default config file
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined,
    /// the file cannot be read, or the TOML content is invalid.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_or_create(&path)
    }

    /// Load from a specific path, or create a default config file if missing
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML content is invalid,
    /// or the default config file cannot be written.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Load from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML content is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save config to a specific path, creating parent directories if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created,
    /// serialization fails, or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("fleetwatch").join("config.toml"))
    }

    #[must_use]
    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            monitor: self.monitor.clone(),
            notifications: self.notifications.clone(),
        }
    }
}

/// Expand a leading `~` in a configured path.
#[must_use]
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}
