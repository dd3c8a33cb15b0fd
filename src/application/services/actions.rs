use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use thiserror::Error;

use super::config_store::ConfigStore;
use crate::domain::entities::alert::AlertRecord;
use crate::domain::ports::notifier::{NotificationError, NotificationGateway};
use crate::domain::ports::process_manager::{ManagerError, ProcessManager};
use crate::domain::ports::store::SnapshotStore;

/// Hold duration when none (or garbage) is given.
pub const HOLD_PERIOD_M: i64 = 30;

pub const DEBUG_LISTING_FILE: &str = "fleetwatch-debug.json";
pub const DEBUG_CONFIG_FILE: &str = "fleetwatch-config.json";

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("mail failed: {0}")]
    Mail(#[from] NotificationError),
    #[error("debug failed: {0}")]
    Listing(#[from] ManagerError),
    #[error("debug failed: {0}")]
    Write(String),
    #[error("hold failed: {0} minutes is out of range")]
    HoldOutOfRange(i64),
    #[error("unknown action: {0}")]
    Unknown(String),
}

/// Administrative request, as sent over the control socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    Hold(Option<String>),
    Unheld,
    Mail,
    Dump,
    Debug,
}

impl FromStr for AdminAction {
    type Err = ActionError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.trim().splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());
        match name {
            "hold" => Ok(Self::Hold(arg.map(ToString::to_string))),
            "unheld" => Ok(Self::Unheld),
            "mail" => Ok(Self::Mail),
            "dump" => Ok(Self::Dump),
            "debug" => Ok(Self::Debug),
            other => Err(ActionError::Unknown(other.to_string())),
        }
    }
}

impl std::fmt::Display for AdminAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hold(Some(arg)) => write!(f, "hold {arg}"),
            Self::Hold(None) => f.write_str("hold"),
            Self::Unheld => f.write_str("unheld"),
            Self::Mail => f.write_str("mail"),
            Self::Dump => f.write_str("dump"),
            Self::Debug => f.write_str("debug"),
        }
    }
}

/// Leading integer of `arg` (`"15m"` is 15), or the default hold period.
#[must_use]
pub fn hold_minutes(arg: Option<&str>) -> i64 {
    let Some(arg) = arg.map(str::trim) else {
        return HOLD_PERIOD_M;
    };
    let sign_len = usize::from(arg.starts_with(['+', '-']));
    let digits = arg[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(arg.len(), |i| i + sign_len);
    arg[..digits].parse().unwrap_or(HOLD_PERIOD_M)
}

/// Executes administrative actions against the running engine.
pub struct ActionHandler<'a> {
    config: &'a ConfigStore,
    gateway: &'a dyn NotificationGateway,
    store: &'a dyn SnapshotStore,
    manager: &'a dyn ProcessManager,
    debug_dir: PathBuf,
}

impl<'a> ActionHandler<'a> {
    #[must_use]
    pub fn new(
        config: &'a ConfigStore,
        gateway: &'a dyn NotificationGateway,
        store: &'a dyn SnapshotStore,
        manager: &'a dyn ProcessManager,
        debug_dir: PathBuf,
    ) -> Self {
        Self {
            config,
            gateway,
            store,
            manager,
            debug_dir,
        }
    }

    /// Run an action and produce the reply text. Failures become text too.
    pub async fn handle(&self, action: &AdminAction) -> String {
        let reply = match action {
            AdminAction::Hold(arg) => self.hold(arg.as_deref()),
            AdminAction::Unheld => Ok(self.unheld()),
            AdminAction::Mail => self.mail().await,
            AdminAction::Dump => Ok(self.dump()),
            AdminAction::Debug => self.debug().await,
        };
        reply.unwrap_or_else(|e| {
            tracing::warn!("action [{action}] failed: {e}");
            e.to_string()
        })
    }

    /// Hold normal-priority mail for the requested number of minutes.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::HoldOutOfRange` if the end of the hold cannot be
    /// represented as a timestamp.
    pub fn hold(&self, arg: Option<&str>) -> Result<String, ActionError> {
        let minutes = hold_minutes(arg);
        let until = chrono::Duration::try_minutes(minutes)
            .and_then(|span| Utc::now().checked_add_signed(span))
            .ok_or(ActionError::HoldOutOfRange(minutes))?;
        self.gateway.hold(Some(until));
        let msg = format!(
            "mail held for {minutes} minutes, till {}",
            until.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        tracing::info!("{msg}");
        Ok(msg)
    }

    pub fn unheld(&self) -> String {
        self.gateway.hold(None);
        tracing::info!("mail unheld");
        "mail unheld".to_string()
    }

    /// Send a high-priority test alert, which skips batching.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Mail` if the gateway rejects the alert.
    pub async fn mail(&self) -> Result<String, ActionError> {
        let alert = AlertRecord::high("Test only", "This is test only.");
        self.gateway.send(&alert).await?;
        tracing::info!("mail sent");
        Ok("mail sent".to_string())
    }

    pub fn dump(&self) -> String {
        match self.store.dump() {
            Ok(path) => tracing::info!("snapshot dumped to {}", path.display()),
            Err(e) => tracing::warn!("snapshot dump failed: {e}"),
        }
        "dumping".to_string()
    }

    /// Write the raw process listing and the live configuration as JSON.
    ///
    /// # Errors
    ///
    /// Returns `ActionError` if listing fails or a file cannot be written.
    pub async fn debug(&self) -> Result<String, ActionError> {
        let listing = self.manager.list().await?;
        let live = self.config.snapshot();
        write_json(&self.debug_dir.join(DEBUG_LISTING_FILE), &listing)?;
        write_json(&self.debug_dir.join(DEBUG_CONFIG_FILE), &live.settings)?;
        Ok(format!("dumping to {}", self.debug_dir.display()))
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ActionError> {
    let json = serde_json::to_vec(value).map_err(|e| ActionError::Write(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| ActionError::Write(format!("{}: {e}", path.display())))
}
