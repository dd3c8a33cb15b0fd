use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::application::config::{RemoteKey, RuntimeSettings};
use crate::domain::ports::notifier::NotificationGateway;
use crate::domain::value_objects::exclusion::MessageExclusionSet;

/// Lowest poll interval accepted when the store is built.
pub const MIN_METRIC_INTERVAL_S: u64 = 60;

/// A complete, immutable view of the live configuration.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub settings: RuntimeSettings,
    pub exclusions: MessageExclusionSet,
}

impl LiveConfig {
    fn build(settings: RuntimeSettings) -> Self {
        let exclusions = MessageExclusionSet::compile(&settings.monitor.message_exclude_exps);
        Self {
            settings,
            exclusions,
        }
    }

    /// Poll period, never below one second.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        let secs = self
            .settings
            .monitor
            .metric_interval_s
            .unwrap_or(MIN_METRIC_INTERVAL_S);
        Duration::from_secs(secs.max(1))
    }
}

/// Owner of the live configuration.
///
/// Readers take a cheap `Arc` snapshot; a merge builds a new `LiveConfig`
/// and swaps it in, so nobody observes a half-applied update.
pub struct ConfigStore {
    identity: String,
    current: RwLock<Arc<LiveConfig>>,
    gateway: Arc<dyn NotificationGateway>,
}

impl ConfigStore {
    #[must_use]
    pub fn new(
        identity: impl Into<String>,
        mut settings: RuntimeSettings,
        gateway: Arc<dyn NotificationGateway>,
    ) -> Self {
        let interval = &mut settings.monitor.metric_interval_s;
        if interval.is_none_or(|secs| secs < MIN_METRIC_INTERVAL_S) {
            tracing::info!(
                "metric interval raised to {MIN_METRIC_INTERVAL_S}s (configured: {interval:?})"
            );
            *interval = Some(MIN_METRIC_INTERVAL_S);
        }
        if settings.monitor.apps_included.is_none() && settings.monitor.apps_excluded.is_none() {
            tracing::warn!(
                "no apps_included or apps_excluded configured, no process will be monitored"
            );
        }

        let live = LiveConfig::build(settings);
        gateway.config_changed(&live.settings.notifications.delivery_settings());
        Self {
            identity: identity.into(),
            current: RwLock::new(Arc::new(live)),
            gateway,
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn snapshot(&self) -> Arc<LiveConfig> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Name the engine itself runs under.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Merge a remote partial configuration, then run [`Self::changed`].
    pub fn apply_remote(&self, partial: &Map<String, Value>) -> Vec<RemoteKey> {
        let applied = {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let mut settings = guard.settings.clone();
            let applied = settings.apply_remote(partial);
            *guard = Arc::new(LiveConfig::build(settings));
            applied
        };
        self.notify_gateway();
        applied
    }

    /// Rebuild derived state from the current settings and tell the gateway.
    pub fn changed(&self) {
        {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *guard = Arc::new(LiveConfig::build(guard.settings.clone()));
        }
        self.notify_gateway();
    }

    fn notify_gateway(&self) {
        let live = self.snapshot();
        tracing::debug!(
            "configuration changed, {} exclusion pattern(s)",
            live.exclusions.len()
        );
        self.gateway
            .config_changed(&live.settings.notifications.delivery_settings());
    }

    /// Whether a process with this name is monitored.
    ///
    /// The engine never monitors itself. An inclusion list, when set, is
    /// authoritative. Otherwise an exclusion list admits everything not in
    /// it. With neither list configured nothing is included.
    #[must_use]
    pub fn is_included(&self, name: &str) -> bool {
        if name == self.identity {
            return false;
        }
        let live = self.snapshot();
        let monitor = &live.settings.monitor;
        if let Some(included) = &monitor.apps_included {
            return included.iter().any(|app| app == name);
        }
        if let Some(excluded) = &monitor.apps_excluded {
            return !excluded.iter().any(|app| app == name);
        }
        false
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.snapshot().poll_interval()
    }
}
