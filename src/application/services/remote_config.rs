use std::time::Duration;

use super::config_store::ConfigStore;
use crate::application::config::RemoteKey;
use crate::domain::ports::config_source::{ConfigFetchError, RemoteConfigSource};

/// Pulls partial configuration from a remote source into the store.
pub struct RemoteConfigPoller<'a> {
    source: &'a dyn RemoteConfigSource,
    config: &'a ConfigStore,
    interval: Option<Duration>,
}

impl<'a> RemoteConfigPoller<'a> {
    /// `fetch_interval_m == 0` means fetch once only.
    #[must_use]
    pub fn new(
        source: &'a dyn RemoteConfigSource,
        config: &'a ConfigStore,
        fetch_interval_m: u64,
    ) -> Self {
        let interval = (fetch_interval_m > 0)
            .then(|| Duration::from_secs(fetch_interval_m.saturating_mul(60)));
        Self {
            source,
            config,
            interval,
        }
    }

    /// Fetch and merge once.
    ///
    /// # Errors
    ///
    /// Returns `ConfigFetchError` if the fetch fails; the live configuration
    /// is left untouched in that case.
    pub async fn fetch_once(&self) -> Result<Vec<RemoteKey>, ConfigFetchError> {
        let partial = self.source.fetch().await?;
        let applied = self.config.apply_remote(&partial);
        tracing::info!("remote config applied, {} key(s) changed", applied.len());
        Ok(applied)
    }

    /// Periodic refetch. Returns immediately when no interval is set.
    /// Failures are logged and retried on the next tick.
    pub async fn run(&self) {
        let Some(period) = self.interval else {
            return;
        };
        loop {
            tokio::time::sleep(period).await;
            if let Err(e) = self.fetch_once().await {
                tracing::warn!("failed to fetch config: {e}");
            }
        }
    }
}
