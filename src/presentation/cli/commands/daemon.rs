use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::config::{expand_path, AppConfig};
use crate::application::services::actions::ActionHandler;
use crate::application::services::config_store::ConfigStore;
use crate::application::services::event_router::EventRouter;
use crate::application::services::poll_cycle::PollCycle;
use crate::application::services::remote_config::RemoteConfigPoller;
use crate::application::services::watchdog::AliveWatchdog;
use crate::domain::ports::{EventSource, NotificationGateway};
use crate::infrastructure::admin::server::AdminServer;
use crate::infrastructure::manager::bus_socket::SocketEventSource;
use crate::infrastructure::manager::command_lister::CommandProcessManager;
use crate::infrastructure::notifications::create_gateway;
use crate::infrastructure::notifications::dispatcher::NotificationDispatcher;
use crate::infrastructure::persistence::memory_snapshot::MemorySnapshotStore;
use crate::infrastructure::remote::http_config::HttpConfigSource;

const LIST_TIMEOUT_SECS: u64 = 30;

/// The long-running loops of the daemon, borrowed from the services the
/// caller owns.
pub struct Engine<'a> {
    pub poll: PollCycle<'a>,
    pub router: EventRouter<'a>,
    pub poller: Option<RemoteConfigPoller<'a>>,
    pub dispatcher: &'a NotificationDispatcher,
    pub admin: &'a AdminServer,
    pub actions: ActionHandler<'a>,
}

impl Engine<'_> {
    /// Run every loop until `shutdown` resolves or a fatal manager error
    /// ends the poll cycle or the event stream.
    ///
    /// # Errors
    ///
    /// Returns the fatal `ManagerError` with context.
    pub async fn run(
        &self,
        events: &mut dyn EventSource,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let remote = async {
            if let Some(poller) = &self.poller {
                poller.run().await;
            }
            std::future::pending::<()>().await;
        };

        tokio::select! {
            result = self.poll.run_forever() => result.context("poll cycle stopped"),
            result = self.router.run(events) => result.context("event routing stopped"),
            () = remote => Ok(()),
            () = self.dispatcher.run_flusher() => Ok(()),
            () = self.admin.serve(&self.actions) => Ok(()),
            () = shutdown => {
                tracing::info!("Shutdown signal received, flushing queued notifications");
                if let Err(e) = self.dispatcher.flush().await {
                    tracing::warn!("Final flush failed: {e}");
                }
                Ok(())
            }
        }
    }
}

/// Wire the adapters to the services and run until Ctrl+C or a fatal
/// process manager error.
///
/// # Errors
///
/// Returns an error if the process manager, its event bus or the control
/// socket cannot be set up, or once a fatal manager error stops the engine.
pub async fn run_daemon(config: &AppConfig) -> Result<()> {
    tracing::debug!("Effective configuration: {config:?}");

    let dispatcher = Arc::new(create_gateway(&config.notifications));
    let gateway: Arc<dyn NotificationGateway> = dispatcher.clone();

    let store = ConfigStore::new(
        config.manager.identity.clone(),
        config.runtime_settings(),
        Arc::clone(&gateway),
    );
    let watchdog = AliveWatchdog::new(Arc::clone(&gateway));
    let snapshots = MemorySnapshotStore::new(&config.snapshot);
    let manager = CommandProcessManager::new(&config.manager.list_command, LIST_TIMEOUT_SECS)?;

    let source = match &config.web_config.url {
        Some(url) => Some(
            HttpConfigSource::new(url.clone(), config.web_config.auth.clone())
                .context("cannot set up remote configuration")?,
        ),
        None => None,
    };
    let poller = source.as_ref().map(|source| {
        RemoteConfigPoller::new(source, &store, config.web_config.fetch_interval_m)
    });
    if let Some(poller) = &poller
        && let Err(e) = poller.fetch_once().await
    {
        tracing::warn!("failed to fetch config, running on local settings: {e}");
    }

    let mut events = SocketEventSource::connect(&expand_path(&config.manager.event_socket))
        .await
        .inspect_err(|e| tracing::error!("{e}"))?;
    let admin = AdminServer::bind(&expand_path(&config.admin.socket_path))?;

    let engine = Engine {
        poll: PollCycle::new(&store, &manager, &snapshots, gateway.as_ref()),
        router: EventRouter::new(&store, &watchdog, gateway.as_ref()),
        poller,
        dispatcher: &dispatcher,
        admin: &admin,
        actions: ActionHandler::new(
            &store,
            gateway.as_ref(),
            &snapshots,
            &manager,
            expand_path(&config.admin.debug_dir),
        ),
    };

    tracing::info!(
        "fleetwatch started as [{}], polling every {}s",
        store.identity(),
        store.poll_interval().as_secs()
    );
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };
    engine.run(&mut events, shutdown).await
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::application::config::RuntimeSettings;
    use crate::application::services::config_store::tests::RecordingGateway;
    use crate::application::services::poll_cycle::tests::{RecordingStore, StaticManager};
    use crate::domain::entities::event::BusEvent;
    use crate::domain::ports::ManagerError;
    use async_trait::async_trait;

    struct ClosedBus;

    #[async_trait]
    impl EventSource for ClosedBus {
        async fn next_event(&mut self) -> Result<Option<BusEvent>, ManagerError> {
            Ok(None)
        }
    }

    struct SilentBus;

    #[async_trait]
    impl EventSource for SilentBus {
        async fn next_event(&mut self) -> Result<Option<BusEvent>, ManagerError> {
            std::future::pending().await
        }
    }

    struct Fixture {
        gateway: Arc<RecordingGateway>,
        dispatcher: NotificationDispatcher,
        config: ConfigStore,
        watchdog: AliveWatchdog,
        store: RecordingStore,
        manager: StaticManager,
        admin: AdminServer,
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new(listing: Result<Vec<crate::domain::entities::ProcessListing>, String>) -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let gateway = Arc::new(RecordingGateway::default());
            let mut settings = RuntimeSettings::default();
            settings.monitor.apps_excluded = Some(Vec::new());
            Self {
                dispatcher: NotificationDispatcher::new(Box::new(RecordingGateway::default())),
                config: ConfigStore::new("fleetwatch", settings, gateway.clone()),
                watchdog: AliveWatchdog::new(gateway.clone()),
                store: RecordingStore::default(),
                manager: StaticManager { listing },
                admin: AdminServer::bind(&dir.path().join("admin.sock")).expect("bind"),
                gateway,
                dir,
            }
        }

        fn engine(&self) -> Engine<'_> {
            Engine {
                poll: PollCycle::new(
                    &self.config,
                    &self.manager,
                    &self.store,
                    self.gateway.as_ref(),
                ),
                router: EventRouter::new(&self.config, &self.watchdog, self.gateway.as_ref()),
                poller: None,
                dispatcher: &self.dispatcher,
                admin: &self.admin,
                actions: ActionHandler::new(
                    &self.config,
                    self.gateway.as_ref(),
                    &self.store,
                    &self.manager,
                    self.dir.path().to_path_buf(),
                ),
            }
        }
    }

    #[tokio::test]
    async fn closed_event_stream_is_fatal() {
        let fixture = Fixture::new(Ok(Vec::new()));
        let err = fixture
            .engine()
            .run(&mut ClosedBus, std::future::pending())
            .await
            .expect_err("stream closed");
        assert!(err.to_string().contains("event routing stopped"));
    }

    #[tokio::test]
    async fn listing_failure_is_fatal() {
        let fixture = Fixture::new(Err("pm2 not running".into()));
        let err = fixture
            .engine()
            .run(&mut SilentBus, std::future::pending())
            .await
            .expect_err("listing failed");
        assert!(err.to_string().contains("poll cycle stopped"));
        assert!(format!("{err:#}").contains("pm2 not running"));
    }

    #[tokio::test]
    async fn shutdown_stops_cleanly() {
        let fixture = Fixture::new(Ok(Vec::new()));
        fixture
            .engine()
            .run(&mut SilentBus, async {})
            .await
            .expect("clean shutdown");
    }
}
