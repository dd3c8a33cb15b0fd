#![allow(clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use fleetwatch::application::config::RuntimeSettings;
use fleetwatch::application::services::config_store::ConfigStore;
use fleetwatch::application::services::event_router::{EventRouter, RouteDecision, SkipReason};
use fleetwatch::application::services::watchdog::{AliveWatchdog, WatchdogState};
use fleetwatch::domain::entities::{AlertRecord, BusEvent};
use fleetwatch::domain::ports::{EventSource, ManagerError, NotificationError, NotificationGateway};
use fleetwatch::domain::value_objects::Priority;

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<AlertRecord>>,
}

impl Outbox {
    fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("lock")
            .iter()
            .map(|a| a.subject.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationGateway for Outbox {
    async fn send(&self, alert: &AlertRecord) -> Result<(), NotificationError> {
        self.sent.lock().expect("lock").push(alert.clone());
        Ok(())
    }
}

/// Replays canned bus lines, then reports the bus as closed.
struct ScriptedBus {
    lines: VecDeque<String>,
}

impl ScriptedBus {
    fn new(events: &[serde_json::Value]) -> Self {
        Self {
            lines: events.iter().map(ToString::to_string).collect(),
        }
    }
}

#[async_trait]
impl EventSource for ScriptedBus {
    async fn next_event(&mut self) -> Result<Option<BusEvent>, ManagerError> {
        self.lines
            .pop_front()
            .map(|line| serde_json::from_str(&line).map_err(|e| ManagerError::Bus(e.to_string())))
            .transpose()
    }
}

fn event(value: serde_json::Value) -> BusEvent {
    serde_json::from_value(value).expect("bus event")
}

fn lifecycle(name: &str, kind: &str, manually: bool) -> serde_json::Value {
    json!({
        "type": "process:event",
        "event": kind,
        "manually": manually,
        "process": {
            "name": name,
            "pm_id": 0,
            "pm_err_log_path": format!("/var/log/{name}-error.log"),
            "pm_out_log_path": format!("/var/log/{name}-out.log")
        }
    })
}

fn message(name: &str, data: serde_json::Value) -> serde_json::Value {
    json!({"type": "process:msg", "process": {"name": name, "pm_id": 3}, "data": data})
}

fn settings() -> RuntimeSettings {
    let mut settings = RuntimeSettings::default();
    settings.monitor.apps_excluded = Some(vec!["batch".into()]);
    settings.monitor.events = Some(vec!["exit".into(), "restart overlimit".into()]);
    settings.monitor.message_exclude_exps = vec!["\"status\":\"ok\"".into()];
    settings.monitor.add_logs = true;
    settings.monitor.alive_timeout_s = 30;
    settings
}

struct Setup {
    config: ConfigStore,
    watchdog: AliveWatchdog,
    outbox: Arc<Outbox>,
}

impl Setup {
    fn new() -> Self {
        let outbox = Arc::new(Outbox::default());
        Self {
            config: ConfigStore::new("fleetwatch", settings(), Arc::new(Outbox::default())),
            watchdog: AliveWatchdog::new(outbox.clone()),
            outbox,
        }
    }

    fn router(&self) -> EventRouter<'_> {
        EventRouter::new(&self.config, &self.watchdog, self.outbox.as_ref())
    }
}

#[tokio::test]
async fn lifecycle_routing() {
    let setup = Setup::new();
    let router = setup.router();

    let RouteDecision::Alert(alert) = router.route(&event(lifecycle("api", "exit", false))) else {
        panic!("exit should alert");
    };
    assert_eq!(alert.subject, "api:0 - exit");
    assert_eq!(alert.priority, Priority::High);
    assert_eq!(alert.attachments.len(), 2);
    assert_eq!(alert.attachments[0].filename, "api-error.log");

    assert_eq!(
        router.route(&event(lifecycle("api", "exit", true))),
        RouteDecision::Skip(SkipReason::Manual)
    );
    assert_eq!(
        router.route(&event(lifecycle("api", "online", false))),
        RouteDecision::Skip(SkipReason::EventNotListed)
    );
    assert_eq!(
        router.route(&event(lifecycle("batch", "exit", false))),
        RouteDecision::Skip(SkipReason::NotIncluded)
    );
    assert_eq!(
        router.route(&event(lifecycle("fleetwatch", "exit", false))),
        RouteDecision::Skip(SkipReason::NotIncluded)
    );
}

#[tokio::test]
async fn exception_and_message_routing() {
    let setup = Setup::new();
    let router = setup.router();

    let exception = event(json!({
        "type": "process:exception",
        "process": {"name": "api", "pm_id": 0},
        "data": {"message": "boom", "stack": "Error: boom"}
    }));
    let RouteDecision::Alert(alert) = router.route(&exception) else {
        panic!("exception should alert");
    };
    assert_eq!(alert.subject, "api:0 - exception");
    assert!(alert.body.contains("boom"));

    let warning = event(message("api", json!("disk almost full")));
    let RouteDecision::Alert(alert) = router.route(&warning) else {
        panic!("message should alert");
    };
    assert_eq!(alert.subject, "api:3 - message");
    assert_eq!(alert.priority, Priority::Normal);

    assert_eq!(
        router.route(&event(message("api", json!({"status": "ok"})))),
        RouteDecision::Skip(SkipReason::MessageExcluded)
    );
    assert_eq!(
        router.route(&event(message("api", json!("alive")))),
        RouteDecision::Alive {
            process: fleetwatch::domain::entities::ProcessRef::new("api", 3),
            timeout: Duration::from_secs(30),
        }
    );
}

#[tokio::test]
async fn disabled_feature_flags_skip_events() {
    let setup = Setup::new();
    setup.config.apply_remote(
        json!({"exceptions": false, "messages": false})
            .as_object()
            .expect("object"),
    );
    let router = setup.router();

    let exception = event(json!({
        "type": "process:exception",
        "process": {"name": "api", "pm_id": 0},
        "data": "boom"
    }));
    assert_eq!(router.route(&exception), RouteDecision::Skip(SkipReason::ExceptionsDisabled));
    assert_eq!(
        router.route(&event(message("api", json!("alive")))),
        RouteDecision::Skip(SkipReason::MessagesDisabled)
    );
}

#[tokio::test(start_paused = true)]
async fn bus_replay_alerts_and_arms_watchdog() {
    let setup = Setup::new();
    let router = setup.router();
    let mut bus = ScriptedBus::new(&[
        lifecycle("api", "exit", false),
        message("worker", json!("alive")),
        message("api", json!({"status": "ok"})),
        lifecycle("api", "exit", true),
    ]);

    let err = router.run(&mut bus).await.expect_err("bus closes");
    assert!(matches!(err, ManagerError::Bus(_)));
    assert_eq!(setup.outbox.subjects(), vec!["api:0 - exit"]);
    assert_eq!(setup.watchdog.state("worker"), Some(WatchdogState::Armed { count: 1 }));

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(setup.outbox.subjects(), vec!["api:0 - exit", "worker:3 - is dead!"]);
    assert_eq!(
        setup.watchdog.state("worker"),
        Some(WatchdogState::Escalated { count: 1 })
    );
}
