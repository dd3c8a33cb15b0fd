#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use fleetwatch::application::config::{RuntimeSettings, SnapshotConfig};
use fleetwatch::application::services::config_store::ConfigStore;
use fleetwatch::application::services::poll_cycle::PollCycle;
use fleetwatch::domain::entities::{AlertRecord, MetricValue, ProcessListing};
use fleetwatch::domain::ports::{
    ManagerError, NotificationError, NotificationGateway, ProcessManager, SnapshotStore,
};
use fleetwatch::domain::rules::MetricProbeRule;
use fleetwatch::domain::value_objects::{Priority, ProbeOperator};
use fleetwatch::infrastructure::persistence::memory_snapshot::MemorySnapshotStore;

/// Serves whatever listing the test put in last.
struct FakeManager {
    listing: Mutex<Result<Value, String>>,
}

impl FakeManager {
    fn new(listing: Value) -> Self {
        Self {
            listing: Mutex::new(Ok(listing)),
        }
    }

    fn set(&self, listing: Value) {
        *self.listing.lock().expect("lock") = Ok(listing);
    }

    fn fail(&self, reason: &str) {
        *self.listing.lock().expect("lock") = Err(reason.to_string());
    }
}

#[async_trait]
impl ProcessManager for FakeManager {
    async fn list(&self) -> Result<Vec<ProcessListing>, ManagerError> {
        let listing = self.listing.lock().expect("lock").clone();
        let value = listing.map_err(ManagerError::List)?;
        serde_json::from_value(value).map_err(|e| ManagerError::List(e.to_string()))
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<AlertRecord>>,
}

#[async_trait]
impl NotificationGateway for Outbox {
    async fn send(&self, alert: &AlertRecord) -> Result<(), NotificationError> {
        self.sent.lock().expect("lock").push(alert.clone());
        Ok(())
    }
}

fn fleet(api_cpu: f64, worker_cpu: f64) -> Value {
    json!([
        {
            "name": "api",
            "pm_id": 0,
            "monit": {"memory": 52_428_800, "cpu": api_cpu},
            "pm2_env": {
                "_pm2_version": "5.3.1",
                "node_version": "v20.11.0",
                "axm_monitor": {
                    "Event Loop Latency": {"value": "12.5ms", "unit": "ms"},
                    "Heap Size": {"value": "N/A"}
                }
            }
        },
        {
            "name": "worker",
            "pm_id": 1,
            "monit": {"memory": 1_048_576, "cpu": worker_cpu}
        },
        {
            "name": "fleetwatch",
            "pm_id": 2,
            "monit": {"memory": 1_048_576, "cpu": 99.0}
        }
    ])
}

fn settings() -> RuntimeSettings {
    let mut settings = RuntimeSettings::default();
    settings.monitor.apps_excluded = Some(Vec::new());
    settings.monitor.metric.insert(
        "cpu".into(),
        MetricProbeRule {
            op: Some(ProbeOperator::Gt),
            target: Some(json!(90)),
            tolerance: Some(2.0),
            if_changed: true,
            ..MetricProbeRule::default()
        },
    );
    settings.monitor.metric.insert(
        "Heap Size".into(),
        MetricProbeRule {
            exclude: true,
            ..MetricProbeRule::default()
        },
    );
    settings
}

struct Harness {
    config: ConfigStore,
    manager: FakeManager,
    store: MemorySnapshotStore,
    outbox: Outbox,
}

impl Harness {
    fn new(listing: Value) -> Self {
        Self {
            config: ConfigStore::new("fleetwatch", settings(), Arc::new(Outbox::default())),
            manager: FakeManager::new(listing),
            store: MemorySnapshotStore::new(&SnapshotConfig::default()),
            outbox: Outbox::default(),
        }
    }

    fn cycle(&self) -> PollCycle<'_> {
        PollCycle::new(&self.config, &self.manager, &self.store, &self.outbox)
    }

    fn subjects(&self) -> Vec<String> {
        self.outbox
            .sent
            .lock()
            .expect("lock")
            .iter()
            .map(|a| a.subject.clone())
            .collect()
    }
}

#[tokio::test]
async fn breach_produces_one_summary_alert() {
    let harness = Harness::new(fleet(95.0, 96.0));
    let report = harness.cycle().run_once().await.expect("cycle");

    assert_eq!(report.processes, 2, "engine itself is skipped");
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.unparsable, 0, "excluded metric is never parsed");

    let sent = harness.outbox.sent.lock().expect("lock");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "2 alert(s)");
    assert_eq!(sent[0].priority, Priority::High);
    assert!(sent[0].body.contains("api:0"));
    assert!(sent[0].body.contains("worker:1"));
}

#[tokio::test]
async fn metrics_land_in_the_store() {
    let harness = Harness::new(fleet(10.0, 10.0));
    let report = harness.cycle().run_once().await.expect("cycle");

    assert!(report.rows.is_empty());
    assert!(harness.subjects().is_empty());
    assert_eq!(harness.store.last(0, "memory"), Some(MetricValue::Number(50.0)));
    assert_eq!(
        harness.store.last(0, "Event Loop Latency"),
        Some(MetricValue::Number(12.5))
    );
    assert_eq!(harness.store.last(0, "node"), Some(MetricValue::from("v20.11.0")));
    assert_eq!(harness.store.last(0, "Heap Size"), None);
    assert_eq!(harness.store.history_len(0, "cpu"), 1);
    assert_eq!(harness.store.history_len(0, "pm2"), 0);
    assert_eq!(harness.store.last(2, "cpu"), None);
}

#[tokio::test]
async fn if_changed_alerts_once_per_value() {
    let harness = Harness::new(fleet(95.0, 10.0));

    harness.cycle().run_once().await.expect("first");
    harness.cycle().run_once().await.expect("same value");
    assert_eq!(harness.subjects(), vec!["1 alert(s)"]);

    harness.manager.set(fleet(97.0, 10.0));
    let report = harness.cycle().run_once().await.expect("new value");
    assert_eq!(report.rows[0].previous, Some(MetricValue::Number(95.0)));
    assert_eq!(harness.subjects(), vec!["1 alert(s)", "1 alert(s)"]);
}

#[tokio::test]
async fn vanished_process_goes_inactive() {
    let harness = Harness::new(fleet(10.0, 10.0));
    harness.cycle().run_once().await.expect("first");
    assert!(harness.store.is_active(1, "cpu"));

    harness.manager.set(json!([{"name": "api", "pm_id": 0, "monit": {"memory": 0, "cpu": 1.0}}]));
    harness.cycle().run_once().await.expect("second");
    assert!(harness.store.is_active(0, "cpu"));
    assert!(!harness.store.is_active(1, "cpu"));
}

#[tokio::test]
async fn listing_failure_is_returned() {
    let harness = Harness::new(fleet(10.0, 10.0));
    harness.manager.fail("pm2 daemon not running");
    let err = harness.cycle().run_once().await.expect_err("listing failed");
    assert!(matches!(err, ManagerError::List(_)));
    assert!(harness.subjects().is_empty());
}

#[tokio::test]
async fn remote_update_applies_to_next_cycle() {
    let harness = Harness::new(fleet(50.0, 50.0));
    harness.cycle().run_once().await.expect("quiet");
    assert!(harness.subjects().is_empty());

    harness.config.apply_remote(
        json!({"metric": {"cpu": {"op": ">", "target": 40}}, "appsExcluded": ["worker"]})
            .as_object()
            .expect("object"),
    );
    let report = harness.cycle().run_once().await.expect("after update");
    assert_eq!(report.processes, 1);
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].process.name, "api");
}
