use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde_json::Value;

use super::config_store::ConfigStore;
use crate::domain::entities::alert::AlertRecord;
use crate::domain::entities::metric::{MetricPoint, MetricSample, MetricValue};
use crate::domain::entities::process::{ProcessListing, ProcessRef};
use crate::domain::ports::notifier::NotificationGateway;
use crate::domain::ports::process_manager::{ManagerError, ProcessManager};
use crate::domain::ports::store::SnapshotStore;
use crate::domain::rules::probe::{evaluate, resolve_rule, should_alert, MetricProbeRule};

const BYTES_PER_MB: f64 = 1_048_576.0;

/// One breached metric in a cycle's summary.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRow {
    pub process: ProcessRef,
    pub key: String,
    pub value: MetricValue,
    /// Value recorded before this cycle's push.
    pub previous: Option<MetricValue>,
    pub target: Option<Value>,
}

impl std::fmt::Display for AlertRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let previous = self
            .previous
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        let target = match &self.target {
            Some(Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => "-".to_string(),
        };
        write!(
            f,
            "{:<24} {:<16} {:>12} {:>12} {:>12}",
            self.process.to_string(),
            self.key,
            self.value.to_string(),
            previous,
            target
        )
    }
}

/// Result of a single poll cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub processes: usize,
    pub rows: Vec<AlertRow>,
    pub pushes: usize,
    /// Metrics dropped because their value was not numeric.
    pub unparsable: usize,
}

/// Built-in, exported and metadata metrics of one process. A built-in metric
/// replaces an exported one with the same key.
#[must_use]
pub fn collect_samples(app: &ProcessListing) -> Vec<MetricSample> {
    let mut metrics: BTreeMap<String, (Value, bool)> = BTreeMap::new();

    if let Some(env) = &app.pm2_env {
        for (key, exported) in &env.axm_monitor {
            metrics.insert(key.clone(), (exported.value.clone(), false));
        }
    }

    if let Some(monit) = app.monit {
        #[allow(clippy::cast_precision_loss)]
        let memory_mb = monit.memory as f64 / BYTES_PER_MB;
        metrics.insert("memory".into(), (Value::from(memory_mb), false));
        metrics.insert("cpu".into(), (Value::from(monit.cpu), false));
    }

    if let Some(env) = &app.pm2_env {
        if let Some(version) = &env.pm2_version {
            metrics.insert("pm2".into(), (Value::from(version.as_str()), true));
        }
        if let Some(version) = &env.node_version {
            metrics.insert("node".into(), (Value::from(version.as_str()), true));
        }
    }

    let process = app.process_ref();
    metrics
        .into_iter()
        .map(|(key, (raw, direct))| MetricSample::new(process.clone(), key, raw, direct))
        .collect()
}

/// Periodic sweep: list processes, probe their metrics, feed the history
/// store and report breaches in one summary alert.
pub struct PollCycle<'a> {
    config: &'a ConfigStore,
    manager: &'a dyn ProcessManager,
    store: &'a dyn SnapshotStore,
    gateway: &'a dyn NotificationGateway,
}

impl<'a> PollCycle<'a> {
    #[must_use]
    pub fn new(
        config: &'a ConfigStore,
        manager: &'a dyn ProcessManager,
        store: &'a dyn SnapshotStore,
        gateway: &'a dyn NotificationGateway,
    ) -> Self {
        Self {
            config,
            manager,
            store,
            gateway,
        }
    }

    /// Run one cycle.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError` if the process list cannot be obtained. Digest
    /// and notification failures are logged only.
    pub async fn run_once(&self) -> Result<CycleReport, ManagerError> {
        let listing = self.manager.list().await?;
        let live = self.config.snapshot();
        let rules = &live.settings.monitor.metric;
        let mut report = CycleReport::default();

        for app in listing.iter().filter(|app| self.config.is_included(&app.name)) {
            report.processes += 1;
            for sample in collect_samples(app) {
                self.probe(&sample, rules, &mut report);
            }
        }

        self.store.inactivate();
        if let Err(e) = self.store.send().await {
            tracing::warn!("Snapshot digest not sent: {e}");
        }

        if !report.rows.is_empty() {
            let alert = summary_alert(&report.rows);
            tracing::info!("{}", alert.subject);
            if let Err(e) = self.gateway.send(&alert).await {
                tracing::warn!("Metric summary not delivered: {e}");
            }
        }

        Ok(report)
    }

    fn probe(
        &self,
        sample: &MetricSample,
        rules: &BTreeMap<String, MetricProbeRule>,
        report: &mut CycleReport,
    ) {
        let rule = resolve_rule(rules, sample);
        if rule.exclude {
            return;
        }

        let outcome = match evaluate(sample, &rule) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("{e}");
                report.unparsable += 1;
                return;
            }
        };

        let previous = self.store.last(sample.process.pm_id, &sample.key);
        if should_alert(&rule, &outcome, previous.as_ref()) {
            report.rows.push(AlertRow {
                process: sample.process.clone(),
                key: sample.key.clone(),
                value: outcome.value.clone(),
                previous,
                target: rule.target.clone(),
            });
        }

        self.store.push(
            &sample.process,
            &sample.key,
            rule.keep_history(),
            MetricPoint {
                v: outcome.value,
                bad: outcome.bad,
            },
        );
        report.pushes += 1;
    }

    /// Run cycles for the lifetime of the process, sleeping the live poll
    /// interval between them.
    ///
    /// # Errors
    ///
    /// Returns the first `ManagerError`; it is fatal for the daemon.
    pub async fn run_forever(&self) -> Result<(), ManagerError> {
        loop {
            match self.run_once().await {
                Ok(report) => tracing::debug!(
                    "Cycle done: {} process(es), {} alert(s), {} push(es)",
                    report.processes,
                    report.rows.len(),
                    report.pushes
                ),
                Err(e) => {
                    tracing::error!("Process listing failed: {e}");
                    return Err(e);
                }
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }
}

fn summary_alert(rows: &[AlertRow]) -> AlertRecord {
    let mut body = format!(
        "{:<24} {:<16} {:>12} {:>12} {:>12}\n",
        "App", "Metric", "Value", "Prev. Value", "Target"
    );
    for row in rows {
        let _ = writeln!(body, "{row}");
    }
    AlertRecord::high(format!("{} alert(s)", rows.len()), body)
}
