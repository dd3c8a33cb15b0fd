#![allow(clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use fleetwatch::application::config::{RemoteKey, RuntimeSettings};
use fleetwatch::application::services::config_store::ConfigStore;
use fleetwatch::domain::entities::{AlertRecord, MetricSample, MetricValue, ProcessRef};
use fleetwatch::domain::ports::{DeliverySettings, NotificationError, NotificationGateway};
use fleetwatch::domain::rules::{evaluate, resolve_rule, should_alert, MetricProbeRule};
use fleetwatch::domain::value_objects::ProbeOperator;

#[derive(Default)]
struct SettingsSpy {
    changes: Mutex<Vec<DeliverySettings>>,
}

#[async_trait]
impl NotificationGateway for SettingsSpy {
    async fn send(&self, _alert: &AlertRecord) -> Result<(), NotificationError> {
        Ok(())
    }

    fn config_changed(&self, settings: &DeliverySettings) {
        self.changes.lock().expect("lock").push(settings.clone());
    }
}

fn sample(raw: Value) -> MetricSample {
    MetricSample::new(ProcessRef::new("api", 0), "cpu", raw, false)
}

fn rule(op: ProbeOperator, target: Value, tolerance: f64) -> MetricProbeRule {
    MetricProbeRule {
        op: Some(op),
        target: Some(target),
        tolerance: Some(tolerance),
        ..MetricProbeRule::default()
    }
}

fn is_bad(op: ProbeOperator, value: f64, target: f64, tolerance: f64) -> bool {
    evaluate(&sample(json!(value)), &rule(op, json!(target), tolerance))
        .expect("numeric sample")
        .bad
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("json object")
}

// --- Operator table ---

#[test]
fn operator_table() {
    use ProbeOperator::{Approx, Eq, Ge, Gt, Le, Lt, Ne, NotApprox};

    let cases = [
        (Gt, 95.0, 90.0, 2.0, true),
        (Gt, 91.0, 90.0, 2.0, false),
        (Gt, 92.0, 90.0, 2.0, false),
        (Lt, 5.0, 10.0, 2.0, true),
        (Lt, 9.0, 10.0, 2.0, false),
        (Eq, 10.0, 10.0, 5.0, true),
        (Eq, 11.0, 10.0, 5.0, false),
        (Le, 10.0, 10.0, 0.0, true),
        (Le, 10.5, 10.0, 5.0, false),
        (Ge, 10.0, 10.0, 0.0, true),
        (Ge, 9.5, 10.0, 5.0, false),
        (Ne, 11.0, 10.0, 5.0, true),
        (Ne, 10.0, 10.0, 0.0, false),
        (Approx, 15.0, 10.0, 2.0, true),
        (Approx, 11.0, 10.0, 2.0, false),
        (NotApprox, 5.0, 10.0, 2.0, true),
        (NotApprox, 10.5, 10.0, 2.0, false),
    ];

    for (op, value, target, tolerance, expected) in cases {
        assert_eq!(
            is_bad(op, value, target, tolerance),
            expected,
            "{value} {op} {target} (tolerance {tolerance})"
        );
    }
}

#[test]
fn leading_float_samples_are_parsed() {
    let outcome = evaluate(&sample(json!("95.5%")), &rule(ProbeOperator::Gt, json!(90), 0.0))
        .expect("leading float");
    assert_eq!(outcome.value, MetricValue::Number(95.5));
    assert!(outcome.bad);
}

#[test]
fn non_numeric_sample_is_a_parse_error() {
    let err = evaluate(&sample(json!("N/A")), &rule(ProbeOperator::Gt, json!(90), 0.0))
        .expect_err("not a number");
    assert_eq!(err.key, "cpu");
    assert_eq!(err.to_string(), "metric [api:0.cpu] -> [\"N/A\"] is not a number");
}

#[test]
fn direct_version_comparison() {
    let node = MetricSample::new(ProcessRef::new("api", 0), "node", json!("v20.11.0"), true);
    let pinned = MetricProbeRule {
        direct: true,
        ..rule(ProbeOperator::Ne, json!("v20.11.0"), 0.0)
    };
    assert!(!evaluate(&node, &pinned).expect("direct").bad);

    let outdated = MetricProbeRule {
        direct: true,
        ..rule(ProbeOperator::Ne, json!("v22.0.0"), 0.0)
    };
    assert!(evaluate(&node, &outdated).expect("direct").bad);
}

#[test]
fn rule_without_target_never_alerts() {
    let no_target = MetricProbeRule {
        op: Some(ProbeOperator::Gt),
        ..MetricProbeRule::default()
    };
    let outcome = evaluate(&sample(json!(1000)), &no_target).expect("numeric");
    assert!(!outcome.bad);
    assert!(!should_alert(&no_target, &outcome, None));
}

#[test]
fn unconfigured_metrics_get_silent_default() {
    let rules = BTreeMap::new();
    let resolved = resolve_rule(&rules, &sample(json!(1)));
    assert!(resolved.no_notify);
    assert!(resolved.keep_history());

    let direct = MetricSample::new(ProcessRef::new("api", 0), "pm2", json!("5.3.1"), true);
    let resolved = resolve_rule(&rules, &direct);
    assert!(resolved.direct);
    assert!(!resolved.keep_history());
}

#[test]
fn if_changed_suppresses_repeats() {
    let rule = MetricProbeRule {
        if_changed: true,
        ..rule(ProbeOperator::Gt, json!(90), 0.0)
    };
    let outcome = evaluate(&sample(json!(95)), &rule).expect("numeric");
    assert!(should_alert(&rule, &outcome, None));
    assert!(should_alert(&rule, &outcome, Some(&MetricValue::Number(97.0))));
    assert!(!should_alert(&rule, &outcome, Some(&MetricValue::Number(95.0))));
}

#[test]
fn rules_parse_from_wire_format() {
    let rules: BTreeMap<String, MetricProbeRule> = serde_json::from_value(json!({
        "cpu": {"op": ">", "target": 90, "tolerance": 2, "ifChanged": true},
        "memory": {"op": "<>", "target": 500},
        "heap": {"exclude": true}
    }))
    .expect("rules");
    assert_eq!(rules["cpu"].op, Some(ProbeOperator::Gt));
    assert!(rules["cpu"].if_changed);
    assert_eq!(rules["memory"].op, None);
    assert!(rules["heap"].exclude);
}

// --- Inclusion policy ---

fn store(included: Option<&[&str]>, excluded: Option<&[&str]>) -> ConfigStore {
    let mut settings = RuntimeSettings::default();
    settings.monitor.apps_included = included.map(|l| l.iter().map(ToString::to_string).collect());
    settings.monitor.apps_excluded = excluded.map(|l| l.iter().map(ToString::to_string).collect());
    ConfigStore::new("fleetwatch", settings, Arc::new(SettingsSpy::default()))
}

#[test]
fn inclusion_list_is_authoritative() {
    let config = store(Some(&["api"]), Some(&["api"]));
    assert!(config.is_included("api"));
    assert!(!config.is_included("worker"));
}

#[test]
fn exclusion_list_admits_the_rest() {
    let config = store(None, Some(&["worker"]));
    assert!(config.is_included("api"));
    assert!(!config.is_included("worker"));
}

#[test]
fn nothing_configured_includes_nothing() {
    let config = store(None, None);
    assert!(!config.is_included("api"));
}

#[test]
fn engine_never_monitors_itself() {
    let config = store(Some(&["fleetwatch", "api"]), None);
    assert!(!config.is_included("fleetwatch"));
    assert!(config.is_included("api"));
}

// --- Remote merge ---

#[test]
fn remote_merge_updates_live_config_and_gateway() {
    let spy = Arc::new(SettingsSpy::default());
    let config = ConfigStore::new("fleetwatch", RuntimeSettings::default(), spy.clone());
    let applied = config.apply_remote(&object(json!({
        "appsExcluded": ["worker"],
        "appsIncluded": ["api"],
        "messageExcludeExps": ["\"status\":\"ok\""],
        "metricIntervalS": 120,
        "batchMaxMessages": 5,
        "mailTo": "ops@example.com",
        "unknownKey": true
    })));

    assert!(applied.contains(&RemoteKey::AppsExcluded));
    assert!(applied.contains(&RemoteKey::BatchMaxMessages));
    let live = config.snapshot();
    assert_eq!(live.settings.monitor.apps_included, None);
    assert_eq!(live.exclusions.len(), 1);
    assert_eq!(config.poll_interval().as_secs(), 120);
    assert!(config.is_included("api"));
    assert!(!config.is_included("worker"));

    let changes = spy.changes.lock().expect("lock");
    let last = changes.last().expect("notified");
    assert_eq!(last.batch_max_messages, 5);
    assert_eq!(last.mail_to.as_deref(), Some("ops@example.com"));
}

#[test]
fn malformed_remote_key_is_skipped() {
    let config = ConfigStore::new(
        "fleetwatch",
        RuntimeSettings::default(),
        Arc::new(SettingsSpy::default()),
    );
    let applied = config.apply_remote(&object(json!({
        "exceptions": "yes please",
        "messages": false
    })));
    assert_eq!(applied, vec![RemoteKey::Messages]);
    let live = config.snapshot();
    assert!(live.settings.monitor.exceptions);
    assert!(!live.settings.monitor.messages);
}
