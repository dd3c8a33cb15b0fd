use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::entities::metric::{raw_as_number, MetricSample, MetricValue};
use crate::domain::entities::process::ProcessRef;
use crate::domain::value_objects::operator::ProbeOperator;

/// A configured probe for one metric key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricProbeRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient_operator",
        skip_serializing_if = "Option::is_none"
    )]
    pub op: Option<ProbeOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    /// Only alert when the value differs from the last recorded one.
    #[serde(default, alias = "if_changed")]
    pub if_changed: bool,
    #[serde(default, alias = "no_history")]
    pub no_history: bool,
    #[serde(default, alias = "no_notify")]
    pub no_notify: bool,
    /// Hide the metric from evaluation, history and alerts entirely.
    #[serde(default)]
    pub exclude: bool,
    /// Compare the raw value instead of parsing it as a number.
    #[serde(default)]
    pub direct: bool,
}

/// Unknown operator symbols disable the comparison instead of rejecting the
/// whole rule set.
fn lenient_operator<'de, D>(deserializer: D) -> Result<Option<ProbeOperator>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|symbol| match symbol.parse() {
        Ok(op) => Some(op),
        Err(e) => {
            tracing::warn!("{e}, comparison disabled");
            None
        }
    }))
}

impl MetricProbeRule {
    /// Rule synthesized for metrics without configuration: recorded, never
    /// notified. Direct metrics are also kept out of history.
    #[must_use]
    pub fn default_for(direct: bool) -> Self {
        Self {
            no_notify: true,
            direct,
            no_history: direct,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn keep_history(&self) -> bool {
        !self.no_history
    }
}

/// Configured rule for the sample's key, or the synthesized default.
#[must_use]
pub fn resolve_rule<'a>(
    rules: &'a BTreeMap<String, MetricProbeRule>,
    sample: &MetricSample,
) -> Cow<'a, MetricProbeRule> {
    rules.get(&sample.key).map_or_else(
        || Cow::Owned(MetricProbeRule::default_for(sample.direct)),
        Cow::Borrowed,
    )
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("metric [{process}.{key}] -> [{raw}] is not a number")]
pub struct MetricParseError {
    pub process: ProcessRef,
    pub key: String,
    pub raw: Value,
}

/// Evaluated value of a sample and whether it breaches its rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub value: MetricValue,
    pub bad: bool,
}

/// Evaluates `sample` against `rule`.
///
/// Non-direct samples are parsed as numbers first. A rule without both an
/// operator and a target never marks a sample bad.
///
/// # Errors
///
/// Returns `MetricParseError` when a non-direct sample is not numeric.
pub fn evaluate(
    sample: &MetricSample,
    rule: &MetricProbeRule,
) -> Result<ProbeOutcome, MetricParseError> {
    let value = if rule.direct {
        MetricValue::from_raw(&sample.raw)
    } else {
        raw_as_number(&sample.raw)
            .map(MetricValue::Number)
            .ok_or_else(|| MetricParseError {
                process: sample.process.clone(),
                key: sample.key.clone(),
                raw: sample.raw.clone(),
            })?
    };

    let bad = match (rule.op, rule.target.as_ref()) {
        (Some(op), Some(target)) if !target.is_null() => {
            breaches(op, &value, target, rule.tolerance.unwrap_or(0.0))
        }
        _ => false,
    };

    Ok(ProbeOutcome { value, bad })
}

/// Whether an evaluated sample escalates to an alert, given the last value
/// recorded for the same process and metric.
#[must_use]
pub fn should_alert(
    rule: &MetricProbeRule,
    outcome: &ProbeOutcome,
    last: Option<&MetricValue>,
) -> bool {
    !rule.no_notify && outcome.bad && (!rule.if_changed || last != Some(&outcome.value))
}

fn breaches(op: ProbeOperator, value: &MetricValue, target: &Value, tolerance: f64) -> bool {
    let target = MetricValue::from_raw(target);
    match op {
        ProbeOperator::Eq => *value == target,
        ProbeOperator::Ne => *value != target,
        _ => match (numeric(value), numeric(&target)) {
            (Some(v), Some(t)) => op.compare(v, t, tolerance),
            _ => match (op, value, &target) {
                (ProbeOperator::Le, MetricValue::Text(v), MetricValue::Text(t)) => v <= t,
                (ProbeOperator::Ge, MetricValue::Text(v), MetricValue::Text(t)) => v >= t,
                _ => false,
            },
        },
    }
}

fn numeric(value: &MetricValue) -> Option<f64> {
    match value {
        MetricValue::Number(n) => Some(*n),
        MetricValue::Text(s) => s.trim().parse().ok().filter(|n: &f64| n.is_finite()),
    }
}
