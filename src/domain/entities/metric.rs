use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::process::ProcessRef;

/// A metric value after evaluation: numeric for regular probes, raw text for
/// direct ones (versions and other non-numeric metadata).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    /// Direct metrics keep their raw shape: JSON numbers stay numbers,
    /// everything else is compared as text.
    #[must_use]
    pub fn from_raw(raw: &Value) -> Self {
        match raw {
            Value::Number(n) => n.as_f64().map_or_else(|| Self::Text(n.to_string()), Self::Number),
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[allow(clippy::cast_possible_truncation)]
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One metric reading of one process, produced fresh every poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub process: ProcessRef,
    pub key: String,
    pub raw: Value,
    pub direct: bool,
}

impl MetricSample {
    #[must_use]
    pub fn new(process: ProcessRef, key: impl Into<String>, raw: Value, direct: bool) -> Self {
        Self {
            process,
            key: key.into(),
            raw,
            direct,
        }
    }
}

/// History entry handed to the snapshot store. `bad` is only serialized when
/// set, so healthy points stay small.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub v: MetricValue,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bad: bool,
}

/// Parses the longest leading decimal number of `s`, ignoring leading
/// whitespace (`"12.5ms"` is 12.5, `"abc"` is `None`).
#[must_use]
pub fn parse_leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;

    while end < bytes.len() {
        let b = bytes[end];
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'+' | b'-' if end == 0 => {}
            b'+' | b'-' if matches!(bytes[end - 1], b'e' | b'E') => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => seen_exp = true,
            _ => break,
        }
        end += 1;
    }

    // Back off a dangling exponent or sign ("1e", "1e-").
    while end > 0 {
        if let Ok(v) = s[..end].parse::<f64>() {
            return v.is_finite().then_some(v);
        }
        end -= 1;
    }
    None
}

/// Numeric reading of a raw metric value, or `None` when it is not a number.
#[must_use]
pub fn raw_as_number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_leading_float(s),
        _ => None,
    }
}
