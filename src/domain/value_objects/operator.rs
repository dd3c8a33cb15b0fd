use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Comparison operator of a metric probe.
///
/// `Approx` and `NotApprox` are two spellings (`~`, `!~`) of the same
/// direction-less tolerance test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeOperator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "~")]
    Approx,
    #[serde(rename = "!~")]
    NotApprox,
}

impl ProbeOperator {
    pub const ALL: [Self; 8] = [
        Self::Lt,
        Self::Gt,
        Self::Eq,
        Self::Le,
        Self::Ge,
        Self::Ne,
        Self::Approx,
        Self::NotApprox,
    ];

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Eq => "=",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Ne => "!=",
            Self::Approx => "~",
            Self::NotApprox => "!~",
        }
    }

    /// Numeric comparison of `value` against `target`.
    ///
    /// `<` and `>` additionally require the distance to exceed `tolerance`;
    /// `=` is exact; `<=`, `>=` and `!=` ignore tolerance.
    #[must_use]
    pub fn compare(self, value: f64, target: f64, tolerance: f64) -> bool {
        let distance = (value - target).abs();
        match self {
            Self::Lt => value < target && distance > tolerance,
            Self::Gt => value > target && distance > tolerance,
            #[allow(clippy::float_cmp)]
            Self::Eq => value == target,
            Self::Le => value <= target,
            Self::Ge => value >= target,
            #[allow(clippy::float_cmp)]
            Self::Ne => value != target,
            Self::Approx | Self::NotApprox => distance > tolerance,
        }
    }
}

impl std::fmt::Display for ProbeOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown probe operator: {0}")]
pub struct UnknownOperator(pub String);

impl FromStr for ProbeOperator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.symbol() == s)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}
