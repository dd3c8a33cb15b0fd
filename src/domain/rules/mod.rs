pub mod probe;

pub use probe::{
    evaluate, resolve_rule, should_alert, MetricParseError, MetricProbeRule, ProbeOutcome,
};
