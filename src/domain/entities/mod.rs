pub mod alert;
pub mod event;
pub mod metric;
pub mod process;

pub use alert::{AlertRecord, Attachment};
pub use event::{BusEvent, EventProcess, ExceptionEvent, LifecycleEvent, MessageEvent};
pub use metric::{MetricPoint, MetricSample, MetricValue};
pub use process::{ExportedMetric, ProcessEnv, ProcessListing, ProcessMonit, ProcessRef};
