use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::metric::{MetricPoint, MetricValue};
use crate::domain::entities::process::ProcessRef;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage read failed: {0}")]
    ReadFailed(String),
    #[error("storage write failed: {0}")]
    WriteFailed(String),
    #[error("digest delivery failed: {0}")]
    DigestFailed(String),
}

/// Metric history kept per (process id, metric key): last value for change
/// detection, a history buffer and a periodic digest.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Last value recorded for this process and metric, if any.
    fn last(&self, pm_id: u32, key: &str) -> Option<MetricValue>;

    /// Record a new point. `keep_history` controls whether it is appended to
    /// the history buffer or only replaces the last value.
    fn push(&self, process: &ProcessRef, key: &str, keep_history: bool, point: MetricPoint);

    /// Mark series of processes that were not pushed since the previous call
    /// as inactive.
    fn inactivate(&self);

    /// Flush the periodic digest if one is due.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the digest cannot be delivered.
    async fn send(&self) -> Result<(), StoreError>;

    /// Write the full store content to disk, returning the file path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if serialization or the write fails.
    fn dump(&self) -> Result<PathBuf, StoreError>;
}
