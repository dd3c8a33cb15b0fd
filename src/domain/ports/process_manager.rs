use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::event::BusEvent;
use crate::domain::entities::process::ProcessListing;

/// Failures talking to the process manager. All of them are fatal for the
/// daemon.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("cannot connect to process manager: {0}")]
    Connection(String),
    #[error("cannot list processes: {0}")]
    List(String),
    #[error("event bus failure: {0}")]
    Bus(String),
}

#[async_trait]
pub trait ProcessManager: Send + Sync {
    /// List every process known to the manager.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError` if the manager cannot be reached or its
    /// listing cannot be read.
    async fn list(&self) -> Result<Vec<ProcessListing>, ManagerError>;
}

/// Stream of lifecycle, exception and message events.
#[async_trait]
pub trait EventSource: Send {
    /// Next event, or `None` once the bus is closed.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError` if the bus connection fails.
    async fn next_event(&mut self) -> Result<Option<BusEvent>, ManagerError>;
}
