use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::net::UnixStream;

use crate::domain::entities::event::BusEvent;
use crate::domain::ports::process_manager::{EventSource, ManagerError};

/// Reads the manager's event bus as newline-delimited JSON from a Unix
/// socket, one `BusEvent` per line.
pub struct SocketEventSource {
    lines: Lines<BufReader<UnixStream>>,
}

impl SocketEventSource {
    /// # Errors
    ///
    /// Returns `ManagerError::Connection` if the socket cannot be reached.
    pub async fn connect(path: &Path) -> Result<Self, ManagerError> {
        let stream = UnixStream::connect(path).await.map_err(|e| {
            ManagerError::Connection(format!("cannot connect to {}: {e}", path.display()))
        })?;
        tracing::info!("connected to event bus at {}", path.display());
        Ok(Self::from_stream(stream))
    }

    #[must_use]
    pub fn from_stream(stream: UnixStream) -> Self {
        Self {
            lines: BufReader::new(stream).lines(),
        }
    }
}

#[async_trait]
impl EventSource for SocketEventSource {
    async fn next_event(&mut self) -> Result<Option<BusEvent>, ManagerError> {
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .map_err(|e| ManagerError::Bus(e.to_string()))?
            else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BusEvent>(&line) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => tracing::warn!("skipping malformed bus event: {e}"),
            }
        }
    }
}
