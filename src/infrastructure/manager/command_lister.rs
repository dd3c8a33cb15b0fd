use std::time::Duration;

use async_trait::async_trait;

use crate::domain::entities::process::ProcessListing;
use crate::domain::ports::process_manager::{ManagerError, ProcessManager};

/// Maximum listing size accepted from the manager command (16 MB).
const MAX_LISTING_BYTES: usize = 16 * 1024 * 1024;

/// Maximum stderr bytes included in error messages.
const MAX_STDERR_BYTES: usize = 512;

/// Lists processes by running the manager's JSON listing command
/// (`pm2 jlist` by default).
pub struct CommandProcessManager {
    program: String,
    args: Vec<String>,
    timeout_secs: u64,
}

impl CommandProcessManager {
    /// # Errors
    ///
    /// Returns `ManagerError::Connection` if `command` is empty.
    pub fn new(command: &[String], timeout_secs: u64) -> Result<Self, ManagerError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ManagerError::Connection("empty list command".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl ProcessManager for CommandProcessManager {
    async fn list(&self) -> Result<Vec<ProcessListing>, ManagerError> {
        let output = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            tokio::process::Command::new(&self.program)
                .args(&self.args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ManagerError::List(format!("{} timed out", self.program)))?
        .map_err(|e| ManagerError::Connection(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(
                &output.stderr[..output.stderr.len().min(MAX_STDERR_BYTES)],
            );
            return Err(ManagerError::List(format!(
                "{} exited with {}: {stderr}",
                self.program, output.status
            )));
        }

        if output.stdout.len() > MAX_LISTING_BYTES {
            return Err(ManagerError::List(format!(
                "listing too large: {} bytes",
                output.stdout.len()
            )));
        }

        parse_listing(&output.stdout)
    }
}

/// Parse a JSON process array, skipping any banner printed before it.
///
/// # Errors
///
/// Returns `ManagerError::List` if no valid JSON array is found.
pub fn parse_listing(stdout: &[u8]) -> Result<Vec<ProcessListing>, ManagerError> {
    let mut last_error = None;
    for (start, _) in stdout.iter().enumerate().filter(|(_, b)| **b == b'[') {
        match serde_json::from_slice(&stdout[start..]) {
            Ok(listing) => return Ok(listing),
            Err(e) => last_error = Some(e),
        }
    }
    Err(ManagerError::List(last_error.map_or_else(
        || "no JSON array in listing output".to_string(),
        |e| format!("invalid listing: {e}"),
    )))
}
