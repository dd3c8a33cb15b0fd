use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::application::services::actions::{ActionHandler, AdminAction};

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_LINE_BYTES: u64 = 1024;

/// Control socket speaking one request line and one reply line per
/// connection.
pub struct AdminServer {
    listener: UnixListener,
    path: PathBuf,
}

impl AdminServer {
    /// Bind the socket, replacing a stale one left by a previous run.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the socket
    /// cannot be bound.
    pub fn bind(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("cannot remove stale socket {}", path.display()))?;
        }
        let listener = UnixListener::bind(path)
            .with_context(|| format!("cannot bind {}", path.display()))?;
        tracing::info!("control socket listening on {}", path.display());
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serve connections one at a time until the task is cancelled.
    pub async fn serve(&self, handler: &ActionHandler<'_>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    if let Err(e) = handle_connection(stream, handler).await {
                        tracing::warn!("control connection failed: {e:#}");
                    }
                }
                Err(e) => tracing::warn!("control socket accept failed: {e}"),
            }
        }
    }
}

impl Drop for AdminServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn handle_connection(stream: UnixStream, handler: &ActionHandler<'_>) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut line = String::new();
    tokio::time::timeout(
        READ_TIMEOUT,
        BufReader::new(read).take(MAX_LINE_BYTES).read_line(&mut line),
    )
    .await
    .context("timed out waiting for request")?
    .context("cannot read request")?;

    let reply = match line.parse::<AdminAction>() {
        Ok(action) => {
            tracing::info!("control request: {action}");
            handler.handle(&action).await
        }
        Err(e) => e.to_string(),
    };

    write.write_all(reply.as_bytes()).await?;
    write.write_all(b"\n").await?;
    write.shutdown().await?;
    Ok(())
}
