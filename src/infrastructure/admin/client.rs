use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::application::services::actions::AdminAction;

const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Send one action to a running daemon and return its reply line.
///
/// # Errors
///
/// Returns an error if the daemon is not listening on `path`, or the reply
/// does not arrive in time.
pub async fn send_action(path: &Path, action: &AdminAction) -> Result<String> {
    let stream = UnixStream::connect(path)
        .await
        .with_context(|| format!("cannot connect to {} (is the daemon running?)", path.display()))?;
    let (read, mut write) = stream.into_split();
    write.write_all(format!("{action}\n").as_bytes()).await?;

    let mut reply = String::new();
    tokio::time::timeout(REPLY_TIMEOUT, BufReader::new(read).read_line(&mut reply))
        .await
        .context("timed out waiting for reply")?
        .context("cannot read reply")?;
    Ok(reply.trim_end().to_string())
}
