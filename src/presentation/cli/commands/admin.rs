use anyhow::Result;
use colored::Colorize;

use crate::application::config::{expand_path, AppConfig};
use crate::application::services::actions::AdminAction;
use crate::infrastructure::admin::client::send_action;

/// Forward an administrative action to the running daemon and print its
/// reply.
///
/// # Errors
///
/// Returns an error if the daemon's control socket is unreachable.
pub async fn run_admin(config: &AppConfig, action: &AdminAction) -> Result<()> {
    let socket = expand_path(&config.admin.socket_path);
    let reply = send_action(&socket, action).await?;
    println!("{} {reply}", format!("[{action}]").cyan().bold());
    Ok(())
}
