use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::application::services::actions::AdminAction;

/// fleetwatch: pm2 fleet watchdog
///
/// Watches the processes of a pm2 daemon, probes their metrics and
/// reports crashes, exceptions and threshold breaches.
#[derive(Parser, Debug)]
#[command(name = "fleetwatch")]
#[command(version, about, long_about)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to custom config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the monitoring daemon (default)
    #[command(alias = "d")]
    Daemon,

    /// Hold normal-priority notifications for a while
    Hold {
        /// Minutes to hold (default: 30)
        minutes: Option<String>,
    },

    /// Resume normal-priority notifications
    Unheld,

    /// Send a test notification
    Mail,

    /// Write the metric history to the dump file
    Dump,

    /// Write the raw process listing and live config for inspection
    Debug,
}

impl Commands {
    /// Control-socket action for the admin subcommands.
    #[must_use]
    pub fn admin_action(&self) -> Option<AdminAction> {
        match self {
            Self::Daemon => None,
            Self::Hold { minutes } => Some(AdminAction::Hold(minutes.clone())),
            Self::Unheld => Some(AdminAction::Unheld),
            Self::Mail => Some(AdminAction::Mail),
            Self::Dump => Some(AdminAction::Dump),
            Self::Debug => Some(AdminAction::Debug),
        }
    }
}
