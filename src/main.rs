use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use fleetwatch::application::config::AppConfig;
use fleetwatch::presentation::cli::app::{Cli, Commands};
use fleetwatch::presentation::cli::commands::admin::run_admin;
use fleetwatch::presentation::cli::commands::daemon::run_daemon;

fn print_banner() {
    println!("{}", "━".repeat(40).cyan());
    println!("{}", "  FLEETWATCH · pm2 fleet watchdog".bold().cyan());
    println!("{}", "━".repeat(40).cyan());
}

fn setup_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        AppConfig::load_from(path)?
    } else {
        AppConfig::load()?
    };

    setup_tracing(cli.verbose || config.general.debug_log);

    match cli.command.as_ref().and_then(Commands::admin_action) {
        Some(action) => run_admin(&config, &action).await,
        None => {
            print_banner();
            run_daemon(&config)
                .await
                .inspect_err(|e| tracing::error!("fleetwatch stopped: {e:#}"))
        }
    }
}
