pub mod composite;
pub mod dispatcher;
pub mod log_file;
pub mod terminal;
pub mod webhook;

use crate::application::config::NotificationConfig;
use crate::domain::ports::NotificationGateway;

use self::composite::CompositeChannel;
use self::dispatcher::NotificationDispatcher;
use self::log_file::LogFileChannel;
use self::terminal::TerminalChannel;
use self::webhook::WebhookChannel;

/// Channels enabled by configuration. A webhook that cannot be set up is
/// logged and left out.
#[must_use]
pub fn build_channels(config: &NotificationConfig) -> CompositeChannel {
    let mut channels: Vec<Box<dyn NotificationGateway>> = Vec::new();
    if config.terminal {
        channels.push(Box::new(TerminalChannel::new()));
    }
    if let Some(path) = &config.log_file {
        channels.push(Box::new(LogFileChannel::new(path)));
    }
    if let Some(url) = &config.webhook_url {
        match WebhookChannel::new(url.clone()) {
            Ok(channel) => channels.push(Box::new(channel)),
            Err(e) => tracing::warn!("webhook channel disabled: {e}"),
        }
    }
    if channels.is_empty() {
        tracing::warn!("no notification channel configured, alerts go to the default log file");
        channels.push(Box::new(LogFileChannel::default()));
    }
    CompositeChannel::new(channels)
}

/// Batching and hold policy in front of the configured channels.
#[must_use]
pub fn create_gateway(config: &NotificationConfig) -> NotificationDispatcher {
    let dispatcher = NotificationDispatcher::new(Box::new(build_channels(config)));
    dispatcher.config_changed(&config.delivery_settings());
    dispatcher
}
