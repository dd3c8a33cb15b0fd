use std::time::Duration;

use serde::Serialize;

use super::config_store::ConfigStore;
use super::watchdog::AliveWatchdog;
use crate::domain::entities::alert::{AlertRecord, Attachment};
use crate::domain::entities::event::{BusEvent, ExceptionEvent, LifecycleEvent, MessageEvent};
use crate::domain::entities::process::ProcessRef;
use crate::domain::ports::notifier::NotificationGateway;
use crate::domain::ports::process_manager::{EventSource, ManagerError};
use crate::domain::value_objects::priority::Priority;

/// Why an event produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Manual,
    NotIncluded,
    EventNotListed,
    ExceptionsDisabled,
    MessagesDisabled,
    MessageExcluded,
}

/// Outcome of routing one bus event.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    Skip(SkipReason),
    /// Liveness signal for the watchdog.
    Alive {
        process: ProcessRef,
        timeout: Duration,
    },
    Alert(AlertRecord),
}

/// Turns process manager events into alerts or watchdog resets.
pub struct EventRouter<'a> {
    config: &'a ConfigStore,
    watchdog: &'a AliveWatchdog,
    gateway: &'a dyn NotificationGateway,
}

impl<'a> EventRouter<'a> {
    #[must_use]
    pub fn new(
        config: &'a ConfigStore,
        watchdog: &'a AliveWatchdog,
        gateway: &'a dyn NotificationGateway,
    ) -> Self {
        Self {
            config,
            watchdog,
            gateway,
        }
    }

    /// Decide what an event turns into under the current configuration.
    #[must_use]
    pub fn route(&self, event: &BusEvent) -> RouteDecision {
        let live = self.config.snapshot();
        let monitor = &live.settings.monitor;

        match event {
            BusEvent::Lifecycle(e) => {
                if e.manually {
                    return RouteDecision::Skip(SkipReason::Manual);
                }
                if !self.config.is_included(&e.process.name) {
                    return RouteDecision::Skip(SkipReason::NotIncluded);
                }
                if let Some(events) = &monitor.events
                    && !events.contains(&e.event)
                {
                    return RouteDecision::Skip(SkipReason::EventNotListed);
                }
                RouteDecision::Alert(lifecycle_alert(e, monitor.add_logs))
            }
            BusEvent::Exception(e) => {
                if !monitor.exceptions {
                    return RouteDecision::Skip(SkipReason::ExceptionsDisabled);
                }
                if !self.config.is_included(&e.process.name) {
                    return RouteDecision::Skip(SkipReason::NotIncluded);
                }
                RouteDecision::Alert(exception_alert(e))
            }
            BusEvent::Message(e) => {
                if !monitor.messages {
                    return RouteDecision::Skip(SkipReason::MessagesDisabled);
                }
                if !self.config.is_included(&e.process.name) {
                    return RouteDecision::Skip(SkipReason::NotIncluded);
                }
                if e.is_alive_signal() {
                    return RouteDecision::Alive {
                        process: e.process.process_ref(),
                        timeout: Duration::from_secs(monitor.alive_timeout_s),
                    };
                }
                let compact = e.data.to_string();
                if live.exclusions.is_excluded(&compact) {
                    return RouteDecision::Skip(SkipReason::MessageExcluded);
                }
                RouteDecision::Alert(message_alert(e))
            }
        }
    }

    /// Route one event and act on the decision.
    pub async fn dispatch(&self, event: &BusEvent) -> RouteDecision {
        let decision = self.route(event);
        match &decision {
            RouteDecision::Skip(reason) => {
                tracing::debug!(
                    "{} event from {} skipped: {reason:?}",
                    event.kind(),
                    event.process().name
                );
            }
            RouteDecision::Alive { process, timeout } => self.watchdog.on_alive(process, *timeout),
            RouteDecision::Alert(alert) => {
                if let Err(e) = self.gateway.send(alert).await {
                    tracing::warn!("Alert [{}] not delivered: {e}", alert.subject);
                }
            }
        }
        decision
    }

    /// Consume the event stream until it fails or closes.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError` when the bus fails or the stream ends, both of
    /// which leave the engine blind to events.
    pub async fn run(&self, source: &mut dyn EventSource) -> Result<(), ManagerError> {
        while let Some(event) = source.next_event().await? {
            self.dispatch(&event).await;
        }
        Err(ManagerError::Bus("event stream closed".into()))
    }
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

fn lifecycle_alert(event: &LifecycleEvent, add_logs: bool) -> AlertRecord {
    let process = event.process.process_ref();
    let attachments = if add_logs {
        event.process.log_paths().map(Attachment::from_path).collect()
    } else {
        Vec::new()
    };
    AlertRecord::high(
        format!("{process} - {}", event.event),
        format!(
            "App: {process}\nEvent: {}\n\n{}",
            event.event,
            pretty(&BusEvent::Lifecycle(event.clone()))
        ),
    )
    .with_attachments(attachments)
}

fn exception_alert(event: &ExceptionEvent) -> AlertRecord {
    let process = event.process.process_ref();
    AlertRecord::high(
        format!("{process} - exception"),
        format!("App: {process}\n\n{}", pretty(&event.data)),
    )
}

fn message_alert(event: &MessageEvent) -> AlertRecord {
    let process = event.process.process_ref();
    AlertRecord::new(
        format!("{process} - message"),
        format!("App: {process}\n\n{}", pretty(&event.data)),
        Priority::Normal,
    )
}
