use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::domain::entities::alert::AlertRecord;
use crate::domain::entities::process::ProcessRef;
use crate::domain::ports::notifier::NotificationGateway;

/// Dead notices sent for one missed liveness signal before the chain stops.
pub const ALIVE_MAX_CONSECUTIVE: u32 = 6;

/// Delay between dead notices after the first one.
pub const ALIVE_ESCALATION_INTERVAL: Duration = Duration::from_secs(600);

/// Where a process's liveness chain currently stands. A name with no entry
/// has never signalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// Waiting for the first timeout after an `alive` signal.
    Armed { count: u32 },
    /// `count` dead notices were sent; the chain continues until the maximum.
    Escalated { count: u32 },
}

struct AliveEntry {
    generation: u64,
    state: WatchdogState,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<String, AliveEntry>,
    next_generation: u64,
}

type SharedRegistry = Arc<Mutex<Registry>>;

fn lock(registry: &SharedRegistry) -> std::sync::MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-process liveness watchdog driven by `alive` messages.
pub struct AliveWatchdog {
    gateway: Arc<dyn NotificationGateway>,
    registry: SharedRegistry,
}

impl AliveWatchdog {
    #[must_use]
    pub fn new(gateway: Arc<dyn NotificationGateway>) -> Self {
        Self {
            gateway,
            registry: Arc::default(),
        }
    }

    /// Restart the chain for `process.name`: the pending timer, if any, is
    /// cancelled and a new one armed for `timeout` with count 1.
    pub fn on_alive(&self, process: &ProcessRef, timeout: Duration) {
        let mut registry = lock(&self.registry);
        registry.next_generation += 1;
        let generation = registry.next_generation;

        let handle = tokio::spawn(run_chain(
            Arc::clone(&self.registry),
            Arc::clone(&self.gateway),
            process.clone(),
            timeout,
            generation,
        ));
        let entry = AliveEntry {
            generation,
            state: WatchdogState::Armed { count: 1 },
            handle,
        };
        if let Some(previous) = registry.entries.insert(process.name.clone(), entry) {
            previous.handle.abort();
        }
        tracing::debug!("{process} alive, next check in {}s", timeout.as_secs());
    }

    /// Current state for a process name, `None` when it never signalled.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<WatchdogState> {
        lock(&self.registry).entries.get(name).map(|entry| entry.state)
    }

    #[must_use]
    pub fn tracked(&self) -> usize {
        lock(&self.registry).entries.len()
    }
}

impl Drop for AliveWatchdog {
    fn drop(&mut self) {
        for entry in lock(&self.registry).entries.values() {
            entry.handle.abort();
        }
    }
}

async fn run_chain(
    registry: SharedRegistry,
    gateway: Arc<dyn NotificationGateway>,
    process: ProcessRef,
    timeout: Duration,
    generation: u64,
) {
    let mut delay = timeout;
    for count in 1..=ALIVE_MAX_CONSECUTIVE {
        tokio::time::sleep(delay).await;
        {
            let mut registry = lock(&registry);
            match registry.entries.get_mut(&process.name) {
                Some(entry) if entry.generation == generation => {
                    entry.state = WatchdogState::Escalated { count };
                }
                _ => return,
            }
        }

        tracing::info!("{process} is dead ({count}/{ALIVE_MAX_CONSECUTIVE})");
        let alert = AlertRecord::high(
            format!("{process} - is dead!"),
            format!("{count}/{ALIVE_MAX_CONSECUTIVE} consecutive notice"),
        );
        if let Err(e) = gateway.send(&alert).await {
            tracing::warn!("Dead notice for {process} not delivered: {e}");
        }
        delay = ALIVE_ESCALATION_INTERVAL;
    }
}
