//! Event dispatcher
//!
//! Routes events to the listeners registered for their name, then to wildcard
//! listeners. Listeners run one after another in registration order; each runs
//! in its own task so an error or panic is contained to that listener.

use super::Listener;
use crate::events::Event;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Listeners registered under this name receive every event
pub const WILDCARD: &str = "*";

/// Handle for removing a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub events: u64,
    pub listener_failures: u64,
}

type Registered = (ListenerId, Arc<dyn Listener>);

pub struct EventDispatcher {
    listeners: RwLock<HashMap<String, Vec<Registered>>>,
    next_id: AtomicU64,
    events: AtomicU64,
    failures: AtomicU64,
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            events: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register `listener` for events named `name` ([`WILDCARD`] for all)
    pub fn subscribe(&self, name: impl Into<String>, listener: impl Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name = name.into();
        debug!(event = %name, listener = id.0, "Listener registered");
        self.listeners
            .write()
            .entry(name)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; false if it was not registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let mut removed = false;
        for registered in listeners.values_mut() {
            let before = registered.len();
            registered.retain(|(existing, _)| *existing != id);
            removed |= registered.len() != before;
        }
        listeners.retain(|_, registered| !registered.is_empty());
        removed
    }

    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.read().get(name).map_or(0, Vec::len)
    }

    /// Deliver one event; returns how many listeners were invoked
    pub async fn dispatch(&self, event: Event) -> usize {
        let targets: Vec<Arc<dyn Listener>> = {
            let listeners = self.listeners.read();
            listeners
                .get(&event.name)
                .into_iter()
                .chain(listeners.get(WILDCARD))
                .flatten()
                .map(|(_, listener)| listener.clone())
                .collect()
        };
        self.events.fetch_add(1, Ordering::Relaxed);

        let event = Arc::new(event);
        for listener in &targets {
            let listener = listener.clone();
            let delivered = event.clone();
            let outcome = tokio::spawn(async move { listener.on_event(delivered).await }).await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(event = %event.name, shard_id = event.shard_id, error = %e, "Listener failed");
                }
                Err(e) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    if e.is_panic() {
                        error!(event = %event.name, shard_id = event.shard_id, "Listener panicked");
                    } else {
                        warn!(event = %event.name, "Listener task cancelled");
                    }
                }
            }
        }
        targets.len()
    }

    /// Drain `events` in order until every sender is gone
    pub fn spawn_worker(self: &Arc<Self>, mut events: mpsc::Receiver<Event>) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                dispatcher.dispatch(event).await;
            }
            debug!("Event stream closed, dispatcher stopping");
        })
    }

    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            events: self.events.load(Ordering::Relaxed),
            listener_failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
