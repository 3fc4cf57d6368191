//! Named-event dispatcher.
//!
//! Every connection owns one bus for its local events and the registry owns
//! one for lifecycle events. Dispatch is synchronous: `emit` returns once
//! every listener has run.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ports::{ListenerHandle, Payload};

use super::errors::{ListenerError, RelayError};

/// Synchronous multi-listener event bus.
///
/// Features:
/// - Multiple listeners per event name, invoked in registration order
/// - Snapshot emission: listeners added or removed while an emission is
///   running take effect from the next emission
/// - Failure isolation: a failing listener never stops the others
pub struct EventBus<P: 'static = Payload> {
    listeners: RwLock<HashMap<String, Vec<ListenerHandle<P>>>>,
}

impl<P: 'static> EventBus<P> {
    /// Creates a new empty event bus.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Register `listener` for `event`.
    ///
    /// Registering the same handle twice makes it run twice per emission.
    pub fn on(&self, event: impl Into<String>, listener: ListenerHandle<P>) {
        self.listeners
            .write()
            .entry(event.into())
            .or_default()
            .push(listener);
    }

    /// Remove the first registration of `listener` for `event`.
    ///
    /// Removing a handle that is not registered is a no-op.
    pub fn off(&self, event: &str, listener: &ListenerHandle<P>) {
        let mut listeners = self.listeners.write();
        if let Some(registered) = listeners.get_mut(event) {
            if let Some(pos) = registered.iter().position(|l| Arc::ptr_eq(l, listener)) {
                let _ = registered.remove(pos);
            }
            if registered.is_empty() {
                let _ = listeners.remove(event);
            }
        }
    }

    /// Invoke every listener registered for `event` with `payload`.
    ///
    /// Emitting an event nobody listens to is a silent no-op.
    pub fn emit(&self, event: &str, payload: &P) -> Result<(), RelayError> {
        // Clone handlers to release lock before invoking them
        let snapshot: Vec<ListenerHandle<P>> = {
            let listeners = self.listeners.read();
            match listeners.get(event) {
                Some(registered) => registered.clone(),
                None => return Ok(()),
            }
        };

        let mut failures = Vec::new();
        for listener in snapshot {
            if let Err(source) = listener.handle(payload) {
                tracing::debug!(event, listener = listener.name(), error = %source, "listener failed");
                failures.push(ListenerError {
                    listener: listener.name().to_string(),
                    source,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RelayError::Dispatch {
                event: event.to_string(),
                failures,
            })
        }
    }

    /// Number of listeners currently registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.listeners.write().clear();
    }
}

impl<P: 'static> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: 'static> fmt::Debug for EventBus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read();
        let mut counts: Vec<(&str, usize)> =
            listeners.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        counts.sort_unstable();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}
