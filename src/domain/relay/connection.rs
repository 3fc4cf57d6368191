//! Virtual connection: one logical client realized over repeated polls.
//!
//! A connection owns its outbound cache, its room labels, its idle timer and
//! a private [`EventBus`] for client-originated events. It is only reachable
//! while the registry holds it; once disconnected it stays inert forever.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;

use crate::domain::foundation::{ConnectionId, Timestamp};
use crate::ports::{ListenerHandle, Payload};

use super::bus::EventBus;
use super::errors::RelayError;
use super::event::{RelayEvent, DISCONNECT_EVENT};
use super::registry::{ConnectionRegistry, RegistryShared, Resolved, RoomEmitter};

/// Mutable per-connection state, guarded by one lock.
///
/// Cache append, cache drain, timer reset and disconnect all take this lock,
/// so a drain can never interleave with an expiry.
struct ConnectionState {
    outbound: Vec<RelayEvent>,
    rooms: HashSet<String>,
    idle_deadline: Timestamp,
    idle_timer: Option<AbortHandle>,
    /// Bumped on every timer reset; a firing timer with a stale epoch is ignored.
    timer_epoch: u64,
    connected: bool,
}

/// A logical client connection.
///
/// Always handled through `Arc<Connection>`; the registry owns the strong
/// reference that keeps it reachable by id.
pub struct Connection {
    id: ConnectionId,
    created_at: Timestamp,
    idle_timeout: Duration,
    registry: Weak<RegistryShared>,
    this: Weak<Connection>,
    state: Mutex<ConnectionState>,
    bus: EventBus,
}

impl Connection {
    pub(super) fn new(registry: Weak<RegistryShared>, idle_timeout: Duration) -> Arc<Self> {
        let now = Timestamp::now();
        Arc::new_cyclic(|this| Self {
            id: ConnectionId::new(),
            created_at: now,
            idle_timeout,
            registry,
            this: this.clone(),
            state: Mutex::new(ConnectionState {
                outbound: Vec::new(),
                rooms: HashSet::new(),
                idle_deadline: now.plus(idle_timeout),
                idle_timer: None,
                timer_epoch: 0,
                connected: true,
            }),
            bus: EventBus::new(),
        })
    }

    /// Get-or-create the connection for `id` in `registry`.
    ///
    /// See [`ConnectionRegistry::resolve`].
    pub fn resolve(id: Option<ConnectionId>, registry: &ConnectionRegistry) -> Resolved {
        registry.resolve(id)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Wall-clock time since the connection was created.
    pub fn age(&self) -> Duration {
        Timestamp::now().duration_since(&self.created_at)
    }

    /// When the connection expires unless polled again.
    pub fn idle_deadline(&self) -> Timestamp {
        self.state.lock().idle_deadline
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Cancel the pending expiry and schedule a fresh one.
    ///
    /// Returns `false` when the connection is already disconnected; a dead
    /// connection is never re-armed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn reset_idle_timer(&self) -> bool {
        let mut state = self.state.lock();
        self.rearm(&mut state)
    }

    #[cfg(test)]
    pub(super) fn timer_epoch(&self) -> u64 {
        self.state.lock().timer_epoch
    }

    fn rearm(&self, state: &mut ConnectionState) -> bool {
        if !state.connected {
            return false;
        }
        if let Some(timer) = state.idle_timer.take() {
            timer.abort();
        }
        state.timer_epoch += 1;
        state.idle_deadline = Timestamp::now().plus(self.idle_timeout);

        let epoch = state.timer_epoch;
        let this = self.this.clone();
        let timeout = self.idle_timeout;
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(connection) = this.upgrade() {
                connection.expire(epoch);
            }
        });
        state.idle_timer = Some(task.abort_handle());
        true
    }

    fn expire(&self, epoch: u64) {
        if !self.close(Some(epoch)) {
            return;
        }
        tracing::info!(
            connection_id = %self.id,
            age_secs = self.age().as_secs(),
            "connection idle timeout"
        );
        if let Err(err) = self.finish_disconnect() {
            tracing::warn!(connection_id = %self.id, error = %err, "disconnect listeners failed after idle timeout");
        }
    }

    /// Append an event to the outbound cache.
    ///
    /// Events queued on a disconnected connection are discarded.
    pub fn queue_event(&self, event: impl Into<String>, payload: Payload) {
        let mut state = self.state.lock();
        if !state.connected {
            tracing::trace!(connection_id = %self.id, "dropping event for disconnected connection");
            return;
        }
        state.outbound.push(RelayEvent::new(event, payload));
    }

    /// Number of events waiting for the next poll.
    pub fn pending_count(&self) -> usize {
        self.state.lock().outbound.len()
    }

    /// Take everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<RelayEvent> {
        std::mem::take(&mut self.state.lock().outbound)
    }

    /// Drain the cache and re-arm the idle timer under one lock.
    ///
    /// Returns `None` if the connection was disconnected before the drain.
    pub(super) fn drain_and_rearm(&self) -> Option<Vec<RelayEvent>> {
        let mut state = self.state.lock();
        if !self.rearm(&mut state) {
            return None;
        }
        Some(std::mem::take(&mut state.outbound))
    }

    pub fn join(&self, room: impl Into<String>) {
        let room = room.into();
        tracing::trace!(connection_id = %self.id, room = %room, "join room");
        let _ = self.state.lock().rooms.insert(room);
    }

    pub fn leave(&self, room: &str) {
        tracing::trace!(connection_id = %self.id, room, "leave room");
        let _ = self.state.lock().rooms.remove(room);
    }

    pub fn in_room(&self, room: &str) -> bool {
        self.state.lock().rooms.contains(room)
    }

    /// Rooms this connection belongs to, sorted.
    pub fn rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.state.lock().rooms.iter().cloned().collect();
        rooms.sort_unstable();
        rooms
    }

    /// Subscribe to a connection-scoped event.
    pub fn on(&self, event: impl Into<String>, listener: ListenerHandle) {
        self.bus.on(event, listener);
    }

    pub fn off(&self, event: &str, listener: &ListenerHandle) {
        self.bus.off(event, listener);
    }

    /// Fire a connection-scoped event on the local bus.
    pub fn raise_local(&self, event: &str, payload: &Payload) -> Result<(), RelayError> {
        self.bus.emit(event, payload)
    }

    /// Queue an event on every other live connection.
    ///
    /// Returns the number of recipients.
    pub fn broadcast_to_others(&self, event: &str, payload: &Payload) -> usize {
        match self.registry.upgrade() {
            Some(registry) => registry.queue_where(event, payload, |c| c.id != self.id),
            None => 0,
        }
    }

    /// Room-scoped emitter that skips this connection.
    pub fn to(&self, room: impl Into<String>) -> RoomEmitter {
        RoomEmitter::new(self.registry.clone(), room.into(), Some(self.id))
    }

    /// End this connection.
    ///
    /// Cancels the idle timer, clears the outbound cache, removes the
    /// connection from its registry and fires `disconnect` on the local bus.
    /// Local listeners are dropped afterwards. Calling it again is a no-op.
    pub fn disconnect(&self) -> Result<(), RelayError> {
        if !self.close(None) {
            return Ok(());
        }
        tracing::info!(
            connection_id = %self.id,
            age_secs = self.age().as_secs(),
            "connection disconnected"
        );
        self.finish_disconnect()
    }

    /// Mark the connection dead. Only the first caller wins.
    fn close(&self, expected_epoch: Option<u64>) -> bool {
        let mut state = self.state.lock();
        if !state.connected {
            return false;
        }
        if expected_epoch.is_some_and(|epoch| epoch != state.timer_epoch) {
            return false;
        }
        state.connected = false;
        if let Some(timer) = state.idle_timer.take() {
            timer.abort();
        }
        state.outbound.clear();
        true
    }

    fn finish_disconnect(&self) -> Result<(), RelayError> {
        let registry = self.registry.upgrade();
        if let Some(registry) = &registry {
            registry.remove(self);
        }

        let local = self.bus.emit(DISCONNECT_EVENT, &Payload::Null);
        // Listeners may hold an Arc to this connection
        self.bus.clear();
        let global = match (registry, self.this.upgrade()) {
            (Some(registry), Some(this)) => registry.notify(DISCONNECT_EVENT, &this),
            _ => Ok(()),
        };
        RelayError::merge([local, global])
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().idle_timer.take() {
            timer.abort();
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected", &state.connected)
            .field("pending", &state.outbound.len())
            .field("rooms", &state.rooms)
            .finish()
    }
}
