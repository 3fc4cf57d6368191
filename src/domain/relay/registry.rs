//! Process-wide directory of live connections.
//!
//! # Architecture
//!
//! ```text
//!   poll ──► handle_poll ──► resolve ──► Connection ──► local bus ──► listeners
//!                                            │
//!   business logic ──► emit / to(room) ──────┘ (outbound cache, drained next poll)
//! ```
//!
//! The registry map is the sole authority on which connections exist. Each
//! connection guards its own cache and timer, so unrelated clients never
//! contend on anything but the short map lookups.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::domain::foundation::ConnectionId;
use crate::ports::{ListenerHandle, Payload};

use super::bus::EventBus;
use super::config::RelayConfig;
use super::connection::Connection;
use super::errors::{PollError, RelayError};
use super::event::{PollResponse, RelayEvent, CONNECTION_EVENT, DISCONNECT_EVENT};

/// Listener for registry lifecycle events; receives the connection itself.
pub type ConnectionListener = ListenerHandle<Arc<Connection>>;

/// State shared between the registry handle and its connections.
pub(super) struct RegistryShared {
    config: RelayConfig,
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    bus: EventBus<Arc<Connection>>,
}

impl RegistryShared {
    fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().cloned().collect()
    }

    /// Queue `event` on every live connection accepted by `filter`.
    pub(super) fn queue_where(
        &self,
        event: &str,
        payload: &Payload,
        filter: impl Fn(&Connection) -> bool,
    ) -> usize {
        let mut recipients = 0;
        for connection in self.snapshot() {
            if connection.is_connected() && filter(&*connection) {
                connection.queue_event(event, payload.clone());
                recipients += 1;
            }
        }
        tracing::debug!(event, recipients, "queued event");
        recipients
    }

    /// Drop `connection` from the map if it is still the entry for its id.
    pub(super) fn remove(&self, connection: &Connection) {
        let mut connections = self.connections.write();
        let is_same = connections
            .get(&connection.id())
            .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), connection));
        if is_same {
            let _ = connections.remove(&connection.id());
        }
    }

    pub(super) fn notify(&self, event: &str, connection: &Arc<Connection>) -> Result<(), RelayError> {
        self.bus.emit(event, connection)
    }
}

/// Outcome of a get-or-create lookup.
#[must_use]
pub struct Resolved {
    pub connection: Arc<Connection>,
    /// `true` if the connection was created by this call.
    pub created: bool,
    /// Result of the `connection` lifecycle event; always `Ok` for reuse.
    pub notified: Result<(), RelayError>,
}

/// Registry of every live [`Connection`] in the process.
///
/// Cheap to clone; all clones share the same map. Construct one at startup
/// and hand it to whatever needs it.
///
/// # Panics
///
/// Creating or polling connections arms idle timers with `tokio::spawn`,
/// which panics outside a Tokio runtime.
#[derive(Clone)]
pub struct ConnectionRegistry {
    shared: Arc<RegistryShared>,
}

impl ConnectionRegistry {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                config,
                connections: RwLock::new(HashMap::new()),
                bus: EventBus::new(),
            }),
        }
    }

    /// Registry with the default one-minute idle timeout.
    pub fn with_defaults() -> Self {
        Self::new(RelayConfig::default())
    }

    pub fn config(&self) -> &RelayConfig {
        &self.shared.config
    }

    /// Get-or-create the connection for `id`.
    ///
    /// A live id returns the same instance with its idle timer reset. A
    /// missing, unknown or expired id creates a new connection with a fresh
    /// id and fires `connection` on the registry bus.
    pub fn resolve(&self, id: Option<ConnectionId>) -> Resolved {
        self.lookup_or_connect(id, true)
    }

    /// Get-or-create; `touch` resets the idle timer of a reused connection.
    fn lookup_or_connect(&self, id: Option<ConnectionId>, touch: bool) -> Resolved {
        if let Some(id) = id {
            let existing = self.shared.connections.read().get(&id).cloned();
            if let Some(connection) = existing {
                let live = if touch {
                    connection.reset_idle_timer()
                } else {
                    connection.is_connected()
                };
                if live {
                    return Resolved {
                        connection,
                        created: false,
                        notified: Ok(()),
                    };
                }
            }
            tracing::debug!(connection_id = %id, "unknown connection id, creating new connection");
        }
        self.connect()
    }

    /// Create and register a new connection.
    pub fn connect(&self) -> Resolved {
        let connection = Connection::new(Arc::downgrade(&self.shared), self.shared.config.idle_timeout);
        let _ = self
            .shared
            .connections
            .write()
            .insert(connection.id(), Arc::clone(&connection));
        let _ = connection.reset_idle_timer();
        tracing::debug!(connection_id = %connection.id(), "connection created");

        let notified = self.shared.notify(CONNECTION_EVENT, &connection);
        Resolved {
            connection,
            created: true,
            notified,
        }
    }

    /// Look up a live connection without creating it or touching its timer.
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.shared
            .connections
            .read()
            .get(&id)
            .filter(|c| c.is_connected())
            .cloned()
    }

    /// Queue an event on every live connection. Returns the recipient count.
    pub fn emit(&self, event: &str, payload: &Payload) -> usize {
        self.shared.queue_where(event, payload, |_| true)
    }

    /// Emitter scoped to members of `room`.
    pub fn to(&self, room: impl Into<String>) -> RoomEmitter {
        RoomEmitter::new(Arc::downgrade(&self.shared), room.into(), None)
    }

    /// Subscribe to a registry lifecycle event (`connection`, `disconnect`).
    pub fn on(&self, event: impl Into<String>, listener: ConnectionListener) {
        self.shared.bus.on(event, listener);
    }

    pub fn off(&self, event: &str, listener: &ConnectionListener) {
        self.shared.bus.off(event, listener);
    }

    /// Run `listener` once for every new connection.
    pub fn on_connection(&self, listener: ConnectionListener) {
        self.on(CONNECTION_EVENT, listener);
    }

    /// Run `listener` once for every connection that ends.
    pub fn on_disconnect(&self, listener: ConnectionListener) {
        self.on(DISCONNECT_EVENT, listener);
    }

    /// Reconcile one poll.
    ///
    /// 1. Look up or create the connection for `id`.
    /// 2. Raise each client event on the connection's local bus, in order.
    ///    Client events named `disconnect` are dropped; that event is only
    ///    ever fired by the connection itself.
    /// 3. Drain the outbound cache and re-arm the idle timer atomically.
    ///
    /// If any listener failed during steps 1-2 the cache is left intact for
    /// the next poll and the failures are returned with the connection id.
    pub fn handle_poll(
        &self,
        id: Option<ConnectionId>,
        client_events: Vec<RelayEvent>,
    ) -> Result<PollResponse, PollError> {
        let Resolved {
            connection,
            created,
            notified,
        } = self.lookup_or_connect(id, false);

        let mut failures = Vec::new();
        if let Err(err) = notified {
            failures.push(err);
        }

        let inbound = client_events.len();
        for RelayEvent { event, data } in client_events {
            if event == DISCONNECT_EVENT {
                tracing::debug!(
                    connection_id = %connection.id(),
                    event = %event,
                    "ignoring reserved event from client"
                );
                continue;
            }
            if let Err(err) = connection.raise_local(&event, &data) {
                failures.push(err);
            }
        }

        if !failures.is_empty() {
            let _ = connection.reset_idle_timer();
            tracing::warn!(
                connection_id = %connection.id(),
                failures = failures.len(),
                "client event dispatch failed"
            );
            return Err(PollError {
                connection_id: connection.id(),
                failures,
            });
        }

        let events = connection.drain_and_rearm().unwrap_or_default();
        tracing::debug!(
            connection_id = %connection.id(),
            created,
            inbound,
            outbound = events.len(),
            "poll reconciled"
        );

        Ok(PollResponse {
            id: connection.id(),
            events,
        })
    }

    pub fn connection_count(&self) -> usize {
        self.shared.connections.read().len()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.shared.connections.read().keys().copied().collect()
    }

    /// Ids of live connections currently in `room`.
    pub fn room_members(&self, room: &str) -> Vec<ConnectionId> {
        self.shared
            .snapshot()
            .into_iter()
            .filter(|c| c.is_connected() && c.in_room(room))
            .map(|c| c.id())
            .collect()
    }

    /// Disconnect every live connection, e.g. on shutdown.
    pub fn disconnect_all(&self) -> Result<(), RelayError> {
        let connections = self.shared.snapshot();
        tracing::info!(count = connections.len(), "disconnecting all connections");
        RelayError::merge(connections.iter().map(|c| c.disconnect()))
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("config", &self.shared.config)
            .field("connections", &self.connection_count())
            .finish()
    }
}

/// Emitter that queues only on members of one room.
///
/// Membership is evaluated at `emit` time.
pub struct RoomEmitter {
    registry: Weak<RegistryShared>,
    room: String,
    except: Option<ConnectionId>,
}

impl RoomEmitter {
    pub(super) fn new(registry: Weak<RegistryShared>, room: String, except: Option<ConnectionId>) -> Self {
        Self {
            registry,
            room,
            except,
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// Queue `event` on every member. Returns the recipient count.
    pub fn emit(&self, event: &str, payload: &Payload) -> usize {
        let Some(registry) = self.registry.upgrade() else {
            return 0;
        };
        let recipients = registry.queue_where(event, payload, |c| {
            Some(c.id()) != self.except && c.in_room(&self.room)
        });
        tracing::debug!(room = %self.room, event, recipients, "room emit");
        recipients
    }
}
