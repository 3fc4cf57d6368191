//! Relay core - virtual connections over request/response polling.
//!
//! Emulates a persistent, bidirectional event socket for clients that can
//! only make stateless requests. Outbound events are buffered per connection
//! and handed over on the next poll; client events ride in on the same poll.
//!
//! # Components
//!
//! - [`EventBus`] - named-event dispatcher used by everything below
//! - [`Connection`] - one logical client: cache, rooms, idle timer, local bus
//! - [`ConnectionRegistry`] - directory of live connections, global and room
//!   emit, and the [`ConnectionRegistry::handle_poll`] reconciliation entry point
//!
//! # Lifecycle
//!
//! ```text
//! first poll ──► connect ──► "connection" ──► polls (drain + timer reset) ...
//!                                                   │
//!                      idle timeout / disconnect() ─┴─► "disconnect" (once)
//! ```

mod bus;
mod config;
mod connection;
mod errors;
mod event;
mod registry;

pub use bus::EventBus;
pub use config::{RelayConfig, DEFAULT_IDLE_TIMEOUT};
pub use connection::Connection;
pub use errors::{ListenerError, PollError, RelayError};
pub use event::{PollResponse, RelayEvent, CONNECTION_EVENT, DISCONNECT_EVENT};
pub use registry::{ConnectionListener, ConnectionRegistry, Resolved, RoomEmitter};
