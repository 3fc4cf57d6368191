//! Event and poll exchange types.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ConnectionId;
use crate::ports::Payload;

/// Name of the connection-scoped event fired once when a connection ends.
pub const DISCONNECT_EVENT: &str = "disconnect";

/// Name of the registry-level event fired once per new connection.
pub const CONNECTION_EVENT: &str = "connection";

/// A named event with its payload, in either direction.
///
/// Outbound events sit in a connection's cache until the next poll;
/// inbound events arrive in a poll's batch and are raised on the
/// connection's local bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayEvent {
    pub event: String,
    #[serde(default)]
    pub data: Payload,
}

impl RelayEvent {
    pub fn new(event: impl Into<String>, data: Payload) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Result of one reconciled poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PollResponse {
    /// The connection the client must present on its next poll.
    pub id: ConnectionId,
    /// Everything queued for the connection since its previous poll, oldest first.
    pub events: Vec<RelayEvent>,
}
