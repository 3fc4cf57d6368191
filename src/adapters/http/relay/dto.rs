//! HTTP DTOs for the poll endpoint.
//!
//! These types decouple the wire format from domain types, allowing independent evolution.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ConnectionId;
use crate::domain::relay::{PollError, PollResponse, RelayEvent};

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// One poll from the client.
///
/// `id` is absent on first contact. `cache` holds the events the client
/// queued since its previous poll.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PollRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub cache: Vec<RelayEvent>,
}

impl PollRequest {
    /// The connection id the client presented, if it parses.
    ///
    /// A malformed id is treated like an unknown one.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.id.as_deref().and_then(|id| id.parse().ok())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Events delivered to the client and the id to use on the next poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollReply {
    pub id: String,
    pub cache: Vec<RelayEvent>,
}

impl From<PollResponse> for PollReply {
    fn from(response: PollResponse) -> Self {
        Self {
            id: response.id.to_string(),
            cache: response.events,
        }
    }
}

/// Standard error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
            details: None,
        }
    }

    /// Error for a poll whose client events were rejected by listeners.
    ///
    /// Carries the connection id so the client keeps using it.
    pub fn listener_failed(error: &PollError) -> Self {
        let failures: Vec<serde_json::Value> = error
            .failures
            .iter()
            .flat_map(|dispatch| {
                dispatch.failures().iter().map(move |failure| {
                    serde_json::json!({
                        "event": dispatch.event(),
                        "listener": failure.listener,
                        "code": failure.source.code.to_string(),
                        "message": failure.source.message,
                    })
                })
            })
            .collect();

        Self {
            code: "LISTENER_FAILED".to_string(),
            message: error.to_string(),
            details: Some(serde_json::json!({
                "id": error.connection_id.to_string(),
                "failures": failures,
            })),
        }
    }
}
