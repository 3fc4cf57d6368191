//! HTTP handlers for the poll endpoint.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::domain::foundation::ErrorCode;
use crate::domain::relay::{ConnectionRegistry, PollError};

use super::dto::{ErrorResponse, PollReply, PollRequest};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct RelayAppState {
    pub registry: ConnectionRegistry,
}

impl RelayAppState {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /socket - Deliver client events and collect buffered server events
pub async fn poll(
    State(state): State<RelayAppState>,
    body: Result<Json<PollRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(req) => req,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejecting malformed poll body");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request(rejection.body_text())),
            )
                .into_response();
        }
    };
    let id = req.connection_id();

    match state.registry.handle_poll(id, req.cache) {
        Ok(response) => (StatusCode::OK, Json(PollReply::from(response))).into_response(),
        Err(e) => handle_poll_error(e),
    }
}

fn handle_poll_error(error: PollError) -> Response {
    // 400 only when every failure is a rejection of client input
    let rejected_input = error.failures.iter().all(|dispatch| {
        dispatch.failures().iter().all(|f| {
            matches!(
                f.source.code,
                ErrorCode::ValidationFailed | ErrorCode::InvalidFormat
            )
        })
    });
    let status = if rejected_input {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (status, Json(ErrorResponse::listener_failed(&error))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ConnectionId, DomainError};
    use crate::domain::relay::{ListenerError, RelayError};

    fn poll_error(code: ErrorCode) -> PollError {
        PollError {
            connection_id: ConnectionId::new(),
            failures: vec![RelayError::Dispatch {
                event: "chat".to_string(),
                failures: vec![ListenerError {
                    listener: "test".to_string(),
                    source: DomainError::new(code, "failed"),
                }],
            }],
        }
    }

    #[test]
    fn validation_failures_map_to_bad_request() {
        let response = handle_poll_error(poll_error(ErrorCode::ValidationFailed));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn other_failures_map_to_internal_error() {
        let response = handle_poll_error(poll_error(ErrorCode::InternalError));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn relay_app_state_shares_registry() {
        let registry = ConnectionRegistry::with_defaults();
        let state = RelayAppState::new(registry.clone());
        assert_eq!(state.registry.connection_count(), registry.connection_count());
    }
}
