//! Route configuration for the poll endpoint.

use axum::routing::post;
use axum::Router;

use super::handlers::{poll, RelayAppState};

/// Creates the relay router.
///
/// Routes:
/// - `POST {poll_path}` - Poll: send client events, receive buffered events
pub fn relay_router(poll_path: &str) -> Router<RelayAppState> {
    Router::new().route(poll_path, post(poll))
}
