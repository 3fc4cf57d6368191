//! HTTP adapter for the poll endpoint.

mod dto;
mod handlers;
mod routes;

pub use dto::{ErrorResponse, PollReply, PollRequest};
pub use handlers::{poll, RelayAppState};
pub use routes::relay_router;
