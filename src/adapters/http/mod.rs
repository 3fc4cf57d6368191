//! HTTP adapters - transport for the relay.
//!
//! The relay core is transport-agnostic; this adapter maps its poll contract
//! onto a JSON POST endpoint.

mod app;
pub mod relay;

pub use app::app_router;
pub use relay::{relay_router, RelayAppState};
