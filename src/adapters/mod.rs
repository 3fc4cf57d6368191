//! Adapters - Implementations connecting the relay to the outside world.
//!
//! - `http` - JSON poll endpoint over axum

pub mod http;
