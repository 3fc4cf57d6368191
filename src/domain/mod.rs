//! Domain layer containing the relay engine and its primitives.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `relay` - Virtual connections, event buses, registry and poll reconciliation

pub mod foundation;
pub mod relay;
