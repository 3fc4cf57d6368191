//! longpoll-relay - Virtual sockets over request/response polling
//!
//! This crate emulates persistent, bidirectional event delivery for clients
//! that can only poll. The server buffers outbound events per logical
//! connection and hands them over on the next poll, while accepting the
//! client's events in the same round trip.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
