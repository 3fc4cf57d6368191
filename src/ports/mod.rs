//! Ports - Interfaces between the relay core and business logic.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world.
//!
//! - `EventListener` - Handler invoked when a named event is emitted
//! - `ListenerHandle` - Shared, comparable handle used to subscribe/unsubscribe
//! - `Payload` - Opaque JSON event data

mod event_listener;

pub use event_listener::{
    listener, named_listener, EventListener, ListenerHandle, Payload, ANONYMOUS_LISTENER,
};
