//! EventListener port - Interface for business logic reacting to relay events.
//!
//! The relay core never knows what its listeners do. Business logic plugs in
//! at two levels:
//!
//! - per connection, for client-originated events (`connection.on("chat", ..)`)
//! - per registry, for lifecycle events (`registry.on_connection(..)`)

use std::sync::Arc;

use crate::domain::foundation::DomainError;

/// Opaque event data carried through the relay.
///
/// The core never inspects payloads; they are whatever JSON the client or
/// the emitting business logic supplied.
pub type Payload = serde_json::Value;

/// Handler invoked synchronously when a named event is emitted.
///
/// Implementations should be:
/// - **Quick** - the poll that triggered them waits for them to return
/// - **Isolated** - an error does not stop the remaining listeners
///
/// Closures of the right shape implement this trait automatically, so most
/// call sites never name it:
///
/// ```ignore
/// connection.on("chat", listener(|payload: &Payload| {
///     println!("got {payload}");
///     Ok(())
/// }));
/// ```
pub trait EventListener<P = Payload>: Send + Sync {
    /// Process one emission.
    fn handle(&self, payload: &P) -> Result<(), DomainError>;

    /// Listener name for logging and error reports.
    ///
    /// This name reaches HTTP clients in error bodies.
    fn name(&self) -> &str;
}

impl<P, F> EventListener<P> for F
where
    F: Fn(&P) -> Result<(), DomainError> + Send + Sync,
{
    fn handle(&self, payload: &P) -> Result<(), DomainError> {
        self(payload)
    }

    fn name(&self) -> &str {
        ANONYMOUS_LISTENER
    }
}

/// Name reported by listeners built without one.
pub const ANONYMOUS_LISTENER: &str = "anonymous";

/// Shared handle to a registered listener.
///
/// Identity is the allocation: unsubscribing compares handles with
/// [`Arc::ptr_eq`], so keep the handle returned by [`listener`] if you
/// intend to call `off` later.
pub type ListenerHandle<P = Payload> = Arc<dyn EventListener<P>>;

/// Wraps a closure into a [`ListenerHandle`].
pub fn listener<P, F>(f: F) -> ListenerHandle<P>
where
    P: 'static,
    F: Fn(&P) -> Result<(), DomainError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a closure into a [`ListenerHandle`] with an explicit name.
pub fn named_listener<P, F>(name: &'static str, f: F) -> ListenerHandle<P>
where
    P: 'static,
    F: Fn(&P) -> Result<(), DomainError> + Send + Sync + 'static,
{
    Arc::new(Named { name, f })
}

struct Named<F> {
    name: &'static str,
    f: F,
}

impl<P, F> EventListener<P> for Named<F>
where
    F: Fn(&P) -> Result<(), DomainError> + Send + Sync,
{
    fn handle(&self, payload: &P) -> Result<(), DomainError> {
        (self.f)(payload)
    }

    fn name(&self) -> &str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;
    use serde_json::json;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EventListener) {}

    #[test]
    fn closure_is_a_listener() {
        let l = listener(|payload: &Payload| {
            if payload == &json!("bad") {
                return Err(DomainError::new(ErrorCode::ListenerFailed, "rejected"));
            }
            Ok(())
        });

        assert!(l.handle(&json!("good")).is_ok());
        assert!(l.handle(&json!("bad")).is_err());
    }

    #[test]
    fn named_listener_reports_its_name() {
        let l: ListenerHandle = named_listener("audit", |_: &Payload| Ok(()));
        assert_eq!(l.name(), "audit");
    }

    #[test]
    fn unnamed_listener_reports_anonymous() {
        let l: ListenerHandle = listener(|_: &Payload| Ok(()));
        assert_eq!(l.name(), ANONYMOUS_LISTENER);
    }

    #[test]
    fn handles_compare_by_allocation() {
        let a: ListenerHandle = listener(|_: &Payload| Ok(()));
        let b = Arc::clone(&a);
        let c: ListenerHandle = listener(|_: &Payload| Ok(()));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
