//! End-to-end scenarios for the relay core.
//!
//! These tests drive the public API the way a transport and business logic
//! would: polls in, emits from elsewhere, listeners reacting in between.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use longpoll_relay::domain::foundation::{DomainError, ErrorCode};
use longpoll_relay::domain::relay::{
    Connection, ConnectionRegistry, RelayConfig, RelayEvent, DISCONNECT_EVENT,
};
use longpoll_relay::ports::{listener, Payload};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn registry() -> ConnectionRegistry {
    ConnectionRegistry::new(RelayConfig::default())
}

fn ev(name: &str, data: serde_json::Value) -> RelayEvent {
    RelayEvent::new(name, data)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn global_emit_is_delivered_once() {
    let registry = registry();
    let a = registry.handle_poll(None, Vec::new()).unwrap().id;

    registry.emit("ping", &json!(1));

    let first = registry.handle_poll(Some(a), Vec::new()).unwrap();
    assert_eq!(first.id, a);
    assert_eq!(first.events, vec![ev("ping", json!(1))]);

    let second = registry.handle_poll(Some(a), Vec::new()).unwrap();
    assert!(second.events.is_empty());
}

#[tokio::test]
async fn room_emit_reaches_members_only() {
    let registry = registry();
    let a = registry.connect().connection;
    let b = registry.connect().connection;
    let c = registry.connect().connection;
    a.join("room1");
    b.join("room1");

    registry.to("room1").emit("x", &json!(5));

    for member in [&a, &b] {
        let response = registry.handle_poll(Some(member.id()), Vec::new()).unwrap();
        assert_eq!(response.events, vec![ev("x", json!(5))]);
    }
    let outsider = registry.handle_poll(Some(c.id()), Vec::new()).unwrap();
    assert!(outsider.events.is_empty());
}

#[tokio::test]
async fn client_event_reaches_listener_during_poll() {
    let registry = registry();
    let conn = registry.connect().connection;
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    conn.on(
        "chat",
        listener(move |payload: &Payload| {
            sink.lock().unwrap().push(payload.clone());
            Ok(())
        }),
    );

    registry
        .handle_poll(Some(conn.id()), vec![ev("chat", json!("hi"))])
        .unwrap();

    assert_eq!(*received.lock().unwrap(), vec![json!("hi")]);
}

#[tokio::test]
async fn chat_room_round_trip() {
    // Business logic: every new connection joins "lobby" and relays chat to
    // the rest of the lobby.
    let registry = registry();
    registry.on_connection(listener(|conn: &Arc<Connection>| {
        conn.join("lobby");
        let weak = Arc::downgrade(conn);
        conn.on(
            "chat",
            listener(move |payload: &Payload| {
                if let Some(me) = weak.upgrade() {
                    me.to("lobby").emit("chat", payload);
                }
                Ok(())
            }),
        );
        Ok(())
    }));

    let alice = registry.handle_poll(None, Vec::new()).unwrap().id;
    let bob = registry.handle_poll(None, Vec::new()).unwrap().id;

    let alice_poll = registry
        .handle_poll(Some(alice), vec![ev("chat", json!("hello bob"))])
        .unwrap();
    assert!(alice_poll.events.is_empty());

    let bob_poll = registry.handle_poll(Some(bob), Vec::new()).unwrap();
    assert_eq!(bob_poll.events, vec![ev("chat", json!("hello bob"))]);
}

#[tokio::test]
async fn disconnect_then_poll_yields_new_identity() {
    let registry = registry();
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    registry.on_connection(listener(move |_: &Arc<Connection>| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    let original = registry.connect().connection;
    original.queue_event("lost", json!(1));
    original.disconnect().unwrap();
    original.disconnect().unwrap();

    let response = registry.handle_poll(Some(original.id()), Vec::new()).unwrap();

    assert_ne!(response.id, original.id());
    assert!(response.events.is_empty());
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failing_listener_is_surfaced_and_others_still_run() {
    let registry = registry();
    let conn = registry.connect().connection;
    let ran = Arc::new(AtomicUsize::new(0));

    conn.on(
        "cmd",
        listener(|_: &Payload| Err(DomainError::new(ErrorCode::ListenerFailed, "broken"))),
    );
    let counter = Arc::clone(&ran);
    conn.on(
        "cmd",
        listener(move |_: &Payload| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );

    let err = registry
        .handle_poll(Some(conn.id()), vec![ev("cmd", json!(null)), ev("cmd", json!(null))])
        .unwrap_err();

    assert_eq!(err.connection_id, conn.id());
    assert_eq!(err.failures.len(), 2);
    assert_eq!(ran.load(Ordering::SeqCst), 2);
    assert!(registry.get(conn.id()).is_some());
}

#[tokio::test(start_paused = true)]
async fn idle_timeout_behaves_like_disconnect() {
    let registry = ConnectionRegistry::new(
        RelayConfig::default().with_idle_timeout(Duration::from_secs(10)),
    );
    let disconnects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&disconnects);
    registry.on_disconnect(listener(move |_: &Arc<Connection>| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    let id = registry.handle_poll(None, Vec::new()).unwrap().id;
    registry.emit("queued", &json!(1));

    tokio::time::sleep(Duration::from_secs(11)).await;

    assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    assert!(registry.get(id).is_none());

    let fresh = registry.handle_poll(Some(id), Vec::new()).unwrap();
    assert_ne!(fresh.id, id);
    assert!(fresh.events.is_empty());
}

#[tokio::test(start_paused = true)]
async fn expired_connections_are_skipped_by_broadcast() {
    let registry = ConnectionRegistry::new(
        RelayConfig::default().with_idle_timeout(Duration::from_secs(10)),
    );
    let stale = registry.connect().connection;

    tokio::time::sleep(Duration::from_secs(5)).await;
    let live = registry.connect().connection;
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert_eq!(registry.emit("news", &json!("x")), 1);
    assert_eq!(stale.pending_count(), 0);
    assert_eq!(live.pending_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_listener_fires_once_on_timeout() {
    let registry = ConnectionRegistry::new(
        RelayConfig::default().with_idle_timeout(Duration::from_secs(1)),
    );
    let conn = registry.connect().connection;
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    conn.on(
        DISCONNECT_EVENT,
        listener(move |_: &Payload| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    conn.disconnect().unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_polls_and_emits_lose_nothing() {
    let registry = registry();
    let id = registry.handle_poll(None, Vec::new()).unwrap().id;

    let emitters: Vec<_> = (0..4)
        .map(|worker| {
            let registry = registry.clone();
            tokio::spawn(async move {
                for i in 0..250 {
                    registry.emit("tick", &json!({ "worker": worker, "seq": i }));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let poller = {
        let registry = registry.clone();
        tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..200 {
                let response = registry.handle_poll(Some(id), Vec::new()).unwrap();
                assert_eq!(response.id, id);
                seen.extend(response.events);
                tokio::task::yield_now().await;
            }
            seen
        })
    };

    for emitter in emitters {
        emitter.await.unwrap();
    }
    let mut seen = poller.await.unwrap();
    seen.extend(registry.handle_poll(Some(id), Vec::new()).unwrap().events);

    assert_eq!(seen.len(), 1000);
    for worker in 0..4 {
        let seqs: Vec<i64> = seen
            .iter()
            .filter(|e| e.data["worker"] == json!(worker))
            .map(|e| e.data["seq"].as_i64().unwrap())
            .collect();
        let expected: Vec<i64> = (0..250).collect();
        assert_eq!(seqs, expected, "worker {} events out of order", worker);
    }
}
