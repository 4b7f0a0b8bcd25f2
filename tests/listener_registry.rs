//! Integration tests for the database listener registry
//!
//! Drive the registry against the in-memory data store, whose observers
//! fire on their own dispatch thread like the native SDK's.

use firebase_bridge::bridge::{CallbackId, ScriptChannel, Status};
use firebase_bridge::database::{
    DataStore, DatabaseListenerRegistry, EventType, InMemoryDataStore, Location, Query,
};
use firebase_bridge::DatabaseError;
use serde_json::json;
use std::sync::Arc;

fn setup() -> (Arc<InMemoryDataStore>, DatabaseListenerRegistry) {
    firebase_bridge::logging::init_tracing();
    let store = Arc::new(InMemoryDataStore::new());
    let registry = DatabaseListenerRegistry::new(store.clone());
    (store, registry)
}

fn value_query(path: &str) -> Query {
    Query::new(Location::default_db(path))
}

/// Test: value listener delivers the node under the subscription key
#[tokio::test]
async fn test_value_listener_delivers_changes() {
    let (store, registry) = setup();
    let (channel, mut receiver) = ScriptChannel::new();

    registry.subscribe(
        value_query("/rooms/1"),
        EventType::Value,
        "k1",
        channel.listener(CallbackId::from("cb")),
    );
    store
        .set(&Location::default_db("/rooms/1"), json!({"name": "A"}), None)
        .await
        .unwrap();
    store.flush().await;

    let messages = receiver.drain();
    assert_eq!(messages.len(), 2, "initial empty value, then the write");
    assert!(messages[0].payload["value"].is_null());

    let change = &messages[1];
    assert_eq!(change.status, Status::Ok);
    assert!(change.keep_callback);
    assert_eq!(change.payload["key"], "k1");
    assert_eq!(change.payload["eventType"], "VALUE");
    assert_eq!(change.payload["value"], json!({"name": "A"}));
}

/// Test: re-subscribing under one key never stacks native observers
#[tokio::test]
async fn test_resubscribe_keeps_one_native_handle() {
    let (store, registry) = setup();
    let (channel, _receiver) = ScriptChannel::new();

    for (i, event_type) in [EventType::Value, EventType::ChildAdded, EventType::ChildRemoved]
        .into_iter()
        .cycle()
        .take(12)
        .enumerate()
    {
        registry.subscribe(
            value_query("/rooms"),
            event_type,
            "same",
            channel.listener(CallbackId::from(format!("cb{}", i))),
        );
        assert_eq!(store.observer_count(), 1);
    }
    assert_eq!(registry.keys(), vec!["same".to_string()]);
}

/// Test: only the replacing callback receives deliveries
#[tokio::test]
async fn test_replaced_callback_receives_nothing() {
    let (store, registry) = setup();
    let (channel, mut receiver) = ScriptChannel::new();
    let room = Location::default_db("/rooms/1");

    registry.subscribe(value_query("/rooms/1"), EventType::Value, "k1", channel.listener(CallbackId::from("cb1")));
    registry.subscribe(value_query("/rooms/1"), EventType::Value, "k1", channel.listener(CallbackId::from("cb2")));
    store.set(&room, json!({"name": "A"}), None).await.unwrap();
    store.set(&room, json!({"name": "B"}), None).await.unwrap();
    store.flush().await;

    let messages = receiver.drain();
    assert!(!messages.is_empty());
    assert!(messages.iter().all(|m| m.callback_id == CallbackId::from("cb2")));
    assert_eq!(messages.last().unwrap().payload["value"], json!({"name": "B"}));
}

/// Test: nothing is delivered after unsubscribe returns
#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let (store, registry) = setup();
    let (channel, mut receiver) = ScriptChannel::new();
    let room = Location::default_db("/rooms/1");

    registry.subscribe(value_query("/rooms/1"), EventType::Value, "k1", channel.listener(CallbackId::from("cb")));
    store.flush().await;
    receiver.drain();

    // Queue a change, then remove the listener before it is delivered
    store.set(&room, json!(1), None).await.unwrap();
    assert!(registry.unsubscribe("k1"));
    store.set(&room, json!(2), None).await.unwrap();
    store.flush().await;

    assert!(receiver.drain().is_empty());
    assert_eq!(store.observer_count(), 0);
}

/// Test: unsubscribing an unknown key is a silent no-op
#[tokio::test]
async fn test_unsubscribe_unknown_key_is_noop() {
    let (store, registry) = setup();
    let (channel, mut receiver) = ScriptChannel::new();
    registry.subscribe(value_query("/a"), EventType::Value, "live", channel.listener(CallbackId::from("cb")));

    assert!(!registry.unsubscribe("missing"));
    assert!(!registry.unsubscribe("missing"));
    assert_eq!(registry.len(), 1);
    assert_eq!(store.observer_count(), 1);

    store.flush().await;
    assert!(receiver.drain().iter().all(|m| m.status == Status::Ok));
}

/// Test: permission denial fails the listener once and removes it
#[tokio::test]
async fn test_permission_denied_terminates_listener() {
    let (store, registry) = setup();
    let (channel, mut receiver) = ScriptChannel::new();
    let secret = Location::default_db("/secret");

    registry.subscribe(value_query("/secret"), EventType::Value, "k2", channel.listener(CallbackId::from("cb")));
    store.flush().await;
    receiver.drain();

    store.deny(&secret);
    store.flush().await;

    let messages = receiver.drain();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].status, Status::Error);
    assert!(!messages[0].keep_callback);
    assert_eq!(messages[0].payload["code"], "PERMISSION_DENIED");

    assert!(!registry.contains("k2"));
    assert!(!registry.unsubscribe("k2"));
    assert_eq!(store.observer_count(), 0);

    // Further writes reach nobody
    store.allow(&secret);
    store.set(&secret, json!(1), None).await.unwrap();
    store.flush().await;
    assert!(receiver.drain().is_empty());
}

/// Test: subscribing where access is already denied fails once, nothing stored
#[tokio::test]
async fn test_subscribe_on_denied_path() {
    let (store, registry) = setup();
    let (channel, mut receiver) = ScriptChannel::new();
    store.deny(&Location::default_db("/secret"));

    registry.subscribe(value_query("/secret/a"), EventType::Value, "k3", channel.listener(CallbackId::from("cb")));
    store.flush().await;

    let messages = receiver.drain();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload["code"], "PERMISSION_DENIED");
    assert!(registry.is_empty());
}

/// Test: connectivity cancellation is reported with the native code
#[tokio::test]
async fn test_cancellation_code_passes_through() {
    let (store, registry) = setup();
    let (channel, mut receiver) = ScriptChannel::new();
    registry.subscribe(value_query("/x"), EventType::Value, "k", channel.listener(CallbackId::from("cb")));
    store.flush().await;
    receiver.drain();

    assert_eq!(store.cancel_observers(&Location::default_db("/"), DatabaseError::Disconnected), 1);
    store.flush().await;

    let messages = receiver.drain();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload["code"], "DISCONNECTED");
    assert!(registry.is_empty());
}

/// Test: child listeners report node keys and ordering hints
#[tokio::test]
async fn test_child_listener_payloads() {
    let (store, registry) = setup();
    let (channel, mut receiver) = ScriptChannel::new();
    let scores = Location::default_db("/scores");
    store.set(&scores, json!({"a": 10, "b": 20}), None).await.unwrap();

    let query = Query::new(scores.clone()).order_by_value();
    registry.subscribe(query, EventType::ChildAdded, "added", channel.listener(CallbackId::from("cb")));
    store.set(&scores.child("c"), json!(15), None).await.unwrap();
    store.flush().await;

    let payloads: Vec<_> = receiver.drain().into_iter().map(|m| m.payload).collect();
    assert_eq!(payloads.len(), 3);
    assert!(payloads.iter().all(|p| p["key"] == "added" && p["eventType"] == "CHILD_ADDED"));
    assert_eq!(payloads[0]["nodeKey"], "a");
    assert!(payloads[0]["previousChildKey"].is_null());
    assert_eq!(payloads[1]["nodeKey"], "b");
    assert_eq!(payloads[2]["nodeKey"], "c");
    assert_eq!(payloads[2]["previousChildKey"], "a");
}

/// Test: unsubscribe_all removes only listeners at the given path
#[tokio::test]
async fn test_unsubscribe_all_by_path() {
    let (store, registry) = setup();
    let (channel, _receiver) = ScriptChannel::new();
    registry.subscribe(value_query("/rooms/1"), EventType::Value, "a", channel.listener(CallbackId::from("a")));
    registry.subscribe(value_query("/rooms/1"), EventType::ChildAdded, "b", channel.listener(CallbackId::from("b")));
    registry.subscribe(value_query("/rooms/1/members"), EventType::Value, "c", channel.listener(CallbackId::from("c")));

    assert_eq!(registry.unsubscribe_all("rooms/1/"), 2);
    assert_eq!(registry.keys(), vec!["c".to_string()]);
    assert_eq!(store.observer_count(), 1);
    assert_eq!(registry.unsubscribe_all("/rooms/1"), 0);
}

/// Test: concurrent subscribe/unsubscribe under shared keys never leaks handles
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_churn_leaves_no_handles() {
    let (store, registry) = setup();
    let registry = Arc::new(registry);
    let (channel, mut receiver) = ScriptChannel::new();
    let room = Location::default_db("/rooms/1");

    let mut workers = Vec::new();
    for worker in 0..8 {
        let registry = Arc::clone(&registry);
        let channel = channel.clone();
        workers.push(std::thread::spawn(move || {
            for i in 0..200 {
                let key = format!("k{}", i % 4);
                registry.subscribe(
                    value_query("/rooms/1"),
                    EventType::Value,
                    key.clone(),
                    channel.listener(CallbackId::from(format!("w{}-{}", worker, i))),
                );
                if i % 3 == 0 {
                    registry.unsubscribe(&key);
                }
            }
        }));
    }
    for i in 0..50 {
        store.set(&room, json!(i), None).await.unwrap();
    }
    for worker in workers {
        worker.join().unwrap();
    }

    assert!(registry.len() <= 4);
    assert_eq!(store.observer_count(), registry.len());

    registry.clear();
    store.flush().await;
    receiver.drain();
    store.set(&room, json!("after"), None).await.unwrap();
    store.flush().await;

    assert_eq!(store.observer_count(), 0);
    assert!(receiver.drain().is_empty());
}
