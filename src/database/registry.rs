//! Keyed registry of native database listeners
//!
//! Each subscription pairs one native observer handle with one
//! [`ListenerCallback`], keyed by a caller-chosen string. All registry state
//! lives behind a single mutex that is also taken by every native delivery,
//! so a delivery can never race an `unsubscribe` or a replacing `subscribe`
//! for the same key.
//!
//! # Native Reference
//! - `FIRDatabaseQuery observeEventType:withBlock:withCancelBlock:`
//! - `FIRDatabaseQuery removeObserverWithHandle:`
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use firebase_bridge::bridge::{CallbackId, ScriptChannel};
//! use firebase_bridge::database::{
//!     DatabaseListenerRegistry, EventType, InMemoryDataStore, Location, Query,
//! };
//!
//! let store = Arc::new(InMemoryDataStore::new());
//! let registry = DatabaseListenerRegistry::new(store.clone());
//! let (channel, _receiver) = ScriptChannel::new();
//!
//! let query = Query::new(Location::default_db("/rooms/1"));
//! registry.subscribe(query, EventType::Value, "k1", channel.listener(CallbackId::from("cb")));
//! assert!(registry.contains("k1"));
//!
//! assert!(registry.unsubscribe("k1"));
//! assert!(!registry.unsubscribe("k1"));
//! assert_eq!(store.observer_count(), 0);
//! ```

use super::store::{DataEvent, DataEventSink, DataStore, ObserverHandle};
use super::types::{normalize_path, EventType, Query};
use crate::bridge::ListenerCallback;
use crate::error::FirebaseError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// One live listener
struct Subscription {
    query: Query,
    event_type: EventType,
    handle: ObserverHandle,
    /// Distinguishes this registration from earlier ones under the same key
    generation: u64,
    callback: ListenerCallback,
}

#[derive(Default)]
struct RegistryState {
    subscriptions: HashMap<String, Subscription>,
    next_generation: u64,
}

/// Registry of database listeners keyed by caller-supplied strings
///
/// At most one native observer is live per key. Every native handle is
/// cancelled before its entry is discarded, including when the registry
/// itself is dropped.
pub struct DatabaseListenerRegistry {
    store: Arc<dyn DataStore>,
    state: Arc<Mutex<RegistryState>>,
}

impl DatabaseListenerRegistry {
    /// Create an empty registry over `store`
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(RegistryState::default())),
        }
    }

    /// Attach a listener for `event_type` on `query` under `key`
    ///
    /// A live subscription already registered under `key` is cancelled and
    /// replaced in the same critical section, so its callback receives
    /// nothing further. Returns immediately; deliveries arrive later on the
    /// data store's own context. If the data store refuses the observer,
    /// `callback` fails once and nothing is stored.
    pub fn subscribe(
        &self,
        query: Query,
        event_type: EventType,
        key: impl Into<String>,
        callback: ListenerCallback,
    ) {
        let key = key.into();
        let mut state = self.state.lock();

        if let Some(previous) = state.subscriptions.remove(&key) {
            self.store.remove_observer(previous.handle);
            debug!(key = %key, handle = %previous.handle, "replacing listener");
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let sink = delivery_sink(
            Arc::downgrade(&self.state),
            Arc::downgrade(&self.store),
            key.clone(),
            generation,
        );

        let handle = match self.store.observe(&query, event_type, sink) {
            Err(err) => {
                drop(state);
                warn!(key = %key, path = %query.location, error = %err, "data store refused listener");
                callback.fail(&err.into());
                return;
            }
            Ok(handle) => handle,
        };

        debug!(
            key = %key,
            path = %query.location,
            event_type = %event_type,
            handle = %handle,
            "listener attached"
        );
        state.subscriptions.insert(
            key,
            Subscription {
                query,
                event_type,
                handle,
                generation,
                callback,
            },
        );
    }

    /// Remove the listener registered under `key`
    ///
    /// Returns `false` without side effects when no such listener exists.
    /// Once this returns, no further delivery for `key` happens.
    pub fn unsubscribe(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        let Some(subscription) = state.subscriptions.remove(key) else {
            trace!(key, "unsubscribe for unknown key");
            return false;
        };
        self.store.remove_observer(subscription.handle);
        debug!(key, handle = %subscription.handle, "listener removed");
        true
    }

    /// Remove every listener whose query path is `path`
    ///
    /// Returns how many listeners were removed.
    pub fn unsubscribe_all(&self, path: &str) -> usize {
        let path = normalize_path(path);
        let mut removed = 0;
        let mut state = self.state.lock();
        state.subscriptions.retain(|key, subscription| {
            if subscription.query.location.path() != path {
                return true;
            }
            self.store.remove_observer(subscription.handle);
            debug!(key = %key, handle = %subscription.handle, "listener removed");
            removed += 1;
            false
        });
        removed
    }

    /// Remove every listener
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.subscriptions.len();
        for (_, subscription) in state.subscriptions.drain() {
            self.store.remove_observer(subscription.handle);
        }
        count
    }

    /// Number of live listeners
    pub fn len(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Whether no listener is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a listener is live under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().subscriptions.contains_key(key)
    }

    /// Event kind observed under `key`
    pub fn event_type(&self, key: &str) -> Option<EventType> {
        self.state.lock().subscriptions.get(key).map(|s| s.event_type)
    }

    /// Query observed under `key`
    ///
    /// Unlike [`unsubscribe`](Self::unsubscribe), a missing key is an error.
    pub fn query(&self, key: &str) -> Result<Query, FirebaseError> {
        self.state
            .lock()
            .subscriptions
            .get(key)
            .map(|s| s.query.clone())
            .ok_or_else(|| FirebaseError::UnknownSubscription(key.to_string()))
    }

    /// Keys of all live listeners, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.lock().subscriptions.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Drop for DatabaseListenerRegistry {
    fn drop(&mut self) {
        let removed = self.clear();
        if removed > 0 {
            debug!(removed, "registry dropped, listeners detached");
        }
    }
}

/// Build the sink handed to the data store for one registration
///
/// The sink holds only weak references, so outstanding native observers
/// never keep the registry or the store alive.
fn delivery_sink(
    state: Weak<Mutex<RegistryState>>,
    store: Weak<dyn DataStore>,
    key: String,
    generation: u64,
) -> DataEventSink {
    Arc::new(move |event: DataEvent| {
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut state = state.lock();

        match event {
            DataEvent::Change {
                event_type,
                snapshot,
                previous_child_key,
            } => {
                let Some(subscription) = state
                    .subscriptions
                    .get(&key)
                    .filter(|s| s.generation == generation)
                else {
                    trace!(key = %key, "dropping event for inactive listener");
                    return;
                };
                subscription.callback.deliver(snapshot.to_payload(
                    Some(&key),
                    event_type,
                    previous_child_key.as_deref(),
                ));
            }
            DataEvent::Cancelled(err) => {
                let live = state
                    .subscriptions
                    .get(&key)
                    .is_some_and(|s| s.generation == generation);
                if !live {
                    trace!(key = %key, "dropping cancellation for inactive listener");
                    return;
                }
                let Some(subscription) = state.subscriptions.remove(&key) else {
                    return;
                };
                if let Some(store) = store.upgrade() {
                    store.remove_observer(subscription.handle);
                }
                warn!(
                    key = %key,
                    path = %subscription.query.location,
                    error = %err,
                    "listener cancelled by data store"
                );
                subscription.callback.fail(&err.into());
            }
        }
    })
}
