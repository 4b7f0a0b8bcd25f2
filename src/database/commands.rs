//! One-shot Realtime Database commands
//!
//! Each command makes at most one native call and resolves its
//! [`Continuation`] exactly once. Argument problems are reported on the
//! continuation without touching the data store.
//!
//! # Native Reference
//! - `FIRDatabaseReference childByAutoId` / `setValue:withCompletionBlock:`
//! - `FIRDatabaseReference setValue:andPriority:` / `setPriority:`
//! - `FIRDatabaseReference updateChildValues:withCompletionBlock:`
//! - `FIRDatabaseQuery observeSingleEventOfType:withBlock:withCancelBlock:`
//! - `FIRDatabase goOnline` / `goOffline`

use super::settings::DatabaseSettings;
use super::store::DataStore;
use super::types::{EventType, Location, Query};
use crate::bridge::Continuation;
use crate::error::FirebaseError;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Write and single-read commands against a [`DataStore`]
#[derive(Clone)]
pub struct DatabaseCommands {
    store: Arc<dyn DataStore>,
    runtime: Handle,
    settings: DatabaseSettings,
}

impl DatabaseCommands {
    /// Create commands that run their native calls on `runtime`
    pub fn new(store: Arc<dyn DataStore>, runtime: Handle, settings: DatabaseSettings) -> Self {
        Self {
            store,
            runtime,
            settings,
        }
    }

    /// Settings used to resolve database URLs
    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    /// Generate a child key under `location`, writing `value` there unless it is `null`
    ///
    /// Resolves with `{key, path}` of the new child.
    pub fn push(&self, location: Location, value: Value, continuation: Continuation) {
        let store = Arc::clone(&self.store);
        self.runtime.spawn(async move {
            let value = (!value.is_null()).then_some(value);
            let result = store.push(&location, value).await.map(|key| {
                let path = location.child(&key).path().to_string();
                debug!(path = %path, "pushed child");
                json!({ "key": key, "path": path })
            });
            continuation.resolve(result);
        });
    }

    /// Replace the value at `location`
    ///
    /// A `null` value removes the node, unless a priority is given, in which
    /// case only the priority is written.
    pub fn set(
        &self,
        location: Location,
        value: Value,
        priority: Option<Value>,
        continuation: Continuation,
    ) {
        let store = Arc::clone(&self.store);
        self.runtime.spawn(async move {
            let priority = priority.filter(|p| !p.is_null());
            let result = match (value.is_null(), priority) {
                (true, Some(priority)) => store.set_priority(&location, priority).await,
                (_, priority) => store.set(&location, value, priority).await,
            };
            continuation.resolve(result.map(|()| Value::Null));
        });
    }

    /// Merge `patch` into `location`; keys may be multi-segment relative paths
    pub fn update(&self, location: Location, patch: Value, continuation: Continuation) {
        // Validate patch (error case first)
        let Value::Object(patch) = patch else {
            continuation.error(&FirebaseError::invalid_argument("update value must be an object"));
            return;
        };
        let store = Arc::clone(&self.store);
        self.runtime.spawn(async move {
            let result = store.update(&location, patch).await;
            continuation.resolve(result.map(|()| Value::Null));
        });
    }

    /// Connect to or disconnect from the database at `url`
    ///
    /// Fire-and-forget: acknowledged immediately with `null`.
    pub fn set_online(&self, url: &str, online: bool, continuation: Continuation) {
        let url = self.settings.resolve_url(url);
        self.store.set_online(&url, online);
        debug!(url = %url, online, "set database connectivity");
        continuation.success(Value::Null);
    }

    /// Read the data matching `query` once
    ///
    /// Only [`EventType::Value`] is supported. Resolves with a listener-style
    /// payload whose `key` is `null`.
    pub fn once(&self, query: Query, event_type: EventType, continuation: Continuation) {
        // Validate event type (error case first)
        if event_type != EventType::Value {
            continuation.error(&FirebaseError::invalid_argument(format!(
                "single reads support VALUE only, got {}",
                event_type
            )));
            return;
        }
        let store = Arc::clone(&self.store);
        self.runtime.spawn(async move {
            let result = store
                .get(&query)
                .await
                .map(|snapshot| snapshot.to_payload(None, EventType::Value, None));
            continuation.resolve(result);
        });
    }
}
