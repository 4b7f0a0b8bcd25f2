//! Native data store interface
//!
//! The bridge treats the Realtime Database SDK as an opaque, correct service
//! reached only through [`DataStore`]. Observers are attached with a sink
//! closure and cancelled with the [`ObserverHandle`] returned at attach time.
//!
//! # Native Reference
//! - `FIRDatabaseQuery observeEventType:withBlock:withCancelBlock:` -> `FIRDatabaseHandle`
//! - `FIRDatabaseQuery removeObserverWithHandle:`
//! - `FIRDatabaseReference childByAutoId / setValue:andPriority: / updateChildValues:`
//! - `FIRDatabase goOnline / goOffline`

use super::types::{DataSnapshot, EventType, Location, Query};
use crate::error::DatabaseError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Opaque token identifying one native observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverHandle(pub u64);

impl fmt::Display for ObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Notification emitted by a native observer
#[derive(Debug, Clone, PartialEq)]
pub enum DataEvent {
    /// Data changed
    Change {
        /// Kind of change
        event_type: EventType,
        /// Changed node (the child for child events)
        snapshot: DataSnapshot,
        /// Key of the sibling preceding the child in query order
        previous_child_key: Option<String>,
    },
    /// Observer was cancelled by the service; no further events follow
    Cancelled(DatabaseError),
}

/// Callback receiving native observer events
pub type DataEventSink = Arc<dyn Fn(DataEvent) + Send + Sync>;

/// Hierarchical key-value data store (Realtime Database SDK)
///
/// # Contract
/// - `observe` returns without invoking `sink`; events arrive later on a
///   context owned by the implementation.
/// - `remove_observer` never waits for in-flight callbacks and ignores
///   unknown handles.
/// - Sinks are never invoked while the caller of `observe` or
///   `remove_observer` is still inside that call.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Attach an observer for `event_type` changes matching `query`
    fn observe(
        &self,
        query: &Query,
        event_type: EventType,
        sink: DataEventSink,
    ) -> Result<ObserverHandle, DatabaseError>;

    /// Detach a previously attached observer
    fn remove_observer(&self, handle: ObserverHandle);

    /// Read the current value matching `query` once
    async fn get(&self, query: &Query) -> Result<DataSnapshot, DatabaseError>;

    /// Generate a child key under `location`, writing `value` there when given
    async fn push(&self, location: &Location, value: Option<Value>) -> Result<String, DatabaseError>;

    /// Replace the value at `location`; `null` removes the node
    async fn set(
        &self,
        location: &Location,
        value: Value,
        priority: Option<Value>,
    ) -> Result<(), DatabaseError>;

    /// Set only the priority of the node at `location`
    async fn set_priority(&self, location: &Location, priority: Value) -> Result<(), DatabaseError>;

    /// Merge `patch` (relative paths to values) into `location`
    async fn update(
        &self,
        location: &Location,
        patch: Map<String, Value>,
    ) -> Result<(), DatabaseError>;

    /// Connect to or disconnect from the backend for database `url`
    fn set_online(&self, url: &str, online: bool);

    /// Enable or disable the on-device cache
    fn set_persistence_enabled(&self, enabled: bool);
}
