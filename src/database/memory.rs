//! In-memory Realtime Database
//!
//! A self-contained [`DataStore`] holding one JSON tree per database URL.
//! It stands in for the native SDK in tests and on hosts without one:
//! observers fire from a private dispatch thread, writes produce value and
//! child events, and permission rules can be toggled to cancel listeners.

use super::ordering::{apply_query, compare_keys, ChildEntry};
use super::push_id::PushIdGenerator;
use super::store::{DataEvent, DataEventSink, DataStore, ObserverHandle};
use super::types::{DataSnapshot, EventType, Limit, Location, Query};
use crate::dispatch::DispatchQueue;
use crate::error::DatabaseError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Last state an observer reported, used to compute the next events
#[derive(Debug, Clone)]
enum View {
    Value(DataSnapshot),
    Children(Vec<ChildEntry>),
}

struct Observer {
    query: Query,
    event_type: EventType,
    sink: DataEventSink,
    view: View,
}

#[derive(Debug)]
struct Database {
    root: Value,
    priorities: HashMap<String, Value>,
    online: bool,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            root: Value::Null,
            priorities: HashMap::new(),
            online: true,
        }
    }
}

#[derive(Default)]
struct StoreState {
    databases: HashMap<String, Database>,
    observers: BTreeMap<u64, Observer>,
    next_handle: u64,
    denied: Vec<Location>,
    fail_next_write: Option<DatabaseError>,
    queued_push_ids: VecDeque<String>,
    push_ids: PushIdGenerator,
    persistence_enabled: bool,
}

/// Events ready to be handed to one observer's sink
struct Notification {
    handle: u64,
    sink: DataEventSink,
    events: Vec<DataEvent>,
    /// Cancellations are delivered even though the observer is already gone
    require_live: bool,
}

/// In-memory [`DataStore`] with native-like asynchronous delivery
pub struct InMemoryDataStore {
    state: Arc<Mutex<StoreState>>,
    queue: DispatchQueue,
}

impl Default for InMemoryDataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDataStore {
    /// Create an empty store with its own dispatch thread
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            queue: DispatchQueue::new("firebase-database-dispatch"),
        }
    }

    /// Wait until every event queued so far has been delivered
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    /// Number of attached observers
    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    /// Current value at `location` (`null` when absent)
    pub fn value_at(&self, location: &Location) -> Value {
        let state = self.state.lock();
        state
            .databases
            .get(location.url())
            .and_then(|db| node_at(&db.root, &location.segments()).cloned())
            .unwrap_or(Value::Null)
    }

    /// Whether database `url` is connected
    pub fn is_online(&self, url: &str) -> bool {
        self.state
            .lock()
            .databases
            .get(url)
            .map_or(true, |db| db.online)
    }

    /// Whether the on-device cache is enabled
    pub fn is_persistence_enabled(&self) -> bool {
        self.state.lock().persistence_enabled
    }

    /// Use `id` as the key for the next push instead of a generated one
    pub fn enqueue_push_id(&self, id: impl Into<String>) {
        self.state.lock().queued_push_ids.push_back(id.into());
    }

    /// Fail the next write with `err`
    pub fn fail_next_write(&self, err: DatabaseError) {
        self.state.lock().fail_next_write = Some(err);
    }

    /// Deny access to `location` and everything below it
    ///
    /// Observers inside the denied subtree are cancelled with
    /// `PERMISSION_DENIED`, just as a security-rules change would.
    pub fn deny(&self, location: &Location) {
        self.state.lock().denied.push(location.clone());
        self.cancel_observers(location, DatabaseError::PermissionDenied);
    }

    /// Lift a denial previously added with [`deny`](Self::deny)
    pub fn allow(&self, location: &Location) {
        self.state.lock().denied.retain(|denied| denied != location);
    }

    /// Cancel every observer at or below `location` with `err`
    ///
    /// Returns how many observers were cancelled.
    pub fn cancel_observers(&self, location: &Location, err: DatabaseError) -> usize {
        let mut state = self.state.lock();
        let cancelled: Vec<u64> = state
            .observers
            .iter()
            .filter(|(_, o)| o.query.location.is_within(location))
            .map(|(handle, _)| *handle)
            .collect();
        let notifications: Vec<Notification> = cancelled
            .into_iter()
            .filter_map(|handle| state.observers.remove(&handle).map(|o| (handle, o)))
            .map(|(handle, observer)| Notification {
                handle,
                sink: observer.sink,
                events: vec![DataEvent::Cancelled(err.clone())],
                require_live: false,
            })
            .collect();
        let count = notifications.len();
        self.notify_all(notifications);
        count
    }

    /// Queue notifications for delivery
    ///
    /// Callers hold the state lock so events enter the queue in the same
    /// order the state changes that produced them.
    fn notify_all(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            if notification.events.is_empty() {
                continue;
            }
            let state = Arc::downgrade(&self.state);
            self.queue.dispatch(move || deliver(state, notification));
        }
    }

    /// Apply a mutation under the store lock and queue the resulting events
    fn write<F>(&self, location: &Location, mutate: F) -> Result<(), DatabaseError>
    where
        F: FnOnce(&mut Database),
    {
        let mut state = self.state.lock();

        // Injected failure and security rules first
        if let Some(err) = state.fail_next_write.take() {
            return Err(err);
        }
        if state.is_denied(location) {
            return Err(DatabaseError::PermissionDenied);
        }

        let db = state.databases.entry(location.url().to_string()).or_default();
        mutate(db);
        let notifications = state.refresh_observers(location);
        self.notify_all(notifications);
        Ok(())
    }
}

fn deliver(state: Weak<Mutex<StoreState>>, notification: Notification) {
    if notification.require_live {
        let live = state
            .upgrade()
            .is_some_and(|s| s.lock().observers.contains_key(&notification.handle));
        if !live {
            return;
        }
    }
    for event in notification.events {
        (notification.sink)(event);
    }
}

impl StoreState {
    fn is_denied(&self, location: &Location) -> bool {
        self.denied.iter().any(|denied| location.is_within(denied))
    }

    /// Recompute every observer related to a change at `changed`
    fn refresh_observers(&mut self, changed: &Location) -> Vec<Notification> {
        let databases = &self.databases;
        let mut notifications = Vec::new();
        for (handle, observer) in self.observers.iter_mut() {
            let observed = &observer.query.location;
            if !observed.is_within(changed) && !changed.is_within(observed) {
                continue;
            }
            let Some(db) = databases.get(observed.url()) else {
                continue;
            };
            let view = build_view(db, &observer.query, observer.event_type);
            let events = diff_views(&observer.view, &view, observer.event_type);
            observer.view = view;
            notifications.push(Notification {
                handle: *handle,
                sink: Arc::clone(&observer.sink),
                events,
                require_live: true,
            });
        }
        notifications
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    fn observe(
        &self,
        query: &Query,
        event_type: EventType,
        sink: DataEventSink,
    ) -> Result<ObserverHandle, DatabaseError> {
        if matches!(query.limit, Some(Limit::First(0)) | Some(Limit::Last(0))) {
            return Err(DatabaseError::OperationFailed(
                "query limit must be a positive integer".to_string(),
            ));
        }

        let mut state = self.state.lock();
        let notification = {
            state.next_handle += 1;
            let handle = state.next_handle;

            if state.is_denied(&query.location) {
                // The native SDK reports rule failures through the cancel block
                Notification {
                    handle,
                    sink,
                    events: vec![DataEvent::Cancelled(DatabaseError::PermissionDenied)],
                    require_live: false,
                }
            } else {
                let db = state.databases.entry(query.location.url().to_string()).or_default();
                let view = build_view(db, query, event_type);
                let events = initial_events(&view, event_type);
                state.observers.insert(
                    handle,
                    Observer {
                        query: query.clone(),
                        event_type,
                        sink: Arc::clone(&sink),
                        view,
                    },
                );
                Notification {
                    handle,
                    sink,
                    events,
                    require_live: true,
                }
            }
        };

        let handle = ObserverHandle(notification.handle);
        self.notify_all(vec![notification]);
        drop(state);
        debug!(handle = %handle, path = %query.location, event_type = %event_type, "observer attached");
        Ok(handle)
    }

    fn remove_observer(&self, handle: ObserverHandle) {
        if self.state.lock().observers.remove(&handle.0).is_some() {
            debug!(handle = %handle, "observer removed");
        }
    }

    async fn get(&self, query: &Query) -> Result<DataSnapshot, DatabaseError> {
        let state = self.state.lock();
        if state.is_denied(&query.location) {
            return Err(DatabaseError::PermissionDenied);
        }
        let snapshot = match state.databases.get(query.location.url()) {
            Some(db) => snapshot_of(db, query),
            None => DataSnapshot {
                key: query.location.key().map(str::to_string),
                value: Value::Null,
                priority: Value::Null,
                children: Vec::new(),
            },
        };
        Ok(snapshot)
    }

    async fn push(&self, location: &Location, value: Option<Value>) -> Result<String, DatabaseError> {
        let key = {
            let mut state = self.state.lock();
            match state.queued_push_ids.pop_front() {
                Some(key) => key,
                None => state.push_ids.generate(),
            }
        };

        // Key generation alone is local; only a value triggers a write
        if let Some(value) = value {
            self.set(&location.child(&key), value, None).await?;
        }
        Ok(key)
    }

    async fn set(
        &self,
        location: &Location,
        value: Value,
        priority: Option<Value>,
    ) -> Result<(), DatabaseError> {
        let value = normalize_value(value);
        let segments: Vec<String> = location.segments().iter().map(|s| s.to_string()).collect();
        let path = location.path().to_string();
        self.write(location, move |db| {
            let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
            if value.is_null() {
                clear_priorities(&mut db.priorities, &path);
            }
            write_at(&mut db.root, &segments, value);
            if let Some(priority) = priority.filter(|p| !p.is_null()) {
                db.priorities.insert(path, priority);
            }
        })
    }

    async fn set_priority(&self, location: &Location, priority: Value) -> Result<(), DatabaseError> {
        let path = location.path().to_string();
        self.write(location, move |db| {
            if priority.is_null() {
                db.priorities.remove(&path);
            } else {
                db.priorities.insert(path, priority);
            }
        })
    }

    async fn update(
        &self,
        location: &Location,
        patch: Map<String, Value>,
    ) -> Result<(), DatabaseError> {
        // Reject overlapping paths before touching anything
        let mut seen = HashSet::new();
        let mut writes = Vec::with_capacity(patch.len());
        for (relative, value) in patch {
            let target = location.child(&relative);
            if target.path() == location.path() || !seen.insert(target.path().to_string()) {
                return Err(DatabaseError::OperationFailed(format!(
                    "invalid update path '{}'",
                    relative
                )));
            }
            writes.push((target, normalize_value(value)));
        }
        for (a, _) in &writes {
            for (b, _) in &writes {
                if a != b && a.is_within(b) {
                    return Err(DatabaseError::OperationFailed(format!(
                        "update paths '{}' and '{}' overlap",
                        a.path(),
                        b.path()
                    )));
                }
            }
        }

        self.write(location, move |db| {
            for (target, value) in writes {
                if value.is_null() {
                    clear_priorities(&mut db.priorities, target.path());
                }
                write_at(&mut db.root, &target.segments(), value);
            }
        })
    }

    fn set_online(&self, url: &str, online: bool) {
        let mut state = self.state.lock();
        state.databases.entry(url.to_string()).or_default().online = online;
        debug!(url, online, "database connectivity changed");
    }

    fn set_persistence_enabled(&self, enabled: bool) {
        self.state.lock().persistence_enabled = enabled;
    }
}

fn node_at<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| node.get(*segment))
        .filter(|v| !v.is_null())
}

/// Write `value` at `segments`; `null` removes the node and prunes empty parents
fn write_at(node: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };
    let child = map.entry(first.to_string()).or_insert(Value::Null);
    write_at(child, rest, value);
    if child.is_null() {
        map.remove(*first);
    }
    if map.is_empty() {
        *node = Value::Null;
    }
}

/// Arrays become index-keyed objects, empty containers become `null`
fn normalize_value(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            let map: Map<String, Value> = items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), normalize_value(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize_value(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        scalar => scalar,
    }
}

fn clear_priorities(priorities: &mut HashMap<String, Value>, path: &str) {
    let prefix = if path == "/" {
        "/".to_string()
    } else {
        format!("{}/", path)
    };
    priorities.retain(|p, _| p != path && !p.starts_with(&prefix));
}

fn priority_of(db: &Database, path: &str) -> Value {
    db.priorities.get(path).cloned().unwrap_or(Value::Null)
}

fn sorted_keys(value: &Value) -> Vec<String> {
    let mut keys: Vec<String> = value
        .as_object()
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default();
    keys.sort_by(|a, b| compare_keys(a, b));
    keys
}

fn child_entries(db: &Database, query: &Query) -> Vec<ChildEntry> {
    let node = node_at(&db.root, &query.location.segments());
    let Some(Value::Object(children)) = node else {
        return Vec::new();
    };
    let entries = children
        .iter()
        .map(|(key, value)| ChildEntry {
            key: key.clone(),
            value: value.clone(),
            priority: priority_of(db, query.location.child(key).path()),
        })
        .collect();
    apply_query(entries, query)
}

fn snapshot_of(db: &Database, query: &Query) -> DataSnapshot {
    let location = &query.location;
    let key = location.key().map(str::to_string);
    let priority = priority_of(db, location.path());
    match node_at(&db.root, &location.segments()) {
        Some(Value::Object(_)) => {
            let entries = child_entries(db, query);
            let children = entries.iter().map(|e| e.key.clone()).collect();
            let value: Map<String, Value> =
                entries.into_iter().map(|e| (e.key, e.value)).collect();
            DataSnapshot {
                key,
                value: if value.is_empty() { Value::Null } else { Value::Object(value) },
                priority,
                children,
            }
        }
        Some(leaf) => DataSnapshot {
            key,
            value: leaf.clone(),
            priority,
            children: Vec::new(),
        },
        None => DataSnapshot {
            key,
            value: Value::Null,
            priority,
            children: Vec::new(),
        },
    }
}

fn build_view(db: &Database, query: &Query, event_type: EventType) -> View {
    if event_type.is_child_event() {
        View::Children(child_entries(db, query))
    } else {
        View::Value(snapshot_of(db, query))
    }
}

fn child_snapshot(entry: &ChildEntry) -> DataSnapshot {
    DataSnapshot {
        key: Some(entry.key.clone()),
        value: entry.value.clone(),
        priority: entry.priority.clone(),
        children: sorted_keys(&entry.value),
    }
}

fn child_event(event_type: EventType, entry: &ChildEntry, previous: Option<&str>) -> DataEvent {
    DataEvent::Change {
        event_type,
        snapshot: child_snapshot(entry),
        previous_child_key: previous.map(str::to_string),
    }
}

/// Events fired right after attaching an observer
fn initial_events(view: &View, event_type: EventType) -> Vec<DataEvent> {
    match (view, event_type) {
        (View::Value(snapshot), _) => vec![DataEvent::Change {
            event_type: EventType::Value,
            snapshot: snapshot.clone(),
            previous_child_key: None,
        }],
        (View::Children(children), EventType::ChildAdded) => {
            let mut previous: Option<&str> = None;
            children
                .iter()
                .map(|entry| {
                    let event = child_event(EventType::ChildAdded, entry, previous);
                    previous = Some(entry.key.as_str());
                    event
                })
                .collect()
        }
        (View::Children(_), _) => Vec::new(),
    }
}

fn previous_key(children: &[ChildEntry], index: usize) -> Option<&str> {
    index
        .checked_sub(1)
        .and_then(|i| children.get(i))
        .map(|e| e.key.as_str())
}

/// Events describing the transition from `old` to `new`
fn diff_views(old: &View, new: &View, event_type: EventType) -> Vec<DataEvent> {
    match (old, new) {
        (View::Value(before), View::Value(after)) => {
            if before == after {
                return Vec::new();
            }
            vec![DataEvent::Change {
                event_type: EventType::Value,
                snapshot: after.clone(),
                previous_child_key: None,
            }]
        }
        (View::Children(before), View::Children(after)) => {
            let old_index: HashMap<&str, usize> = before
                .iter()
                .enumerate()
                .map(|(i, e)| (e.key.as_str(), i))
                .collect();
            let new_keys: HashSet<&str> = after.iter().map(|e| e.key.as_str()).collect();
            let mut events = Vec::new();

            if event_type == EventType::ChildRemoved {
                for entry in before.iter().filter(|e| !new_keys.contains(e.key.as_str())) {
                    events.push(child_event(EventType::ChildRemoved, entry, None));
                }
                return events;
            }

            for (index, entry) in after.iter().enumerate() {
                let previous = previous_key(after, index);
                let Some(&old_at) = old_index.get(entry.key.as_str()) else {
                    if event_type == EventType::ChildAdded {
                        events.push(child_event(EventType::ChildAdded, entry, previous));
                    }
                    continue;
                };
                let old_entry = &before[old_at];
                let changed = old_entry.value != entry.value || old_entry.priority != entry.priority;
                match event_type {
                    EventType::ChildChanged if changed => {
                        events.push(child_event(EventType::ChildChanged, entry, previous));
                    }
                    EventType::ChildMoved if changed && previous_key(before, old_at) != previous => {
                        events.push(child_event(EventType::ChildMoved, entry, previous));
                    }
                    _ => {}
                }
            }
            events
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;

    fn recording_sink() -> (DataEventSink, Arc<SyncMutex<Vec<DataEvent>>>) {
        let events = Arc::new(SyncMutex::new(Vec::new()));
        let captured = Arc::clone(&events);
        let sink: DataEventSink = Arc::new(move |event| captured.lock().push(event));
        (sink, events)
    }

    fn change_types(events: &[DataEvent]) -> Vec<(EventType, Option<String>)> {
        events
            .iter()
            .filter_map(|e| match e {
                DataEvent::Change {
                    event_type,
                    snapshot,
                    ..
                } => Some((*event_type, snapshot.key.clone())),
                DataEvent::Cancelled(_) => None,
            })
            .collect()
    }

    fn last_value(events: &[DataEvent]) -> Option<Value> {
        events.iter().rev().find_map(|e| match e {
            DataEvent::Change { snapshot, .. } => Some(snapshot.value.clone()),
            DataEvent::Cancelled(_) => None,
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_deliver_latest_value_last() {
        let store = Arc::new(InMemoryDataStore::new());
        let counter = Location::default_db("/counter");

        for round in 0..50 {
            let mut writers = Vec::new();
            let mut observed = Vec::new();
            for writer in 0..4 {
                writers.push({
                    let store = Arc::clone(&store);
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        for i in 0..10 {
                            store
                                .set(&counter, json!(format!("{}-{}-{}", round, writer, i)), None)
                                .await
                                .unwrap();
                        }
                    })
                });
                // Attach observers while the writers run
                let (sink, events) = recording_sink();
                let handle = store
                    .observe(&Query::new(counter.clone()), EventType::Value, sink)
                    .unwrap();
                observed.push((handle, events));
            }
            for writer in writers {
                writer.await.unwrap();
            }
            store.flush().await;

            let expected = store.value_at(&counter);
            for (handle, events) in observed {
                assert_eq!(last_value(&events.lock()), Some(expected.clone()));
                store.remove_observer(handle);
            }
        }
        assert_eq!(store.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_set_and_read_back() {
        let store = InMemoryDataStore::new();
        let room = Location::default_db("/rooms/1");
        store.set(&room, json!({"name": "A", "tags": ["x", "y"]}), None).await.unwrap();

        assert_eq!(store.value_at(&room.child("name")), json!("A"));
        assert_eq!(store.value_at(&room.child("tags")), json!({"0": "x", "1": "y"}));

        store.set(&room, Value::Null, None).await.unwrap();
        assert_eq!(store.value_at(&Location::default_db("/rooms")), Value::Null);
    }

    #[tokio::test]
    async fn test_value_observer_fires_on_change_only() {
        let store = InMemoryDataStore::new();
        let room = Location::default_db("/rooms/1");
        let (sink, events) = recording_sink();

        store.observe(&Query::new(room.clone()), EventType::Value, sink).unwrap();
        store.set(&room.child("name"), json!("A"), None).await.unwrap();
        store.set(&room.child("name"), json!("A"), None).await.unwrap();
        store.set(&Location::default_db("/other"), json!(1), None).await.unwrap();
        store.flush().await;

        let events = events.lock();
        assert_eq!(events.len(), 2);
        let DataEvent::Change { snapshot, .. } = &events[1] else {
            panic!("expected change");
        };
        assert_eq!(snapshot.value, json!({"name": "A"}));
    }

    #[tokio::test]
    async fn test_child_events() {
        let store = InMemoryDataStore::new();
        let rooms = Location::default_db("/rooms");
        store.set(&rooms, json!({"a": 1}), None).await.unwrap();

        let (added_sink, added) = recording_sink();
        let (changed_sink, changed) = recording_sink();
        let (removed_sink, removed) = recording_sink();
        let query = Query::new(rooms.clone());
        store.observe(&query, EventType::ChildAdded, added_sink).unwrap();
        store.observe(&query, EventType::ChildChanged, changed_sink).unwrap();
        store.observe(&query, EventType::ChildRemoved, removed_sink).unwrap();

        store.set(&rooms.child("b"), json!(2), None).await.unwrap();
        store.set(&rooms.child("a"), json!(10), None).await.unwrap();
        store.set(&rooms.child("b"), Value::Null, None).await.unwrap();
        store.flush().await;

        assert_eq!(
            change_types(&added.lock()),
            vec![
                (EventType::ChildAdded, Some("a".to_string())),
                (EventType::ChildAdded, Some("b".to_string())),
            ]
        );
        assert_eq!(
            change_types(&changed.lock()),
            vec![(EventType::ChildChanged, Some("a".to_string()))]
        );
        assert_eq!(
            change_types(&removed.lock()),
            vec![(EventType::ChildRemoved, Some("b".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_child_added_reports_previous_sibling() {
        let store = InMemoryDataStore::new();
        let scores = Location::default_db("/scores");
        store.set(&scores, json!({"x": 3, "y": 1}), None).await.unwrap();

        let (sink, events) = recording_sink();
        let query = Query::new(scores.clone()).order_by_value();
        store.observe(&query, EventType::ChildAdded, sink).unwrap();
        store.flush().await;

        let previous: Vec<Option<String>> = events
            .lock()
            .iter()
            .map(|e| match e {
                DataEvent::Change {
                    previous_child_key, ..
                } => previous_child_key.clone(),
                DataEvent::Cancelled(_) => None,
            })
            .collect();
        assert_eq!(previous, vec![None, Some("y".to_string())]);
    }

    #[tokio::test]
    async fn test_child_moved_on_reorder() {
        let store = InMemoryDataStore::new();
        let scores = Location::default_db("/scores");
        store.set(&scores, json!({"x": 1, "y": 2}), None).await.unwrap();

        let (sink, events) = recording_sink();
        store
            .observe(&Query::new(scores.clone()).order_by_value(), EventType::ChildMoved, sink)
            .unwrap();
        store.set(&scores.child("x"), json!(5), None).await.unwrap();
        store.flush().await;

        assert_eq!(
            change_types(&events.lock()),
            vec![(EventType::ChildMoved, Some("x".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_deny_cancels_observers_and_writes() {
        let store = InMemoryDataStore::new();
        let secret = Location::default_db("/secret");
        let (sink, events) = recording_sink();
        store.observe(&Query::new(secret.clone()), EventType::Value, sink).unwrap();

        store.deny(&secret);
        store.flush().await;

        assert_eq!(store.observer_count(), 0);
        assert!(matches!(
            events.lock().last(),
            Some(DataEvent::Cancelled(DatabaseError::PermissionDenied))
        ));
        assert_eq!(
            store.set(&secret.child("x"), json!(1), None).await,
            Err(DatabaseError::PermissionDenied)
        );

        store.allow(&secret);
        assert!(store.set(&secret.child("x"), json!(1), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_removed_observer_gets_no_queued_events() {
        let store = InMemoryDataStore::new();
        let room = Location::default_db("/rooms/1");
        let (sink, events) = recording_sink();

        let handle = store.observe(&Query::new(room.clone()), EventType::Value, sink).unwrap();
        store.remove_observer(handle);
        store.set(&room, json!(1), None).await.unwrap();
        store.flush().await;

        assert!(events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_push_uses_queued_id() {
        let store = InMemoryDataStore::new();
        let rooms = Location::default_db("/rooms");
        store.enqueue_push_id("-NxYz");

        let key = store.push(&rooms, Some(json!({"name": "B"}))).await.unwrap();
        assert_eq!(key, "-NxYz");
        assert_eq!(store.value_at(&rooms.child("-NxYz/name")), json!("B"));

        let generated = store.push(&rooms, None).await.unwrap();
        assert_eq!(generated.len(), 20);
        assert_eq!(store.value_at(&rooms.child(&generated)), Value::Null);
    }

    #[tokio::test]
    async fn test_update_merges_relative_paths() {
        let store = InMemoryDataStore::new();
        let user = Location::default_db("/users/u1");
        store.set(&user, json!({"name": "Ann", "age": 30}), None).await.unwrap();

        let patch = json!({"age": 31, "address/city": "Oslo"});
        store
            .update(&user, patch.as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(
            store.value_at(&user),
            json!({"name": "Ann", "age": 31, "address": {"city": "Oslo"}})
        );

        let overlapping = json!({"address": {}, "address/city": "Bergen"});
        assert!(store
            .update(&user, overlapping.as_object().cloned().unwrap())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_priorities_and_injected_failure() {
        let store = InMemoryDataStore::new();
        let node = Location::default_db("/p/a");
        store.set(&node, json!("v"), Some(json!(5))).await.unwrap();

        let snapshot = store.get(&Query::new(node.clone())).await.unwrap();
        assert_eq!(snapshot.priority, json!(5));

        store.fail_next_write(DatabaseError::Disconnected);
        assert_eq!(
            store.set(&node, json!("w"), None).await,
            Err(DatabaseError::Disconnected)
        );
        assert_eq!(store.value_at(&node), json!("v"));
    }

    #[test]
    fn test_connectivity_and_persistence_flags() {
        let store = InMemoryDataStore::new();
        assert!(store.is_online(""));
        store.set_online("", false);
        assert!(!store.is_online(""));
        store.set_persistence_enabled(true);
        assert!(store.is_persistence_enabled());
    }
}
