//! Realtime Database value types
//!
//! # Native Reference
//! - `FIRDatabaseQuery.h` - ordering, range and limit modifiers
//! - `FIRDataSnapshot.h` - key / value / priority / children
//! - `FIRDataEventType` - value and child event kinds

use crate::error::FirebaseError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Kind of change a listener observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Whole-node snapshot on every change
    Value,
    /// A child was added (also fired for existing children on attach)
    ChildAdded,
    /// A child's contents changed
    ChildChanged,
    /// A child was removed
    ChildRemoved,
    /// A child's position in the query ordering changed
    ChildMoved,
}

impl EventType {
    /// Upper-case name used in delivery payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Value => "VALUE",
            Self::ChildAdded => "CHILD_ADDED",
            Self::ChildChanged => "CHILD_CHANGED",
            Self::ChildRemoved => "CHILD_REMOVED",
            Self::ChildMoved => "CHILD_MOVED",
        }
    }

    /// Whether this is one of the child event kinds
    pub fn is_child_event(&self) -> bool {
        !matches!(self, Self::Value)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = FirebaseError;

    /// Accepts both `child_added` and `CHILD_ADDED` spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "value" => Ok(Self::Value),
            "child_added" => Ok(Self::ChildAdded),
            "child_changed" => Ok(Self::ChildChanged),
            "child_removed" => Ok(Self::ChildRemoved),
            "child_moved" => Ok(Self::ChildMoved),
            _ => Err(FirebaseError::invalid_argument(format!(
                "unknown event type '{}'",
                s
            ))),
        }
    }
}

/// A node address: database URL plus normalised path
///
/// An empty URL addresses the default database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    url: String,
    path: String,
}

impl Location {
    /// Create a location, normalising `path` to `/a/b` form
    pub fn new(url: impl Into<String>, path: &str) -> Self {
        Self {
            url: url.into(),
            path: normalize_path(path),
        }
    }

    /// Location in the default database
    pub fn default_db(path: &str) -> Self {
        Self::new("", path)
    }

    /// Database URL (empty for the default database)
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Normalised path, always starting with `/`
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path segments without separators
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Last path segment, `None` at the root
    pub fn key(&self) -> Option<&str> {
        self.segments().last().copied()
    }

    /// Location of a (possibly multi-segment) child path
    pub fn child(&self, relative: &str) -> Self {
        Self::new(self.url.clone(), &format!("{}/{}", self.path, relative))
    }

    /// Whether `self` is `other` or one of its descendants
    pub fn is_within(&self, other: &Location) -> bool {
        if self.url != other.url {
            return false;
        }
        if other.path == "/" {
            return true;
        }
        self.path == other.path || self.path.starts_with(&format!("{}/", other.path))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.url.is_empty() {
            f.write_str(&self.path)
        } else {
            write!(f, "{}{}", self.url.trim_end_matches('/'), self.path)
        }
    }
}

/// Normalise a slash-separated path to `/a/b` (root is `/`)
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Ordering applied to a query's children
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    /// Order by child key
    Key,
    /// Order by child value
    Value,
    /// Order by child priority
    Priority,
    /// Order by the value at a nested child path
    Child(String),
}

/// Which side of the range a filter constrains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Inclusive lower bound
    StartAt,
    /// Inclusive upper bound
    EndAt,
    /// Both bounds
    EqualTo,
}

/// Range filter over the ordered values, with an optional key tie-breaker
#[derive(Debug, Clone, PartialEq)]
pub struct RangeFilter {
    /// Constrained side
    pub bound: Bound,
    /// Scalar compared against the ordering value
    pub value: Value,
    /// Key used when values compare equal
    pub key: Option<String>,
}

/// Limit applied after ordering and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Keep the first `n` children
    First(usize),
    /// Keep the last `n` children
    Last(usize),
}

/// A location plus optional ordering, filters and limit
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Queried node
    pub location: Location,
    /// Ordering; filters and limits only apply when set
    pub order_by: Option<OrderBy>,
    /// Range filters, applied in order
    pub filters: Vec<RangeFilter>,
    /// Limit
    pub limit: Option<Limit>,
}

impl Query {
    /// Plain query over a location
    pub fn new(location: Location) -> Self {
        Self {
            location,
            order_by: None,
            filters: Vec::new(),
            limit: None,
        }
    }

    /// Order children by key
    pub fn order_by_key(mut self) -> Self {
        self.order_by = Some(OrderBy::Key);
        self
    }

    /// Order children by value
    pub fn order_by_value(mut self) -> Self {
        self.order_by = Some(OrderBy::Value);
        self
    }

    /// Order children by priority
    pub fn order_by_priority(mut self) -> Self {
        self.order_by = Some(OrderBy::Priority);
        self
    }

    /// Order children by a nested child value
    pub fn order_by_child(mut self, path: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy::Child(path.into()));
        self
    }

    /// Add an inclusive lower bound
    pub fn start_at(self, value: impl Into<Value>, key: Option<&str>) -> Self {
        self.with_filter(Bound::StartAt, value.into(), key)
    }

    /// Add an inclusive upper bound
    pub fn end_at(self, value: impl Into<Value>, key: Option<&str>) -> Self {
        self.with_filter(Bound::EndAt, value.into(), key)
    }

    /// Restrict to children whose ordering value equals `value`
    pub fn equal_to(self, value: impl Into<Value>, key: Option<&str>) -> Self {
        self.with_filter(Bound::EqualTo, value.into(), key)
    }

    /// Keep the first `n` children
    pub fn limit_to_first(mut self, n: usize) -> Self {
        self.limit = Some(Limit::First(n));
        self
    }

    /// Keep the last `n` children
    pub fn limit_to_last(mut self, n: usize) -> Self {
        self.limit = Some(Limit::Last(n));
        self
    }

    fn with_filter(mut self, bound: Bound, value: Value, key: Option<&str>) -> Self {
        self.filters.push(RangeFilter {
            bound,
            value,
            key: key.map(str::to_string),
        });
        self
    }

    /// Build a query from the loosely-typed `orderBy` / `includes` / `limit`
    /// command arguments.
    ///
    /// `order_by` is one of `{"key": true}`, `{"value": true}`,
    /// `{"priority": true}` or `{"child": "path"}`. `includes` is an array of
    /// `{"startAt"|"endAt"|"equalTo": scalar, "key"?: string}` and `limit` is
    /// `{"first": n}` or `{"last": n}`. Without an ordering, includes and
    /// limit are ignored.
    pub fn from_args(
        location: Location,
        order_by: &Value,
        includes: &Value,
        limit: &Value,
    ) -> Result<Self, FirebaseError> {
        let mut query = Query::new(location);

        // No ordering: plain location query (error case first for malformed input)
        let order = match order_by {
            Value::Null => return Ok(query),
            Value::Object(order) => order,
            _ => return Err(FirebaseError::invalid_argument("orderBy must be an object")),
        };

        query.order_by = Some(if order.contains_key("key") {
            OrderBy::Key
        } else if order.contains_key("value") {
            OrderBy::Value
        } else if order.contains_key("priority") {
            OrderBy::Priority
        } else if let Some(child) = order.get("child") {
            let Some(path) = child.as_str() else {
                return Err(FirebaseError::invalid_argument("orderBy.child must be a string"));
            };
            OrderBy::Child(path.to_string())
        } else {
            return Err(FirebaseError::invalid_argument("order is invalid"));
        });

        let filters = match includes {
            Value::Null => &[][..],
            Value::Array(items) => items.as_slice(),
            _ => return Err(FirebaseError::invalid_argument("includes must be an array")),
        };
        for filter in filters {
            let Some(filter) = filter.as_object() else {
                return Err(FirebaseError::invalid_argument("includes are invalid"));
            };
            let key = filter.get("key").and_then(Value::as_str).map(str::to_string);
            let (bound, value) = if let Some(v) = present(filter.get("startAt")) {
                (Bound::StartAt, v)
            } else if let Some(v) = present(filter.get("endAt")) {
                (Bound::EndAt, v)
            } else if let Some(v) = present(filter.get("equalTo")) {
                (Bound::EqualTo, v)
            } else {
                return Err(FirebaseError::invalid_argument("includes are invalid"));
            };
            if value.is_object() || value.is_array() {
                return Err(FirebaseError::invalid_argument(
                    "range filter values must be scalars",
                ));
            }
            query.filters.push(RangeFilter {
                bound,
                value: value.clone(),
                key,
            });
        }

        query.limit = match limit {
            Value::Null => None,
            Value::Object(limit) => {
                if let Some(n) = limit.get("first") {
                    Some(Limit::First(parse_limit(n)?))
                } else if let Some(n) = limit.get("last") {
                    Some(Limit::Last(parse_limit(n)?))
                } else {
                    None
                }
            }
            _ => return Err(FirebaseError::invalid_argument("limit must be an object")),
        };

        Ok(query)
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn parse_limit(value: &Value) -> Result<usize, FirebaseError> {
    value
        .as_u64()
        .filter(|n| *n > 0)
        .map(|n| n as usize)
        .ok_or_else(|| FirebaseError::invalid_argument("limit must be a positive integer"))
}

/// Immutable copy of the data at a location
///
/// # Native Reference
/// - `FIRDataSnapshot.h`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSnapshot {
    /// Key of the node (`None` at the root)
    pub key: Option<String>,
    /// Node contents; `null` when the node does not exist
    pub value: Value,
    /// Node priority; `null` when unset
    pub priority: Value,
    /// Child keys in query order, empty for leaf values
    pub children: Vec<String>,
}

impl DataSnapshot {
    /// Whether the node holds any data
    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }

    /// Delivery payload for this snapshot
    ///
    /// `key` is the subscription key, `nodeKey` the snapshot's own key.
    pub fn to_payload(
        &self,
        key: Option<&str>,
        event_type: EventType,
        previous_child_key: Option<&str>,
    ) -> Value {
        json!({
            "key": key,
            "eventType": event_type,
            "value": self.value,
            "priority": self.priority,
            "nodeKey": self.key,
            "previousChildKey": previous_child_key,
            "children": self.children,
        })
    }
}
