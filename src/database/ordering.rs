//! Realtime Database ordering rules and query evaluation
//!
//! Values sort as: null < false < true < numbers < strings < objects.
//! Keys that are canonical 32-bit integers sort numerically ahead of all
//! other keys, which sort lexicographically. Ties always break by key.

use super::types::{Bound, Limit, OrderBy, Query, RangeFilter};
use serde_json::Value;
use std::cmp::Ordering;

/// One child of a queried node
#[derive(Debug, Clone, PartialEq)]
pub struct ChildEntry {
    /// Child key
    pub key: String,
    /// Child value
    pub value: Value,
    /// Child priority (`null` when unset)
    pub priority: Value,
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) | Value::Object(_) => 5,
    }
}

/// Compare two values by database ordering rules
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let by_rank = type_rank(a).cmp(&type_rank(b));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn int_key(key: &str) -> Option<i32> {
    let n = key.parse::<i32>().ok()?;
    // "007" and "+7" are plain string keys
    (n.to_string() == key).then_some(n)
}

/// Compare two child keys by database ordering rules
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (int_key(a), int_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Read a nested value at a slash-separated relative path
pub fn value_at<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .try_fold(value, |node, segment| node.get(segment))
}

fn order_value(entry: &ChildEntry, order: &OrderBy) -> Value {
    match order {
        OrderBy::Key => Value::String(entry.key.clone()),
        OrderBy::Value => entry.value.clone(),
        OrderBy::Priority => entry.priority.clone(),
        OrderBy::Child(path) => value_at(&entry.value, path).cloned().unwrap_or(Value::Null),
    }
}

fn compare_entries(a: &ChildEntry, b: &ChildEntry, order: &OrderBy) -> Ordering {
    let primary = match order {
        OrderBy::Key => Ordering::Equal,
        _ => compare_values(&order_value(a, order), &order_value(b, order)),
    };
    primary.then_with(|| compare_keys(&a.key, &b.key))
}

/// Position of `entry` relative to a filter's bound value
fn compare_to_bound(entry: &ChildEntry, filter: &RangeFilter, order: &OrderBy) -> Ordering {
    let primary = match order {
        OrderBy::Key => match filter.value.as_str() {
            Some(bound) => compare_keys(&entry.key, bound),
            None => compare_values(&Value::String(entry.key.clone()), &filter.value),
        },
        _ => compare_values(&order_value(entry, order), &filter.value),
    };
    match (&filter.key, primary) {
        (Some(key), Ordering::Equal) => compare_keys(&entry.key, key),
        _ => primary,
    }
}

fn passes(entry: &ChildEntry, filter: &RangeFilter, order: &OrderBy) -> bool {
    let position = compare_to_bound(entry, filter, order);
    match filter.bound {
        Bound::StartAt => position != Ordering::Less,
        Bound::EndAt => position != Ordering::Greater,
        Bound::EqualTo => position == Ordering::Equal,
    }
}

/// Order, filter and limit `children` as `query` describes
///
/// Without an explicit ordering, children are ordered by priority then key
/// and no filters or limits are applied.
pub fn apply_query(mut children: Vec<ChildEntry>, query: &Query) -> Vec<ChildEntry> {
    let Some(order) = &query.order_by else {
        children.sort_by(|a, b| compare_entries(a, b, &OrderBy::Priority));
        return children;
    };

    children.sort_by(|a, b| compare_entries(a, b, order));
    children.retain(|entry| query.filters.iter().all(|f| passes(entry, f, order)));

    match query.limit {
        Some(Limit::First(n)) => children.truncate(n),
        Some(Limit::Last(n)) => {
            let skip = children.len().saturating_sub(n);
            children.drain(..skip);
        }
        None => {}
    }
    children
}
