//! # JSON Value Representation
//!
//! `JsonValue` is the dynamic value type every record, query argument, and
//! update argument is made of. It is a plain tagged union with owned data:
//!
//! - `Null`
//! - `Bool(bool)`
//! - `Number(f64)`
//! - `String(String)`
//! - `Array(Vec<JsonValue>)`
//! - `Object(Vec<(String, JsonValue)>)`
//!
//! Objects are ordered pair vectors rather than maps so a record serializes
//! back with its fields in insertion order. Key lookup is a linear walk,
//! which is the right trade for documents with a handful of fields.
//!
//! ## Equality and ordering
//!
//! Two relations are defined here and used by the operator evaluators:
//!
//! - [`deep_eq`]: structural equality. Object key order is ignored, array
//!   element order is significant, numbers compare by value (`NaN` is never
//!   equal to anything).
//! - [`order_cmp`]: partial ordering for `$lt`-family operators. Only
//!   number/number, string/string, and bool/bool pairs are ordered;
//!   incompatible pairs have no order, and every ordering predicate over
//!   them evaluates to false.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<JsonValue>),
    Object(Vec<(String, JsonValue)>),
}

impl JsonValue {
    /// Looks up a field on an object. Returns `None` for missing keys and
    /// for non-object values.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        match self {
            JsonValue::Object(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut JsonValue> {
        match self {
            JsonValue::Object(pairs) => {
                pairs.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Assigns a field on an object, replacing an existing entry in place or
    /// appending a new one. No-op on non-objects.
    pub fn set(&mut self, key: &str, value: JsonValue) {
        if let JsonValue::Object(pairs) = self {
            match pairs.iter_mut().find(|(k, _)| k == key) {
                Some((_, slot)) => *slot = value,
                None => pairs.push((key.to_string(), value)),
            }
        }
    }

    /// Removes a field from an object, returning the old value if present.
    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        if let JsonValue::Object(pairs) = self {
            let pos = pairs.iter().position(|(k, _)| k == key)?;
            return Some(pairs.remove(pos).1);
        }
        None
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JsonValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[JsonValue]> {
        match self {
            JsonValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, JsonValue::Object(_))
    }

    /// The record's `_id`, when this is an object carrying a string id.
    pub fn id(&self) -> Option<&str> {
        self.get(crate::config::ID_FIELD).and_then(JsonValue::as_str)
    }

    /// String coercion used by `$regex` matching: strings pass through,
    /// scalars use their display form, containers use canonical JSON.
    pub fn coerce_to_string(&self) -> String {
        match self {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for JsonValue {
    /// Canonical JSON rendering; this is the exact byte form the block
    /// codec stores.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::parsing::write_json(self, f)
    }
}

/// Structural equality with order-insensitive object keys.
pub fn deep_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => true,
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x == y,
        (JsonValue::Number(x), JsonValue::Number(y)) => x == y,
        (JsonValue::String(x), JsonValue::String(y)) => x == y,
        (JsonValue::Array(xs), JsonValue::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_eq(x, y))
        }
        (JsonValue::Object(xs), JsonValue::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.iter().any(|(k2, y)| k == k2 && deep_eq(x, y)))
        }
        _ => false,
    }
}

/// Partial ordering for the `$lt`-family operators. `None` means the pair
/// has no defined order.
pub fn order_cmp(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.partial_cmp(y),
        (JsonValue::String(x), JsonValue::String(y)) => Some(x.cmp(y)),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
