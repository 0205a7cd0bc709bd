//! Wire-level property trees
//!
//! Components and flat assets store their data as untyped trees read
//! straight from the document text. Scalars keep their original token so
//! that a re-rendered block reproduces untouched values exactly; typed
//! interpretation happens on demand through the scalar codec.

use crate::constants::NULL_LITERAL;
use crate::scalar::{format_value, parse_scalar};
use crate::value::Value;
use indexmap::IndexMap;

/// How a map is laid out in the document text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapStyle {
    /// One `key: value` line per entry, nested one level deeper
    #[default]
    Block,
    /// Inline `{K: v, ...}` on the owning line
    Flow,
}

/// One node of a property tree
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// A scalar token exactly as written, e.g. `1.0`, `ref!! <guid>`, `null`
    Scalar(String),
    /// A nested, ordered map
    Map(PropertyMap),
    /// A `- item` sequence
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    pub fn scalar<S: Into<String>>(token: S) -> Self {
        PropertyValue::Scalar(token.into())
    }

    /// Convert a typed value into its wire form
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                let mut out = PropertyMap::new();
                for (k, v) in map {
                    out.insert(k.clone(), PropertyValue::from_value(v));
                }
                if out.values().all(|v| matches!(v, PropertyValue::Scalar(_))) {
                    out.style = MapStyle::Flow;
                }
                PropertyValue::Map(out)
            }
            Value::Array(items) => {
                PropertyValue::List(items.iter().map(PropertyValue::from_value).collect())
            }
            other => PropertyValue::Scalar(format_value(other)),
        }
    }

    /// Interpret the tree as a typed value
    pub fn to_value(&self) -> Value {
        match self {
            PropertyValue::Scalar(token) => parse_scalar(token),
            PropertyValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
            PropertyValue::List(items) => {
                Value::Array(items.iter().map(PropertyValue::to_value).collect())
            }
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            PropertyValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&PropertyMap> {
        match self {
            PropertyValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut PropertyMap> {
        match self {
            PropertyValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<PropertyValue>> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// True for the literal `null` token (an uninitialized value)
    pub fn is_null_literal(&self) -> bool {
        matches!(self, PropertyValue::Scalar(s) if s.trim() == NULL_LITERAL || s.trim().is_empty())
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        PropertyValue::from_value(&value)
    }
}

/// An ordered map of properties, optionally carrying a `!Type` tag
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyMap {
    /// Type tag without the leading `!`, e.g. `BoxColliderShapeDesc`
    pub tag: Option<String>,
    pub style: MapStyle,
    entries: IndexMap<String, PropertyValue>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag<S: Into<String>>(tag: S) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn flow() -> Self {
        Self {
            style: MapStyle::Flow,
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PropertyValue> {
        self.entries.get_mut(key)
    }

    /// Insert or replace, keeping the position of an existing key
    pub fn insert<K: Into<String>>(&mut self, key: K, value: PropertyValue) -> Option<PropertyValue> {
        self.entries.insert(key.into(), value)
    }

    /// Remove a key, keeping the order of the remaining entries
    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.entries.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &PropertyValue> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut PropertyValue)> {
        self.entries.iter_mut()
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&String, &mut PropertyValue) -> bool,
    {
        self.entries.retain(keep)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl FromIterator<(String, PropertyValue)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_value_picks_flow_for_flat_maps() {
        let mut obj = IndexMap::new();
        obj.insert("X".to_string(), Value::Float(1.0));
        obj.insert("Y".to_string(), Value::Float(2.0));
        let wire = PropertyValue::from_value(&Value::Object(obj));

        let map = wire.as_map().unwrap();
        assert_eq!(map.style, MapStyle::Flow);
        assert_eq!(map.get("X"), Some(&PropertyValue::scalar("1.0")));
    }

    #[test]
    fn test_to_value_interprets_tokens() {
        let mut map = PropertyMap::flow();
        map.insert("X", PropertyValue::scalar("10.0"));
        map.insert("Enabled", PropertyValue::scalar("true"));
        let value = PropertyValue::Map(map).to_value();
        let obj = value.as_object().unwrap();
        assert_eq!(obj["X"], Value::Float(10.0));
        assert_eq!(obj["Enabled"], Value::Bool(true));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut map = PropertyMap::new();
        map.insert("a", PropertyValue::scalar("1"));
        map.insert("b", PropertyValue::scalar("2"));
        map.insert("c", PropertyValue::scalar("3"));
        map.remove("b");
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    #[test]
    fn test_null_literal() {
        assert!(PropertyValue::scalar("null").is_null_literal());
        assert!(!PropertyValue::scalar("nullable").is_null_literal());
        assert!(!PropertyValue::Map(PropertyMap::new()).is_null_literal());
    }
}
