//! Dotted-path property access
//!
//! Reads walk nested maps and coerce the leaf into the requested type,
//! returning `None` instead of failing when the path is missing or the
//! value does not convert. Writes create intermediate maps as needed.
//!
//! Collections have no native ordered-list syntax at the property level:
//! list elements are stored under synthesized GUID keys and dictionary
//! entries under `guid~logicalKey` keys.

use crate::error::{Result, StrideAssetError};
use crate::property::{PropertyMap, PropertyValue};
use crate::reference::{AssetRef, EntityRef, new_guid_compact};
use crate::scalar::parse_scalar;
use crate::value::Value;

/// Separator between the synthesized key and the logical key of a
/// dictionary entry
pub const DICTIONARY_KEY_SEPARATOR: char = '~';

/// Types that can be read out of a property tree
pub trait FromProperty: Sized {
    fn from_property(value: &PropertyValue) -> Option<Self>;
}

impl FromProperty for PropertyValue {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromProperty for PropertyMap {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.as_map().cloned()
    }
}

impl FromProperty for Value {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        Some(value.to_value())
    }
}

impl FromProperty for String {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value.to_value() {
            Value::String(s) => Some(s),
            Value::Null => None,
            Value::Object(_) | Value::Array(_) => None,
            // Any other scalar reads back as its token
            _ => value.as_scalar().map(|s| s.trim().to_string()),
        }
    }
}

impl FromProperty for bool {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value.to_value() {
            Value::Bool(b) => Some(b),
            other => other.as_i64().map(|i| i != 0),
        }
    }
}

impl FromProperty for f64 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.to_value().as_f64()
    }
}

impl FromProperty for f32 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.to_value().as_f64().map(|f| f as f32)
    }
}

impl FromProperty for i64 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.to_value().as_i64()
    }
}

impl FromProperty for i32 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.to_value().as_i64().and_then(|i| i32::try_from(i).ok())
    }
}

impl FromProperty for u32 {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.to_value().as_i64().and_then(|i| u32::try_from(i).ok())
    }
}

impl FromProperty for EntityRef {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value.to_value() {
            Value::EntityRef(r) => Some(r),
            // Reconstruct from a quoted literal
            Value::String(s) => EntityRef::parse(&s),
            _ => None,
        }
    }
}

impl FromProperty for AssetRef {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value.to_value() {
            Value::AssetRef(r) => Some(r),
            Value::String(s) => AssetRef::parse(&s),
            _ => None,
        }
    }
}

impl<T: FromProperty> FromProperty for Vec<T> {
    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::List(items) => items.iter().map(T::from_property).collect(),
            PropertyValue::Map(map) => map.values().map(T::from_property).collect(),
            PropertyValue::Scalar(token) => match parse_scalar(token) {
                Value::Array(items) => items
                    .into_iter()
                    .map(|v| T::from_property(&PropertyValue::from_value(&v)))
                    .collect(),
                Value::Null => Some(Vec::new()),
                _ => None,
            },
        }
    }
}

fn segments(path: &str) -> Result<Vec<&str>> {
    if path.trim().is_empty() {
        return Err(StrideAssetError::missing_argument("path"));
    }
    Ok(path.split('.').map(str::trim).collect())
}

fn child<'a>(value: &'a PropertyValue, segment: &str) -> Option<&'a PropertyValue> {
    match value {
        PropertyValue::Map(map) => map.get(segment),
        PropertyValue::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        PropertyValue::Scalar(_) => None,
    }
}

impl PropertyMap {
    /// Resolve a dotted path to the stored node
    pub fn get_path(&self, path: &str) -> Option<&PropertyValue> {
        let segments = segments(path).ok()?;
        let (first, rest) = segments.split_first()?;
        let mut current = self.get(first)?;
        for segment in rest {
            current = child(current, segment)?;
        }
        Some(current)
    }

    /// Resolve a dotted path to a mutable node
    pub fn get_path_mut(&mut self, path: &str) -> Option<&mut PropertyValue> {
        let segments = segments(path).ok()?;
        let (first, rest) = segments.split_first()?;
        let mut current = self.get_mut(first)?;
        for segment in rest {
            current = match current {
                PropertyValue::Map(map) => map.get_mut(segment)?,
                PropertyValue::List(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                PropertyValue::Scalar(_) => return None,
            };
        }
        Some(current)
    }

    /// Read and coerce a value; `None` when missing or not convertible
    pub fn get_as<T: FromProperty>(&self, path: &str) -> Option<T> {
        self.get_path(path).and_then(T::from_property)
    }

    /// Write a value, creating intermediate maps along the way.
    ///
    /// An intermediate `null` token is replaced by an empty map; descending
    /// into any other scalar or into a list is a structure error.
    pub fn set_path(&mut self, path: &str, value: PropertyValue) -> Result<()> {
        let segments = segments(path)?;
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| StrideAssetError::missing_argument("path"))?;

        let mut current = self;
        for segment in parents {
            let needs_map = match current.get(segment) {
                None => true,
                Some(existing) if existing.is_null_literal() => true,
                Some(PropertyValue::Map(_)) => false,
                Some(_) => {
                    return Err(StrideAssetError::structure(format!(
                        "cannot write '{}': '{}' is not a map",
                        path, segment
                    )));
                }
            };
            if needs_map {
                current.insert(*segment, PropertyValue::Map(PropertyMap::new()));
            }
            current = match current.get_mut(segment) {
                Some(PropertyValue::Map(map)) => map,
                _ => return Err(StrideAssetError::structure(format!("cannot write '{}'", path))),
            };
        }

        current.insert(*leaf, value);
        Ok(())
    }

    /// Remove the node at a dotted path
    pub fn remove_path(&mut self, path: &str) -> Option<PropertyValue> {
        match path.rsplit_once('.') {
            None => self.remove(path.trim()),
            Some((parent, leaf)) => match self.get_path_mut(parent)? {
                PropertyValue::Map(map) => map.remove(leaf.trim()),
                _ => None,
            },
        }
    }

    /// Make sure the node at `path` is a collection map, replacing a
    /// missing, `null` or `[]` value with an empty one
    fn collection_mut(&mut self, path: &str) -> Result<&mut PropertyMap> {
        let uninitialized = self.get_path(path).is_none_or(|value| {
            value.is_null_literal() || matches!(value, PropertyValue::List(items) if items.is_empty())
        });
        if uninitialized {
            self.set_path(path, PropertyValue::Map(PropertyMap::new()))?;
        }
        match self.get_path_mut(path) {
            Some(PropertyValue::Map(map)) => Ok(map),
            _ => Err(StrideAssetError::structure(format!(
                "'{}' is not a collection",
                path
            ))),
        }
    }

    /// Append an element to a GUID-keyed list; returns the synthesized key.
    ///
    /// A non-empty native `- item` list is appended to as-is and the
    /// element's index is returned instead.
    pub fn append_to_list(&mut self, path: &str, value: PropertyValue) -> Result<String> {
        if let Some(PropertyValue::List(items)) = self.get_path_mut(path)
            && !items.is_empty()
        {
            items.push(value);
            return Ok((items.len() - 1).to_string());
        }
        let list = self.collection_mut(path)?;
        let key = new_guid_compact();
        list.insert(key.clone(), value);
        Ok(key)
    }

    /// Set a dictionary entry stored as `guid~key`; an existing entry with
    /// the same logical key is updated in place
    pub fn set_dictionary_entry(
        &mut self,
        path: &str,
        key: &str,
        value: PropertyValue,
    ) -> Result<String> {
        crate::error::require("key", key)?;
        let dict = self.collection_mut(path)?;
        let existing = dict
            .keys()
            .find(|k| logical_key(k) == key)
            .cloned();
        let full_key = existing
            .unwrap_or_else(|| format!("{}{}{}", new_guid_compact(), DICTIONARY_KEY_SEPARATOR, key));
        dict.insert(full_key.clone(), value);
        Ok(full_key)
    }

    /// Replace a list wholesale; every element gets a fresh key and stale
    /// entries are dropped
    pub fn replace_list<I>(&mut self, path: &str, values: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = PropertyValue>,
    {
        let list = self.collection_mut(path)?;
        list.clear();
        let mut keys = Vec::new();
        for value in values {
            let key = new_guid_compact();
            list.insert(key.clone(), value);
            keys.push(key);
        }
        Ok(keys)
    }

    /// Elements of a list stored either natively or as a GUID-keyed map
    pub fn list_values(&self, path: &str) -> Vec<&PropertyValue> {
        match self.get_path(path) {
            Some(PropertyValue::List(items)) => items.iter().collect(),
            Some(PropertyValue::Map(map)) => map.values().collect(),
            _ => Vec::new(),
        }
    }

    /// Entries of a `guid~key` dictionary as `(logical key, value)`
    pub fn dictionary_entries(&self, path: &str) -> Vec<(&str, &PropertyValue)> {
        match self.get_path(path) {
            Some(PropertyValue::Map(map)) => map.iter().map(|(k, v)| (logical_key(k), v)).collect(),
            _ => Vec::new(),
        }
    }
}

/// The logical part of a `guid~key` dictionary key
pub fn logical_key(key: &str) -> &str {
    key.split_once(DICTIONARY_KEY_SEPARATOR)
        .map_or(key, |(_, logical)| logical)
}
