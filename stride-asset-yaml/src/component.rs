//! Entity components
//!
//! A component loaded from a document keeps the exact text of its block.
//! Its property tree is only built the first time it is read; until then
//! the component costs one string. Writing a single inline property edits
//! that one line of the kept text; any other edit drops the text and the
//! component is rendered again from its properties.

use crate::reader::{self, indent_width, is_blank, line_content, split_key, split_lines};
use crate::writer::{BlockWriter, inline_token};
use std::cell::OnceCell;
use stride_asset_core::constants::{component_types, keys};
use stride_asset_core::{
    FromProperty, PropertyMap, PropertyValue, Quaternion, Result, Value, Vector3,
    class_name_of, new_guid, new_guid_compact, require,
};

/// Marker Stride appends to a member name to flag an overridden value
pub const OVERRIDE_MARKER: char = '*';

/// How well a component type tag matches a requested type name.
/// Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeMatch {
    Exact,
    ClassName,
    Substring,
}

/// Match a type tag against a full tag, a class name or a fragment
pub fn match_type(type_tag: &str, query: &str) -> Option<TypeMatch> {
    let query = query.trim().trim_start_matches('!');
    if query.is_empty() {
        return None;
    }
    let tag = type_tag.trim_start_matches('!');
    if tag == query {
        return Some(TypeMatch::Exact);
    }
    let full_name = tag.split(',').next().unwrap_or(tag);
    if class_name_of(tag) == query || full_name == query || full_name == format!(".{}", query) {
        return Some(TypeMatch::ClassName);
    }
    tag.to_ascii_lowercase()
        .contains(&query.to_ascii_lowercase())
        .then_some(TypeMatch::Substring)
}

/// One component of an entity
#[derive(Debug, Clone)]
pub struct Component {
    key: String,
    type_tag: String,
    id: String,
    /// Original block text, header line included
    raw: Option<String>,
    properties: OnceCell<PropertyMap>,
}

impl Component {
    /// A new, empty component of the given type
    pub fn new<S: Into<String>>(type_tag: S) -> Self {
        Self {
            key: new_guid_compact(),
            type_tag: type_tag.into(),
            id: new_guid(),
            raw: None,
            properties: OnceCell::from(PropertyMap::new()),
        }
    }

    /// A transform at the origin with identity rotation, unit scale and no
    /// children
    pub fn transform() -> Self {
        let mut properties = PropertyMap::new();
        properties.insert(keys::POSITION, Value::from(Vector3::ZERO).into());
        properties.insert(keys::ROTATION, Value::from(Quaternion::IDENTITY).into());
        properties.insert(keys::SCALE, Value::from(Vector3::ONE).into());
        properties.insert(keys::CHILDREN, PropertyValue::Map(PropertyMap::new()));
        Self {
            properties: OnceCell::from(properties),
            ..Self::new(component_types::TRANSFORM)
        }
    }

    /// A component read from document text, parsed on first access
    pub(crate) fn from_raw(key: String, type_tag: String, id: String, raw: String) -> Self {
        Self {
            key,
            type_tag,
            id,
            raw: Some(raw),
            properties: OnceCell::new(),
        }
    }

    /// Key of the component inside the entity's `Components:` map
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Full type tag, e.g. `MyGame.PlayerController,MyGame`
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn class_name(&self) -> &str {
        class_name_of(&self.type_tag)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_transform(&self) -> bool {
        match_type(&self.type_tag, component_types::TRANSFORM) == Some(TypeMatch::Exact)
    }

    pub fn matches(&self, query: &str) -> Option<TypeMatch> {
        match_type(&self.type_tag, query)
    }

    /// Whether the property tree has been built yet
    pub fn is_materialized(&self) -> bool {
        self.properties.get().is_some()
    }

    /// The original block text, while it still describes the component
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Properties of the component, excluding its `Id`
    pub fn properties(&self) -> &PropertyMap {
        self.properties
            .get_or_init(|| parse_properties(self.raw.as_deref()))
    }

    /// Edit the property tree directly; the kept block text is dropped
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut PropertyMap) -> R) -> R {
        let mut properties = match self.properties.take() {
            Some(properties) => properties,
            None => parse_properties(self.raw.as_deref()),
        };
        self.raw = None;
        let result = f(&mut properties);
        self.properties = OnceCell::from(properties);
        result
    }

    /// Read a property, coercing it to `T`; `None` when missing or not
    /// convertible
    pub fn get<T: FromProperty>(&self, path: &str) -> Option<T> {
        let properties = self.properties();
        properties
            .get_as(path)
            .or_else(|| properties.get_as(&marked_path(path)))
    }

    /// Read a property as a typed value
    pub fn get_value(&self, path: &str) -> Option<Value> {
        self.get::<Value>(path)
    }

    /// Write a typed value at a dotted path
    pub fn set<V: Into<Value>>(&mut self, path: &str, value: V) -> Result<()> {
        self.set_property(path, PropertyValue::from(value.into()))
    }

    /// Write a wire value at a dotted path.
    ///
    /// A single-segment write over an existing inline value only touches
    /// that line of the kept text.
    pub fn set_property(&mut self, path: &str, value: PropertyValue) -> Result<()> {
        let path = require("path", path)?.trim();

        if !path.contains('.')
            && let Some(raw) = self.raw.as_deref()
            && let Some(token) = inline_token(&value)
            && let Some(updated) = replace_inline(raw, path, &token)
        {
            if let Some(properties) = self.properties.get_mut() {
                let key = stored_key(properties, path);
                properties.insert(key, value);
            }
            self.raw = Some(updated);
            return Ok(());
        }

        self.edit(|properties| {
            let target = match properties.get_path(path) {
                None if properties.get_path(&marked_path(path)).is_some() => marked_path(path),
                _ => path.to_string(),
            };
            properties.set_path(&target, value)
        })
    }

    /// Remove a property; returns the removed value
    pub fn remove(&mut self, path: &str) -> Option<PropertyValue> {
        if self.properties().get_path(path).is_none() {
            return None;
        }
        self.edit(|properties| properties.remove_path(path))
    }

    /// Append to a GUID-keyed list; returns the new element's key
    pub fn append_to_list<V: Into<Value>>(&mut self, path: &str, value: V) -> Result<String> {
        let value = PropertyValue::from(value.into());
        self.edit(|properties| properties.append_to_list(path, value))
    }

    /// Insert or update a `guid~key` dictionary entry
    pub fn set_dictionary_entry<V: Into<Value>>(
        &mut self,
        path: &str,
        key: &str,
        value: V,
    ) -> Result<String> {
        let value = PropertyValue::from(value.into());
        self.edit(|properties| properties.set_dictionary_entry(path, key, value))
    }

    /// Replace a whole list; every element gets a fresh key
    pub fn replace_list<I, V>(&mut self, path: &str, values: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<PropertyValue> = values
            .into_iter()
            .map(|v| PropertyValue::from(v.into()))
            .collect();
        self.edit(|properties| properties.replace_list(path, values))
    }

    /// Text of the component block with its header at `indent`; the kept
    /// text is reused when it was read at the same indent
    pub fn render(&self, writer: &BlockWriter, indent: usize) -> String {
        match self.raw.as_deref() {
            Some(raw) if raw.lines().next().map(indent_width) == Some(indent) => {
                let mut text = raw.to_string();
                if !text.ends_with('\n') {
                    text.push_str(writer.line_ending().as_str());
                }
                text
            }
            _ => writer.render_component(indent, self),
        }
    }
}

fn parse_properties(raw: Option<&str>) -> PropertyMap {
    let Some(raw) = raw else {
        return PropertyMap::new();
    };
    let mut properties = reader::parse(raw)
        .first()
        .map(reader::Node::child_map)
        .unwrap_or_default();
    properties.tag = None;
    properties.remove(keys::ID);
    properties
}

fn marked_path(path: &str) -> String {
    match path.split_once('.') {
        Some((first, rest)) => format!("{}{}.{}", first, OVERRIDE_MARKER, rest),
        None => format!("{}{}", path, OVERRIDE_MARKER),
    }
}

fn stored_key(properties: &PropertyMap, key: &str) -> String {
    let marked = format!("{}{}", key, OVERRIDE_MARKER);
    if !properties.contains_key(key) && properties.contains_key(&marked) {
        marked
    } else {
        key.to_string()
    }
}

/// Replace the inline value of a top-level property line in a component
/// block, keeping the line's indentation, key spelling and terminator.
/// Returns `None` when the property is missing or holds a nested block.
fn replace_inline(raw: &str, key: &str, token: &str) -> Option<String> {
    let lines = split_lines(raw);
    let property_indent = lines
        .iter()
        .skip(1)
        .find(|line| !is_blank(line))
        .map(|line| indent_width(line))?;
    let marked = format!("{}{}", key, OVERRIDE_MARKER);

    let index = (1..lines.len()).find(|&i| {
        !is_blank(lines[i])
            && indent_width(lines[i]) == property_indent
            && split_key(line_content(lines[i]).trim_start())
                .is_some_and(|(found, _)| found == key || found == marked)
    })?;

    let content = line_content(lines[index]);
    let (found, rest) = split_key(content.trim_start())?;
    if rest.is_empty() || (rest.starts_with('!') && !rest.contains(' ')) {
        return None;
    }
    let nested = lines
        .iter()
        .skip(index + 1)
        .find(|line| !is_blank(line))
        .is_some_and(|line| indent_width(line) > property_indent);
    if nested {
        return None;
    }

    let leading = &content[..content.len() - content.trim_start().len()];
    let terminator = &lines[index][content.len()..];
    let replaced = format!("{}{}: {}{}", leading, found, token, terminator);

    let mut out = String::with_capacity(raw.len() + token.len());
    for (i, line) in lines.iter().enumerate() {
        out.push_str(if i == index { &replaced } else { line });
    }
    Some(out)
}
