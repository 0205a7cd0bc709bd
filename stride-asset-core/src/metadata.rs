//! Script metadata lookup and strict-mode validation
//!
//! Property names and declared types of user scripts come from an external
//! introspection step. The editor only consumes them through
//! [`ScriptMetadata`]; when no metadata is available for a class,
//! validation is skipped.

use crate::error::{Result, StrideAssetError};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether property writes are checked against script metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValidationMode {
    #[default]
    Loose,
    Strict,
}

/// Declared shape of a script class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptClass {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub assembly: String,
    /// Property name -> declared type name
    #[serde(default)]
    pub properties: IndexMap<String, String>,
}

impl ScriptClass {
    pub fn new<N: Into<String>, A: Into<String>>(
        namespace: Option<&str>,
        name: N,
        assembly: A,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            assembly: assembly.into(),
            properties: IndexMap::new(),
        }
    }

    pub fn with_property<N: Into<String>, T: Into<String>>(mut self, name: N, ty: T) -> Self {
        self.properties.insert(name.into(), ty.into());
        self
    }

    /// `Namespace.Class,Assembly`, or `.Class,Assembly` without a namespace
    pub fn full_type_tag(&self) -> String {
        format!(
            "{}.{},{}",
            self.namespace.as_deref().unwrap_or(""),
            self.name,
            self.assembly
        )
    }
}

/// Lookup of script class metadata by class name
pub trait ScriptMetadata: Send + Sync {
    fn resolve(&self, class_name: &str) -> Option<ScriptClass>;
}

/// In-memory [`ScriptMetadata`] implementation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptCatalog {
    classes: Vec<ScriptClass>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ScriptCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_classes<I: IntoIterator<Item = ScriptClass>>(classes: I) -> Self {
        let mut catalog = Self::new();
        for class in classes {
            catalog.insert(class);
        }
        catalog
    }

    pub fn insert(&mut self, class: ScriptClass) {
        let slot = self.classes.len();
        self.index.insert(class.name.clone(), slot);
        if let Some(ns) = &class.namespace {
            self.index.insert(format!("{}.{}", ns, class.name), slot);
        }
        self.classes.push(class);
    }

    /// Rebuild the name index after deserialization
    pub fn reindex(&mut self) {
        let classes = std::mem::take(&mut self.classes);
        self.index.clear();
        for class in classes {
            self.insert(class);
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ScriptMetadata for ScriptCatalog {
    fn resolve(&self, class_name: &str) -> Option<ScriptClass> {
        self.index
            .get(class_name)
            .and_then(|slot| self.classes.get(*slot))
            .cloned()
    }
}

/// Class name of a component type tag:
/// `My.Game.PlayerController,MyGame` -> `PlayerController`
pub fn class_name_of(type_tag: &str) -> &str {
    let without_assembly = type_tag.split(',').next().unwrap_or(type_tag).trim();
    let without_bang = without_assembly.trim_start_matches('!');
    without_bang.rsplit('.').next().unwrap_or(without_bang)
}

/// Resolve the full type tag for a component type name; unknown names are
/// returned unchanged
pub fn resolve_type_tag(metadata: Option<&dyn ScriptMetadata>, type_name: &str) -> String {
    if type_name.contains(',') {
        return type_name.to_string();
    }
    metadata
        .and_then(|m| m.resolve(type_name))
        .map(|class| class.full_type_tag())
        .unwrap_or_else(|| type_name.to_string())
}

/// Rough category of a declared type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclaredKind {
    Float,
    Integer,
    Bool,
    String,
    Struct,
    /// Collections, references, enums and anything else
    Permissive,
}

fn declared_kind(declared: &str) -> DeclaredKind {
    let name = declared.trim().trim_end_matches('?');
    let name = name.strip_prefix("System.").unwrap_or(name);
    if name.contains('<') || name.ends_with("[]") {
        return DeclaredKind::Permissive;
    }
    match name.to_ascii_lowercase().as_str() {
        "float" | "single" | "double" | "decimal" => DeclaredKind::Float,
        "int" | "int32" | "int64" | "long" | "short" | "int16" | "byte" | "sbyte" | "uint"
        | "uint32" | "uint64" | "ulong" | "ushort" | "uint16" => DeclaredKind::Integer,
        "bool" | "boolean" => DeclaredKind::Bool,
        "string" => DeclaredKind::String,
        "vector2" | "vector3" | "vector4" | "quaternion" | "color" | "color3" | "color4"
        | "int2" | "int3" | "int4" => DeclaredKind::Struct,
        _ => DeclaredKind::Permissive,
    }
}

fn is_compatible(kind: DeclaredKind, value: &Value) -> bool {
    match kind {
        DeclaredKind::Permissive => true,
        DeclaredKind::Float => matches!(value, Value::Float(_) | Value::Integer(_)),
        DeclaredKind::Integer => matches!(value, Value::Integer(_)),
        DeclaredKind::Bool => matches!(value, Value::Bool(_)),
        DeclaredKind::String => matches!(value, Value::String(_) | Value::Null),
        DeclaredKind::Struct => matches!(value, Value::Object(_)),
    }
}

fn example_literal(kind: DeclaredKind) -> &'static str {
    match kind {
        DeclaredKind::Float => "1.0",
        DeclaredKind::Integer => "1",
        DeclaredKind::Bool => "true",
        DeclaredKind::String => "\"text\"",
        DeclaredKind::Struct => "Vector3::new(0.0, 0.0, 0.0)",
        DeclaredKind::Permissive => "<value>",
    }
}

/// Check a single-segment property write against script metadata.
///
/// Unknown classes pass; unknown properties and incompatible runtime types
/// are rejected with a message that shows a corrected call.
pub fn validate_property(
    metadata: &dyn ScriptMetadata,
    type_tag: &str,
    property: &str,
    value: &Value,
) -> Result<()> {
    let class_name = class_name_of(type_tag);
    let Some(class) = metadata.resolve(class_name) else {
        tracing::debug!(class_name, "no script metadata, skipping validation");
        return Ok(());
    };

    let Some(declared) = class.properties.get(property) else {
        let known: Vec<&str> = class.properties.keys().map(String::as_str).collect();
        let example = known
            .first()
            .map(|k| format!("set(\"{}\", ...); declared properties: {}", k, known.join(", ")))
            .unwrap_or_else(|| format!("class '{}' declares no properties", class.name));
        return Err(StrideAssetError::Validation {
            property: property.to_string(),
            class_name: class.name.clone(),
            expected: "a declared property".to_string(),
            actual: "unknown property".to_string(),
            example,
        });
    };

    let kind = declared_kind(declared);
    if is_compatible(kind, value) {
        Ok(())
    } else {
        Err(StrideAssetError::Validation {
            property: property.to_string(),
            class_name: class.name.clone(),
            expected: declared.clone(),
            actual: value.kind_name().to_string(),
            example: format!("set(\"{}\", {})", property, example_literal(kind)),
        })
    }
}

/// Narrow a parsed value to the declared property type.
///
/// Numeric tokens parse as floats first, so `3` written to a property
/// declared `int` comes in as `Float(3.0)`; it goes back out as `Integer(3)`.
/// Anything else is returned unchanged.
pub fn coerce_to_declared(
    metadata: &dyn ScriptMetadata,
    type_tag: &str,
    property: &str,
    value: Value,
) -> Value {
    let declared = metadata
        .resolve(class_name_of(type_tag))
        .and_then(|class| class.properties.get(property).cloned());
    match (declared.as_deref().map(declared_kind), &value) {
        (Some(DeclaredKind::Integer), Value::Float(f))
            if f.fract() == 0.0 && f.abs() <= i64::MAX as f64 =>
        {
            Value::Integer(*f as i64)
        }
        _ => value,
    }
}
