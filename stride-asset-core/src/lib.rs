//! Stride Asset Core
//!
//! Core data structures and codecs for editing Stride asset files.
//! This crate provides the building blocks shared by the document reader
//! and writer: typed values, wire-level property trees, the scalar codec,
//! GUID and reference helpers, dotted-path property access and the
//! strict-mode validation bridge.

pub mod access;
pub mod constants;
pub mod error;
pub mod math;
pub mod metadata;
pub mod property;
pub mod reference;
pub mod scalar;
pub mod value;

// Re-export main types
pub use access::{FromProperty, logical_key};
pub use constants::*;
pub use error::{Result, StrideAssetError, require};
pub use math::{Quaternion, Vector3};
pub use metadata::{
    ScriptCatalog, ScriptClass, ScriptMetadata, ValidationMode, class_name_of, coerce_to_declared,
    resolve_type_tag, validate_property,
};
pub use property::{MapStyle, PropertyMap, PropertyValue};
pub use reference::{
    AssetRef, EntityRef, format_asset_ref, format_entity_ref, new_guid, new_guid_compact,
    parse_asset_ref, parse_entity_ref,
};
pub use scalar::{format_float, format_value, parse_scalar};
pub use value::Value;
