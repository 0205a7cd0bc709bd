//! Identity and cross-reference helpers
//!
//! Stride documents identify everything by GUID and link objects with two
//! scalar encodings:
//!
//! - `ref!! <guid>` points at an entity or component inside the same document
//! - `<guid>:<path>` points at another asset in the project
//!
//! Both are opaque strings to the rest of the editor; only this module
//! knows how to take them apart.

use crate::constants::{ENTITY_REF_PREFIX, FILE_REF_PREFIX};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a new GUID in the dashed form used for `Id:` fields
pub fn new_guid() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// Generate a new GUID without separators, as used for component and
/// collection keys
pub fn new_guid_compact() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Check whether `text` is a GUID in either dashed or compact form
pub fn is_guid(text: &str) -> bool {
    let text = text.trim();
    (text.len() == 36 || text.len() == 32) && Uuid::parse_str(text).is_ok()
}

/// Strip the separators from a GUID (`a-b-c` -> `abc`)
pub fn compact_guid(guid: &str) -> String {
    guid.chars().filter(|c| *c != '-').collect()
}

/// A `ref!! <guid>` link to an entity or component in the same document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
}

impl EntityRef {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self { id: id.into() }
    }

    /// Parse `ref!! <guid>`; anything else is not an entity reference
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.trim().strip_prefix(ENTITY_REF_PREFIX.trim_end())?;
        let id = rest.trim();
        is_guid(id).then(|| Self::new(id))
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ENTITY_REF_PREFIX, self.id)
    }
}

/// A `<guid>:<path>` link to another asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    pub id: String,
    /// Project-relative path, always with forward slashes
    pub path: String,
}

impl AssetRef {
    pub fn new<I: Into<String>, P: AsRef<str>>(id: I, path: P) -> Self {
        Self {
            id: id.into(),
            path: path.as_ref().replace('\\', "/"),
        }
    }

    /// Parse `<guid>:<path>`; the part before the first colon must be a GUID
    pub fn parse(text: &str) -> Option<Self> {
        let (id, path) = text.trim().split_once(':')?;
        is_guid(id).then(|| Self::new(id, path))
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.path)
    }
}

/// Parse an entity reference into its GUID
pub fn parse_entity_ref(text: &str) -> Option<String> {
    EntityRef::parse(text).map(|r| r.id)
}

/// Format a GUID as an entity reference
pub fn format_entity_ref(id: &str) -> String {
    EntityRef::new(id).to_string()
}

/// Parse an asset reference into `(guid, path)`
pub fn parse_asset_ref(text: &str) -> Option<(String, String)> {
    AssetRef::parse(text).map(|r| (r.id, r.path))
}

/// Format a GUID and path as an asset reference
pub fn format_asset_ref(id: &str, path: &str) -> String {
    AssetRef::new(id, path).to_string()
}

/// Parse a `!file <relative path>` pointer
pub fn parse_file_ref(text: &str) -> Option<String> {
    text.trim()
        .strip_prefix(FILE_REF_PREFIX.trim_end())
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

/// Format a relative path as a `!file` pointer
pub fn format_file_ref(path: &str) -> String {
    format!("{}{}", FILE_REF_PREFIX, path.replace('\\', "/"))
}
