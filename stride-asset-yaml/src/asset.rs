//! Flat asset documents
//!
//! Materials, textures, sounds and the like have no entity graph: a type
//! header followed by top-level properties. Saving reuses the original
//! text of every top-level entry that was not touched and renders only the
//! modified ones. A nested write whose line can be found in the text only
//! rewrites that line.

use crate::document::{StrideDocument, read_document_text};
use crate::reader::{self, Node, line_content, split_key, split_lines};
use crate::writer::{BlockWriter, inline_token};
use indexmap::IndexSet;
use std::path::{Path, PathBuf};
use stride_asset_core::constants::keys;
use stride_asset_core::{
    DEFAULT_SERIALIZED_VERSION, FromProperty, LineEnding, PropertyMap, PropertyValue, Result,
    StrideAssetError, Value, new_guid, require,
};
use tracing::{debug, info, instrument};

/// An editable flat asset
#[derive(Debug, Clone)]
pub struct AssetDocument {
    /// Header tag including the `!`, e.g. `!MaterialAsset`
    type_tag: String,
    /// Every top-level entry, `Id`, `SerializedVersion` and `Tags` included
    properties: PropertyMap,
    /// Top-level keys changed since loading
    modified: IndexSet<String>,
    /// Nested paths set since loading, patched line by line when possible
    leaf_edits: IndexSet<String>,
    raw: Option<String>,
    line_ending: LineEnding,
    path: Option<PathBuf>,
}

impl AssetDocument {
    /// A new asset with a fresh id
    pub fn new(type_tag: &str) -> Result<Self> {
        let type_tag = require("type", type_tag)?.trim();
        let mut properties = PropertyMap::new();
        properties.insert(keys::ID, PropertyValue::scalar(new_guid()));
        properties.insert(
            keys::SERIALIZED_VERSION,
            PropertyValue::scalar(DEFAULT_SERIALIZED_VERSION),
        );
        properties.insert(keys::TAGS, PropertyValue::List(Vec::new()));
        Ok(Self {
            type_tag: format!("!{}", type_tag.trim_start_matches('!')),
            properties,
            modified: IndexSet::new(),
            leaf_edits: IndexSet::new(),
            raw: None,
            line_ending: LineEnding::default(),
            path: None,
        })
    }

    /// Parse asset text
    #[instrument(skip(text), fields(len = text.len()))]
    pub fn parse_str(text: &str) -> Result<Self> {
        let nodes = reader::parse(text);
        let type_tag = nodes
            .first()
            .filter(|n| n.key.is_empty())
            .and_then(|n| n.value.clone())
            .filter(|v| v.starts_with('!'))
            .ok_or_else(|| StrideAssetError::structure("missing asset type header"))?;

        let properties: PropertyMap = nodes
            .iter()
            .filter(|n| !n.key.is_empty() && !n.is_item)
            .map(|n| (n.key.clone(), n.to_property()))
            .collect();
        if !properties.contains_key(keys::ID) {
            return Err(StrideAssetError::structure("asset has no Id"));
        }

        Ok(Self {
            type_tag,
            properties,
            modified: IndexSet::new(),
            leaf_edits: IndexSet::new(),
            raw: Some(text.to_string()),
            line_ending: LineEnding::detect(text),
            path: None,
        })
    }

    /// Header tag including the `!`
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn id(&self) -> Option<String> {
        self.properties.get_as(keys::ID)
    }

    /// `SerializedVersion` as written, e.g. `{Stride: 3.1.0.1}`
    pub fn version(&self) -> Option<String> {
        self.properties
            .get(keys::SERIALIZED_VERSION)
            .and_then(crate::writer::inline_token)
    }

    pub fn tags(&self) -> Vec<String> {
        self.properties.get_as(keys::TAGS).unwrap_or_default()
    }

    pub fn add_tag(&mut self, tag: &str) -> Result<()> {
        let tag = require("tag", tag)?.trim();
        if self.tags().iter().any(|t| t == tag) {
            return Ok(());
        }
        let mut tags: Vec<PropertyValue> = self
            .tags()
            .into_iter()
            .map(|t| PropertyValue::from(Value::from(t)))
            .collect();
        tags.push(PropertyValue::from(Value::from(tag)));
        self.properties.insert(keys::TAGS, PropertyValue::List(tags));
        self.touch(keys::TAGS);
        Ok(())
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let tags = self.tags();
        if !tags.iter().any(|t| t == tag) {
            return false;
        }
        let remaining = tags
            .into_iter()
            .filter(|t| t != tag)
            .map(|t| PropertyValue::from(Value::from(t)))
            .collect();
        self.properties
            .insert(keys::TAGS, PropertyValue::List(remaining));
        self.touch(keys::TAGS);
        true
    }

    /// All top-level properties
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn get<T: FromProperty>(&self, path: &str) -> Option<T> {
        self.properties.get_as(path)
    }

    pub fn set<V: Into<Value>>(&mut self, path: &str, value: V) -> Result<()> {
        self.set_property(path, PropertyValue::from(value.into()))
    }

    /// Write a wire value as is, e.g. a `!file` reference token
    pub fn set_property(&mut self, path: &str, value: PropertyValue) -> Result<()> {
        let path = require("path", path)?.trim();
        self.properties.set_path(path, value)?;
        if path.contains('.') && self.raw.is_some() {
            self.leaf_edits.insert(path.to_string());
        } else {
            self.touch(path);
        }
        Ok(())
    }

    pub fn remove(&mut self, path: &str) -> Option<PropertyValue> {
        let removed = self.properties.remove_path(path)?;
        self.touch(path);
        Some(removed)
    }

    pub fn append_to_list<V: Into<Value>>(&mut self, path: &str, value: V) -> Result<String> {
        let key = self
            .properties
            .append_to_list(path, PropertyValue::from(value.into()))?;
        self.touch(path);
        Ok(key)
    }

    pub fn set_dictionary_entry<V: Into<Value>>(
        &mut self,
        path: &str,
        key: &str,
        value: V,
    ) -> Result<String> {
        let full_key =
            self.properties
                .set_dictionary_entry(path, key, PropertyValue::from(value.into()))?;
        self.touch(path);
        Ok(full_key)
    }

    pub fn replace_list<I, V>(&mut self, path: &str, values: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let keys = self.properties.replace_list(
            path,
            values.into_iter().map(|v| PropertyValue::from(v.into())),
        )?;
        self.touch(path);
        Ok(keys)
    }

    fn touch(&mut self, path: &str) {
        self.modified.insert(top_key(path).to_string());
    }

    fn render_full(&self, writer: &BlockWriter) -> String {
        let mut out = String::new();
        writer.line(&mut out, 0, &self.type_tag);
        writer.write_map(&mut out, 0, &self.properties);
        out
    }

    /// Patch the original text entry by entry
    fn splice(&self, raw: &str, writer: &BlockWriter) -> String {
        let lines = split_lines(raw);
        let nodes = reader::parse(raw);
        let ending = self.line_ending.as_str();

        let mut out = String::with_capacity(raw.len());
        let mut cursor = 0;
        let mut seen = IndexSet::new();
        for node in nodes.iter().filter(|n| !n.key.is_empty() && !n.is_item) {
            seen.insert(node.key.as_str());
            if !self.modified.contains(&node.key) {
                let edits: Vec<&str> = self
                    .leaf_edits
                    .iter()
                    .map(String::as_str)
                    .filter(|path| top_key(path) == node.key)
                    .collect();
                if edits.is_empty() {
                    continue;
                }
                if let Some(patched) = self.patch_lines(node, &lines, &edits) {
                    out.push_str(&lines[cursor..node.line].concat());
                    out.push_str(&patched);
                    cursor = node.end_line;
                    continue;
                }
                debug!(key = %node.key, "nested edit has no single line, rendering the entry");
            }
            out.push_str(&lines[cursor..node.line].concat());
            if let Some(value) = self.properties.get(&node.key) {
                debug!(key = %node.key, "rendering modified entry");
                writer.write_entry(&mut out, node.indent, &node.key, value);
            }
            cursor = node.end_line;
        }
        let mut tail = lines[cursor.min(lines.len())..].concat();

        let added: Vec<(&String, &PropertyValue)> = self
            .properties
            .iter()
            .filter(|(key, _)| !seen.contains(key.as_str()))
            .collect();
        if !added.is_empty() {
            if !tail.is_empty() && !tail.ends_with('\n') {
                tail.push_str(ending);
            } else if tail.is_empty() && !out.is_empty() && !out.ends_with('\n') {
                out.push_str(ending);
            }
            out.push_str(&tail);
            for (key, value) in added {
                writer.write_entry(&mut out, 0, key, value);
            }
            return out;
        }
        out.push_str(&tail);
        out
    }

    /// Original lines of a top-level entry with each nested edit written
    /// over the one line that holds it; `None` when an edit has no such line
    fn patch_lines(&self, top: &Node, lines: &[&str], edits: &[&str]) -> Option<String> {
        let mut block: Vec<String> = lines[top.line..top.end_line.min(lines.len())]
            .iter()
            .map(|line| line.to_string())
            .collect();
        for path in edits {
            let (node, prefix) = line_node(top, path)?;
            if node.end_line != node.line + 1 {
                return None;
            }
            let token = inline_token(self.properties.get_path(&prefix)?)?;
            let line = block.get_mut(node.line - top.line)?;
            *line = replace_value(line, &token)?;
            debug!(path, line = node.line, "patched nested entry in place");
        }
        Some(block.concat())
    }
}

fn top_key(path: &str) -> &str {
    path.split('.').next().unwrap_or(path).trim()
}

/// Deepest node of `path` that owns a line of its own, and its path. Keys
/// inside a `{K: v}` map share their parent's line.
fn line_node<'n>(top: &'n Node, path: &str) -> Option<(&'n Node, String)> {
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();
    let mut node = top;
    let mut depth = 1;
    while depth < segments.len() && !node.flow {
        node = node.get(segments[depth])?;
        depth += 1;
    }
    Some((node, segments[..depth].join(".")))
}

/// `key: old` with the value swapped for `token`, indentation, key and
/// line terminator kept
fn replace_value(line: &str, token: &str) -> Option<String> {
    let content = line_content(line);
    let (key, _) = split_key(content.trim_start())?;
    let leading = &content[..content.len() - content.trim_start().len()];
    let terminator = &line[content.len()..];
    Some(format!("{}{}: {}{}", leading, key, token, terminator))
}

impl StrideDocument for AssetDocument {
    fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = read_document_text(path)?;
        let mut asset = Self::parse_str(&text)?;
        asset.path = Some(path.to_path_buf());
        info!(path = %path.display(), type_tag = %asset.type_tag, "loaded asset");
        Ok(asset)
    }

    fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn to_yaml_string(&self) -> String {
        let writer = BlockWriter::new().with_line_ending(self.line_ending);
        match self.raw.as_deref() {
            None => self.render_full(&writer),
            Some(raw) if self.modified.is_empty() && self.leaf_edits.is_empty() => {
                raw.to_string()
            }
            Some(raw) => self.splice(raw, &writer),
        }
    }

    fn is_modified(&self) -> bool {
        self.raw.is_none() || !self.modified.is_empty() || !self.leaf_edits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_asset_core::reference::format_file_ref;

    const MATERIAL: &str = "\
!MaterialAsset
Id: 4d3c2b1a-0000-4000-8000-000000000000
SerializedVersion: {Stride: 2.0.0.0}
Tags: []
Attributes:
    Diffuse: !MaterialDiffuseMapFeature
        DiffuseMap: !ComputeColor
            Value: {R: 1.0, G: 0.5, B: 0.25, A: 1.0}
    Overrides:
        UVScale: {X: 1.0, Y: 1.0}
Layers: {}
";

    #[test]
    fn test_parse_and_read() {
        let asset = AssetDocument::parse_str(MATERIAL).unwrap();
        assert_eq!(asset.type_tag(), "!MaterialAsset");
        assert_eq!(asset.id().as_deref(), Some("4d3c2b1a-0000-4000-8000-000000000000"));
        assert_eq!(asset.version().as_deref(), Some("{Stride: 2.0.0.0}"));
        assert!(asset.tags().is_empty());
        assert_eq!(
            asset.get::<f32>("Attributes.Diffuse.DiffuseMap.Value.G"),
            Some(0.5)
        );
        assert_eq!(asset.to_yaml_string(), MATERIAL);
    }

    #[test]
    fn test_only_touched_entries_change() {
        let mut asset = AssetDocument::parse_str(MATERIAL).unwrap();
        asset.set("Attributes.Overrides.UVScale.X", 2.0).unwrap();
        let text = asset.to_yaml_string();

        let before: Vec<&str> = MATERIAL.lines().collect();
        let after: Vec<&str> = text.lines().collect();
        assert_eq!(before.len(), after.len());
        let changed: Vec<usize> = (0..before.len()).filter(|&i| before[i] != after[i]).collect();
        assert_eq!(changed, vec![9]);
        assert_eq!(after[9], "        UVScale: {X: 2.0, Y: 1.0}");
    }

    #[test]
    fn test_nested_set_keeps_sibling_spacing() {
        let text = MATERIAL.replace(
            "    Overrides:\n",
            "    CullMode:   Back\n    Overrides:\n        Mode:  Wrap\n",
        );
        let mut asset = AssetDocument::parse_str(&text).unwrap();
        asset.set("Attributes.Overrides.UVScale.X", 2.0).unwrap();
        asset.set("Attributes.Diffuse.DiffuseMap.Value.A", 0.5).unwrap();
        asset.set("Attributes.CullMode", "None").unwrap();
        assert!(asset.is_modified());

        let expected = text
            .replace("UVScale: {X: 1.0, Y: 1.0}", "UVScale: {X: 2.0, Y: 1.0}")
            .replace("B: 0.25, A: 1.0}", "B: 0.25, A: 0.5}")
            .replace("CullMode:   Back", "CullMode: None");
        assert_eq!(asset.to_yaml_string(), expected);
        assert!(expected.contains("        Mode:  Wrap\n"));
    }

    #[test]
    fn test_nested_set_of_new_key_renders_entry() {
        let mut asset = AssetDocument::parse_str(MATERIAL).unwrap();
        asset.set("Attributes.Overrides.Offset", 0.25).unwrap();
        let text = asset.to_yaml_string();
        assert!(text.contains("    Overrides:\n        UVScale: {X: 1.0, Y: 1.0}\n        Offset: 0.25\n"));
        assert_eq!(
            AssetDocument::parse_str(&text)
                .unwrap()
                .get::<f32>("Attributes.Overrides.Offset"),
            Some(0.25)
        );
    }

    #[test]
    fn test_tags_and_new_keys() {
        let mut asset = AssetDocument::parse_str(MATERIAL).unwrap();
        asset.add_tag("stone").unwrap();
        asset.set("Archetype", "5a4b3c2d-0000-4000-8000-000000000000:Materials/Base")
            .unwrap();
        let text = asset.to_yaml_string();
        assert!(text.contains("Tags:\n    - stone\nAttributes:\n"));
        assert!(text.ends_with("Layers: {}\nArchetype: 5a4b3c2d-0000-4000-8000-000000000000:Materials/Base\n"));

        let reread = AssetDocument::parse_str(&text).unwrap();
        assert_eq!(reread.tags(), vec!["stone".to_string()]);
        assert!(asset.remove_tag("stone"));
        assert!(!asset.remove_tag("stone"));
    }

    #[test]
    fn test_new_asset_full_render() {
        let mut asset = AssetDocument::new("TextureAsset").unwrap();
        asset
            .set_property(
                "Source",
                PropertyValue::scalar(format_file_ref("../Resources/stone.png")),
            )
            .unwrap();
        let text = asset.to_yaml_string();
        assert!(text.starts_with("!TextureAsset\nId: "));
        assert!(text.contains("SerializedVersion: {Stride: 3.1.0.1}\nTags: []\n"));
        assert!(text.ends_with("Source: !file ../Resources/stone.png\n"));
        let reread = AssetDocument::parse_str(&text).unwrap();
        assert_eq!(reread.id(), asset.id());
    }
}
