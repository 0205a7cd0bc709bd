//! Block writer
//!
//! Renders property trees back into Stride's block layout: four-space
//! indentation, `key: !Type` tags, inline `{K: v}` flow maps and
//! `-   ` list items whose first entry shares the dash line.

use crate::component::Component;
use crate::entity::{Entity, RawEntry};
use crate::reader::indent_width;
use stride_asset_core::constants::keys;
use stride_asset_core::scalar::format_string;
use stride_asset_core::{INDENT_WIDTH, LineEnding, MapStyle, PropertyMap, PropertyValue};

/// Writer for indented block text
#[derive(Debug, Clone, Copy)]
pub struct BlockWriter {
    /// Line ending style to use
    line_ending: LineEnding,
    /// Columns per nesting level
    indent_size: usize,
}

impl Default for BlockWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockWriter {
    pub fn new() -> Self {
        Self {
            line_ending: LineEnding::default(),
            indent_size: INDENT_WIDTH,
        }
    }

    /// Set line ending style
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn indent_size(&self) -> usize {
        self.indent_size
    }

    /// Write one indented line
    pub fn line(&self, out: &mut String, indent: usize, text: &str) {
        out.extend(std::iter::repeat_n(' ', indent));
        out.push_str(text);
        out.push_str(self.line_ending.as_str());
    }

    /// Write every entry of a map at `indent`
    pub fn write_map(&self, out: &mut String, indent: usize, map: &PropertyMap) {
        for (key, value) in map.iter() {
            self.write_entry(out, indent, key, value);
        }
    }

    /// Write `key: value`, nesting block values one level deeper
    pub fn write_entry(&self, out: &mut String, indent: usize, key: &str, value: &PropertyValue) {
        match value {
            PropertyValue::Scalar(token) if token.is_empty() => {
                self.line(out, indent, &format!("{}:", key))
            }
            PropertyValue::Scalar(token) => self.line(out, indent, &format!("{}: {}", key, token)),
            PropertyValue::Map(map) if writes_inline(map) => {
                self.line(
                    out,
                    indent,
                    &format!("{}: {}{}", key, tag_prefix(map), flow_token(map)),
                );
            }
            PropertyValue::Map(map) => {
                match &map.tag {
                    Some(tag) => self.line(out, indent, &format!("{}: !{}", key, tag)),
                    None => self.line(out, indent, &format!("{}:", key)),
                }
                self.write_map(out, indent + self.indent_size, map);
            }
            PropertyValue::List(items) if items.is_empty() => {
                self.line(out, indent, &format!("{}: []", key))
            }
            PropertyValue::List(items) => {
                self.line(out, indent, &format!("{}:", key));
                for item in items {
                    self.write_item(out, indent + self.indent_size, item);
                }
            }
        }
    }

    /// Write one `- item` of a sequence
    pub fn write_item(&self, out: &mut String, indent: usize, item: &PropertyValue) {
        match item {
            PropertyValue::Scalar(token) => self.line(out, indent, &format!("- {}", token)),
            PropertyValue::Map(map) if writes_inline(map) => {
                self.line(out, indent, &format!("- {}{}", tag_prefix(map), flow_token(map)));
            }
            PropertyValue::Map(map) if map.tag.is_some() => {
                self.line(out, indent, &format!("- {}", tag_prefix(map).trim_end()));
                self.write_map(out, indent + self.indent_size, map);
            }
            PropertyValue::Map(map) => {
                let mut body = String::new();
                self.write_map(&mut body, indent + self.indent_size, map);
                out.push_str(&self.dash_first_line(indent, &body));
            }
            PropertyValue::List(items) => {
                self.line(out, indent, "-");
                for nested in items {
                    self.write_item(out, indent + self.indent_size, nested);
                }
            }
        }
    }

    /// Turn the leading indentation of the first line of `body` into the
    /// `-   ` item marker
    fn dash_first_line(&self, indent: usize, body: &str) -> String {
        let content_indent = indent + self.indent_size;
        let marker = format!(
            "{}-{}",
            " ".repeat(indent),
            " ".repeat(self.indent_size.saturating_sub(1).max(1))
        );
        match body.get(content_indent..) {
            Some(rest) if body.starts_with(&" ".repeat(content_indent)) => {
                format!("{}{}", marker, rest)
            }
            _ => body.to_string(),
        }
    }

    /// Render a component block with its header at `indent`
    pub fn render_component(&self, indent: usize, component: &Component) -> String {
        let mut out = String::new();
        self.line(
            &mut out,
            indent,
            &format!("{}: !{}", component.key(), component.type_tag()),
        );
        let inner = indent + self.indent_size;
        self.line(&mut out, inner, &format!("{}: {}", keys::ID, component.id()));
        let properties = component.properties();
        for (key, value) in properties.iter() {
            if key != keys::ID {
                self.write_entry(&mut out, inner, key, value);
            }
        }
        out
    }

    /// Render an entity's item in the `Parts:` list, with the dash at
    /// `indent`. Entries the entity kept from the text are written back
    /// after the key they followed.
    pub fn render_entity(&self, indent: usize, entity: &Entity) -> String {
        let step = self.indent_size;
        let part = indent + step;
        let fields = indent + 2 * step;
        let mut body = String::new();

        self.write_raw_entries(&mut body, part, entity.part_entries(), None);
        if let Some(folder) = entity.folder() {
            self.line(
                &mut body,
                part,
                &format!("{}: {}", keys::FOLDER, format_string(folder)),
            );
        }
        self.write_raw_entries(&mut body, part, entity.part_entries(), Some(keys::FOLDER));
        self.line(&mut body, part, &format!("{}:", keys::ENTITY));

        let extras = entity.entity_entries();
        self.write_raw_entries(&mut body, fields, extras, None);
        self.line(&mut body, fields, &format!("{}: {}", keys::ID, entity.id()));
        self.write_raw_entries(&mut body, fields, extras, Some(keys::ID));
        self.line(
            &mut body,
            fields,
            &format!("{}: {}", keys::NAME, entity.name_token()),
        );
        self.write_raw_entries(&mut body, fields, extras, Some(keys::NAME));
        if entity.components().len() == 0 {
            self.line(&mut body, fields, &format!("{}: {{}}", keys::COMPONENTS));
        } else {
            self.line(&mut body, fields, &format!("{}:", keys::COMPONENTS));
            for component in entity.components() {
                body.push_str(&component.render(self, fields + step));
            }
        }
        self.write_raw_entries(&mut body, fields, extras, Some(keys::COMPONENTS));
        self.write_raw_entries(&mut body, part, entity.part_entries(), Some(keys::ENTITY));

        if let Some(link) = entity.prefab_link() {
            self.line(&mut body, part, &format!("{}:", keys::BASE));
            self.line(
                &mut body,
                fields,
                &format!("{}: {}", keys::BASE_PART_ASSET, link.base_part_asset),
            );
            self.line(
                &mut body,
                fields,
                &format!("{}: {}", keys::BASE_PART_ID, link.base_part_id),
            );
            self.line(
                &mut body,
                fields,
                &format!("{}: {}", keys::INSTANCE_ID, link.instance_id),
            );
        }
        self.write_raw_entries(&mut body, part, entity.part_entries(), Some(keys::BASE));

        self.dash_first_line(indent, &body)
    }

    /// Write the kept entries that followed `after`, shifted from their
    /// original column to `indent`
    fn write_raw_entries(
        &self,
        out: &mut String,
        indent: usize,
        entries: &[RawEntry],
        after: Option<&str>,
    ) {
        for entry in entries.iter().filter(|e| e.after.as_deref() == after) {
            for line in entry.text.lines() {
                let content = line.trim_end();
                if content.is_empty() {
                    out.push_str(self.line_ending.as_str());
                    continue;
                }
                let column = (indent_width(content) + indent).saturating_sub(entry.indent);
                self.line(out, column, content.trim_start());
            }
        }
    }
}

/// Flow maps stay on their key's line, as does `{}`. A tagged map with no
/// entries is written as the bare `!Tag`.
fn writes_inline(map: &PropertyMap) -> bool {
    if map.is_empty() {
        map.tag.is_none()
    } else {
        map.style == MapStyle::Flow
    }
}

fn tag_prefix(map: &PropertyMap) -> String {
    map.tag
        .as_ref()
        .map(|tag| format!("!{} ", tag))
        .unwrap_or_default()
}

/// `{K: v, ...}` for a map, nesting inner maps inline
pub fn flow_token(map: &PropertyMap) -> String {
    let parts: Vec<String> = map
        .iter()
        .map(|(key, value)| {
            let token = match value {
                PropertyValue::Map(inner) => format!("{}{}", tag_prefix(inner), flow_token(inner)),
                other => inline_token(other).unwrap_or_default(),
            };
            format!("{}: {}", key, token)
        })
        .collect();
    format!("{{{}}}", parts.join(", "))
}

/// The single-line form of a value, if it has one
pub fn inline_token(value: &PropertyValue) -> Option<String> {
    match value {
        PropertyValue::Scalar(token) if token.contains('\n') => None,
        PropertyValue::Scalar(token) => Some(token.clone()),
        PropertyValue::Map(map) if map.is_empty() => Some(match &map.tag {
            Some(tag) => format!("!{}", tag),
            None => "{}".to_string(),
        }),
        PropertyValue::Map(map) if map.style == MapStyle::Flow => {
            Some(format!("{}{}", tag_prefix(map), flow_token(map)))
        }
        PropertyValue::Map(_) => None,
        PropertyValue::List(items) if items.is_empty() => Some("[]".to_string()),
        PropertyValue::List(items) => {
            let tokens: Option<Vec<String>> = items
                .iter()
                .map(|item| match item {
                    PropertyValue::Scalar(token) => Some(token.clone()),
                    _ => None,
                })
                .collect();
            tokens.map(|t| format!("[{}]", t.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader;

    fn sample() -> PropertyMap {
        let mut position = PropertyMap::flow();
        position.insert("X", PropertyValue::scalar("1.0"));
        position.insert("Y", PropertyValue::scalar("2.0"));

        let mut shape = PropertyMap::with_tag("BoxColliderShapeDesc");
        shape.insert("Is2D", PropertyValue::scalar("false"));

        let mut shapes = PropertyMap::new();
        shapes.insert("0f1e2d3c4b5a69788796a5b4c3d2e1f0", PropertyValue::Map(shape));

        let mut item = PropertyMap::new();
        item.insert("Name", PropertyValue::scalar("a"));
        item.insert("Weight", PropertyValue::scalar("2"));

        let mut map = PropertyMap::new();
        map.insert("Position", PropertyValue::Map(position));
        map.insert("Shapes", PropertyValue::Map(shapes));
        map.insert("Empty", PropertyValue::Map(PropertyMap::new()));
        map.insert("Shader", PropertyValue::Map(PropertyMap::with_tag("ComputeColor")));
        map.insert("None", PropertyValue::List(Vec::new()));
        map.insert(
            "Items",
            PropertyValue::List(vec![PropertyValue::Map(item), PropertyValue::scalar("b")]),
        );
        map
    }

    #[test]
    fn test_render_layout() {
        let mut out = String::new();
        BlockWriter::new().write_map(&mut out, 0, &sample());
        let expected = "\
Position: {X: 1.0, Y: 2.0}
Shapes:
    0f1e2d3c4b5a69788796a5b4c3d2e1f0: !BoxColliderShapeDesc
        Is2D: false
Empty: {}
Shader: !ComputeColor
None: []
Items:
    -   Name: a
        Weight: 2
    - b
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_rendered_text_reads_back() {
        let mut out = String::new();
        BlockWriter::new().write_map(&mut out, 0, &sample());
        let map: PropertyMap = reader::parse(&out)
            .iter()
            .map(|n| (n.key.clone(), n.to_property()))
            .collect();
        assert_eq!(map, sample());
    }

    #[test]
    fn test_windows_line_endings() {
        let mut out = String::new();
        BlockWriter::new()
            .with_line_ending(LineEnding::Windows)
            .write_entry(&mut out, 4, "Speed", &PropertyValue::scalar("1.0"));
        assert_eq!(out, "    Speed: 1.0\r\n");
    }

    #[test]
    fn test_inline_token() {
        assert_eq!(inline_token(&PropertyValue::scalar("5")), Some("5".to_string()));
        assert_eq!(
            inline_token(&PropertyValue::Map(PropertyMap::with_tag("Mesh"))),
            Some("!Mesh".to_string())
        );
        let mut block = PropertyMap::new();
        block.insert("A", PropertyValue::scalar("1"));
        assert_eq!(inline_token(&PropertyValue::Map(block)), None);
    }
}
