//! Indentation-tree reader
//!
//! Stride documents use a small, regular subset of YAML: block maps,
//! `- item` sequences, inline `{K: v}` flow maps and `!Type` tags. This
//! reader turns the text into a tree of [`Node`]s that remember the line
//! range they were read from, so callers can cut the original text of any
//! subtree back out of the document.
//!
//! Blank lines and `#` comment lines are skipped. Tabs count as
//! [`TAB_WIDTH`] columns of indentation.

use crate::component::{TypeMatch, match_type};
use stride_asset_core::{INDENT_WIDTH, MapStyle, PropertyMap, PropertyValue, TAB_WIDTH};
use stride_asset_core::scalar::split_flow_map;

/// One line-level node of the document tree
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    /// Map key; empty for list items and bare scalar lines
    pub key: String,
    /// Inline value token, if the line carried one
    pub value: Option<String>,
    /// Type tag without the leading `!`
    pub tag: Option<String>,
    /// Children came from an inline `{K: v}` map
    pub flow: bool,
    /// The node is a `- item`
    pub is_item: bool,
    /// Indentation column of the line the node starts on
    pub indent: usize,
    /// First line of the node (0-based)
    pub line: usize,
    /// One past the last non-blank line of the node
    pub end_line: usize,
    pub children: Vec<Node>,
}

impl Node {
    fn keyed(key: &str, line: usize, indent: usize) -> Self {
        Self {
            key: key.to_string(),
            indent,
            line,
            end_line: line + 1,
            ..Self::default()
        }
    }

    fn item(line: usize, indent: usize) -> Self {
        Self {
            is_item: true,
            indent,
            line,
            end_line: line + 1,
            ..Self::default()
        }
    }

    /// First child with the given key
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.children.iter().find(|c| !c.is_item && c.key == key)
    }

    /// Inline value of a child, e.g. `Id` of an entity block
    pub fn child_value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|c| c.value.as_deref())
    }

    /// List items directly under this node
    pub fn items(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(|c| c.is_item)
    }

    /// Convert the subtree into a property value
    pub fn to_property(&self) -> PropertyValue {
        if self.flow {
            let mut map = self.child_map();
            // `{}` is the empty form of any map, not a flow map
            if !map.is_empty() {
                map.style = MapStyle::Flow;
            }
            return PropertyValue::Map(map);
        }
        if let Some(first) = self.children.first() {
            if first.is_item {
                return PropertyValue::List(self.items().map(Node::to_property).collect());
            }
            return PropertyValue::Map(self.child_map());
        }
        if let Some(tag) = &self.tag {
            return PropertyValue::Map(PropertyMap::with_tag(tag.clone()));
        }
        match self.value.as_deref() {
            Some("[]") => PropertyValue::List(Vec::new()),
            other => PropertyValue::scalar(other.unwrap_or_default()),
        }
    }

    /// Keyed children as a property map carrying this node's tag
    pub fn child_map(&self) -> PropertyMap {
        let mut map: PropertyMap = self
            .children
            .iter()
            .filter(|c| !c.is_item)
            .map(|c| (c.key.clone(), c.to_property()))
            .collect();
        map.tag = self.tag.clone();
        map
    }
}

/// Indentation width of a line in columns
pub fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += TAB_WIDTH,
            _ => break,
        }
    }
    width
}

/// Split text into lines, keeping each line's terminator
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// A line without its terminator and trailing whitespace
pub fn line_content(line: &str) -> &str {
    line.trim_end()
}

/// Whether a line holds nothing the reader cares about
pub fn is_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Text after the dash of a `- item` line, or `None` for other lines
pub fn item_rest(content: &str) -> Option<&str> {
    if content == "-" {
        return Some("");
    }
    content
        .strip_prefix("- ")
        .or_else(|| content.strip_prefix("-\t"))
}

/// Split `key: rest` at the first top-level colon followed by a space or
/// the end of the line
pub fn split_key(content: &str) -> Option<(&str, &str)> {
    let mut quote: Option<char> = None;
    let mut depth = 0i32;
    for (i, c) in content.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' if i == 0 => quote = Some(c),
                '{' | '[' => depth += 1,
                '}' | ']' => depth -= 1,
                ':' if depth == 0 => {
                    let after = &content[i + 1..];
                    if after.is_empty() || after.starts_with(' ') || after.starts_with('\t') {
                        let key = content[..i].trim();
                        if key.is_empty() {
                            return None;
                        }
                        return Some((key, after.trim()));
                    }
                }
                _ => {}
            },
        }
    }
    None
}

struct Frame {
    indent: usize,
    node: Node,
}

/// Parse document text into its top-level nodes
pub fn parse(text: &str) -> Vec<Node> {
    let mut stack = vec![Frame {
        indent: 0,
        node: Node::default(),
    }];
    let mut last_content = 0usize;

    for (index, raw_line) in split_lines(text).into_iter().enumerate() {
        if is_blank(raw_line) {
            continue;
        }
        let indent = indent_width(raw_line);
        while stack.len() > 1 && stack.last().is_some_and(|top| indent <= top.indent) {
            close_top(&mut stack, last_content + 1);
        }
        read_line(&mut stack, line_content(raw_line).trim_start(), indent, index);
        last_content = index;
    }
    while stack.len() > 1 {
        close_top(&mut stack, last_content + 1);
    }

    stack.pop().map(|root| root.node.children).unwrap_or_default()
}

fn close_top(stack: &mut Vec<Frame>, end_line: usize) {
    if let Some(mut frame) = stack.pop() {
        frame.node.end_line = end_line;
        attach(stack, frame.node);
    }
}

fn attach(stack: &mut [Frame], node: Node) {
    if let Some(top) = stack.last_mut() {
        top.node.children.push(node);
    }
}

fn read_line(stack: &mut Vec<Frame>, content: &str, indent: usize, line: usize) {
    if let Some(rest) = item_rest(content) {
        let rest = rest.trim_start();
        let content_col = indent + (content.len() - rest.len());
        let mut item = Node::item(line, indent);

        if rest.is_empty() {
            stack.push(Frame { indent, node: item });
            return;
        }
        if split_key(rest).is_some() {
            // `-   Key: value` opens a map whose keys sit at the content column
            stack.push(Frame {
                indent: content_col - 1,
                node: item,
            });
            read_line(stack, rest, content_col, line);
            return;
        }
        if apply_rest(&mut item, rest) {
            stack.push(Frame { indent, node: item });
        } else {
            attach(stack, item);
        }
        return;
    }

    match split_key(content) {
        Some((key, rest)) => {
            let mut node = Node::keyed(key, line, indent);
            if apply_rest(&mut node, rest) {
                stack.push(Frame { indent, node });
            } else {
                attach(stack, node);
            }
        }
        None => {
            // Bare scalar line such as the `!SceneAsset` header
            let mut node = Node::keyed("", line, indent);
            node.value = Some(content.to_string());
            attach(stack, node);
        }
    }
}

/// Fill in the inline part of a line; returns true when a nested block
/// may follow
fn apply_rest(node: &mut Node, rest: &str) -> bool {
    if rest.is_empty() {
        return true;
    }
    if let Some(tagged) = rest.strip_prefix('!') {
        let (tag, remainder) = match tagged.split_once(char::is_whitespace) {
            Some((tag, remainder)) => (tag, remainder.trim()),
            None => (tagged, ""),
        };
        if remainder.is_empty() {
            node.tag = Some(tag.to_string());
            return true;
        }
        if remainder.starts_with('{') {
            node.tag = Some(tag.to_string());
            read_flow(node, remainder);
            return false;
        }
        // Tagged scalars like `!file path` stay whole tokens
        node.value = Some(rest.to_string());
        return false;
    }
    if rest.starts_with('{') && rest.ends_with('}') {
        read_flow(node, rest);
        return false;
    }
    node.value = Some(rest.to_string());
    false
}

fn read_flow(node: &mut Node, token: &str) {
    node.flow = true;
    for (key, value) in split_flow_map(token) {
        let mut child = Node::keyed(&key, node.line, node.indent);
        if value.starts_with('{') && value.ends_with('}') {
            read_flow(&mut child, &value);
        } else {
            child.value = Some(value);
        }
        node.children.push(child);
    }
}

/// Exact original text of lines `start..end`
pub fn slice_lines(lines: &[&str], start: usize, end: usize) -> String {
    lines[start.min(lines.len())..end.min(lines.len())].concat()
}

/// A component block found directly in the document text
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedComponent {
    pub key: String,
    pub type_tag: String,
    /// First line of the block (the `key: !Type` header)
    pub start_line: usize,
    /// One past the last line of the block
    pub end_line: usize,
    /// Original text of the block
    pub raw: String,
    pub properties: PropertyMap,
}

/// Find a component of an entity without building the whole tree.
///
/// Only lines at the exact indent directly under the entity's
/// `Components:` header are considered, so nested `key: !Type` values deep
/// inside another component never match. Among the candidates an exact
/// type tag wins over a class name match, which wins over a substring.
pub fn locate(text: &str, entity_id: &str, type_fragment: &str) -> Option<LocatedComponent> {
    let lines = split_lines(text);
    let id_line = find_entity_id_line(&lines, entity_id)?;
    let entity_indent = indent_width(lines[id_line]);

    let components_line = (id_line + 1..lines.len())
        .take_while(|&i| is_blank(lines[i]) || indent_width(lines[i]) >= entity_indent)
        .find(|&i| {
            !is_blank(lines[i])
                && indent_width(lines[i]) == entity_indent
                && line_content(lines[i]).trim_start().starts_with("Components:")
        })?;

    let header_indent = (components_line + 1..lines.len())
        .find(|&i| !is_blank(lines[i]))
        .map(|i| indent_width(lines[i]))
        .filter(|&indent| indent > entity_indent)?;

    let mut best: Option<(TypeMatch, usize, String, String)> = None;
    for i in components_line + 1..lines.len() {
        if is_blank(lines[i]) {
            continue;
        }
        let indent = indent_width(lines[i]);
        if indent <= entity_indent {
            break;
        }
        if indent != header_indent {
            continue;
        }
        let Some((key, rest)) = split_key(line_content(lines[i]).trim_start()) else {
            continue;
        };
        let Some(tag) = rest.strip_prefix('!') else {
            continue;
        };
        let tag = tag.split_whitespace().next().unwrap_or(tag);
        if let Some(rank) = match_type(tag, type_fragment)
            && best.as_ref().is_none_or(|(current, ..)| rank < *current)
        {
            best = Some((rank, i, key.to_string(), tag.to_string()));
        }
    }

    let (_, start, key, type_tag) = best?;
    let end = block_end(&lines, start);
    let raw = slice_lines(&lines, start, end);
    let properties = parse(&raw)
        .first()
        .map(Node::child_map)
        .unwrap_or_default();

    Some(LocatedComponent {
        key,
        type_tag,
        start_line: start,
        end_line: end,
        raw,
        properties,
    })
}

/// One past the last non-blank line belonging to the block that starts at
/// `start`
pub fn block_end<S: AsRef<str>>(lines: &[S], start: usize) -> usize {
    let indent = indent_width(lines[start].as_ref());
    let mut end = start + 1;
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        let line = line.as_ref();
        if is_blank(line) {
            continue;
        }
        if indent_width(line) <= indent {
            break;
        }
        end = i + 1;
    }
    end
}

/// Line of an entity's own `Id:`, recognised by its parent key being
/// `Entity:`
pub fn find_entity_id_line<S: AsRef<str>>(lines: &[S], entity_id: &str) -> Option<usize> {
    let wanted = format!("Id: {}", entity_id);
    lines.iter().enumerate().find_map(|(i, line)| {
        let line = line.as_ref();
        if line_content(line).trim_start() != wanted {
            return None;
        }
        let indent = indent_width(line);
        let parent = (0..i).rev().find(|&j| {
            let candidate = lines[j].as_ref();
            !is_blank(candidate) && indent_width(candidate) < indent
        })?;
        let parent_content = line_content(lines[parent].as_ref()).trim_start();
        let parent_content = item_rest(parent_content).map_or(parent_content, str::trim_start);
        (parent_content == "Entity:" && indent >= INDENT_WIDTH).then_some(i)
    })
}

/// Line range of the `Parts:` item that holds an entity: from its `- `
/// marker (a `Folder:` or `Entity:` line) to the line before the next
/// sibling item or the end of the section
pub fn find_entity_block<S: AsRef<str>>(lines: &[S], entity_id: &str) -> Option<(usize, usize)> {
    let id_line = find_entity_id_line(lines, entity_id)?;
    let id_indent = indent_width(lines[id_line].as_ref());
    let start = (0..id_line).rev().find(|&i| {
        let line = lines[i].as_ref();
        !is_blank(line)
            && indent_width(line) < id_indent
            && item_rest(line_content(line).trim_start()).is_some()
    })?;
    Some((start, block_end(lines, start)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
!PrefabAsset
Id: 3a1f0c4e-0000-4000-8000-000000000001
SerializedVersion: {Stride: 3.1.0.1}
Tags: []
Hierarchy:
    RootParts:
        - ref!! 0b7e6f50-0000-4000-8000-000000000002
    Parts:
        -   Entity:
                Id: 0b7e6f50-0000-4000-8000-000000000002
                Name: Crate
                Components:
                    5a9d4c1b2e3f40718293a4b5c6d7e8f9: !TransformComponent
                        Id: 7c1d2e3f-0000-4000-8000-000000000003
                        Position: {X: 1.0, Y: 0.0, Z: 0.0}
                        Children: {}
                    6b0e5d2c3f4051829304b5c6d7e8f90a: !RigidbodyComponent
                        Id: 8d2e3f40-0000-4000-8000-000000000004
                        ColliderShapes:
                            1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f: !BoxColliderShapeDesc
                                Size: {X: 1.0, Y: 1.0, Z: 1.0}
";

    #[test]
    fn test_parse_structure() {
        let nodes = parse(SAMPLE);
        assert_eq!(nodes[0].value.as_deref(), Some("!PrefabAsset"));
        assert_eq!(nodes[1].key, "Id");

        let version = nodes.iter().find(|n| n.key == "SerializedVersion").unwrap();
        assert!(version.flow);
        assert_eq!(version.child_value("Stride"), Some("3.1.0.1"));

        let hierarchy = nodes.iter().find(|n| n.key == "Hierarchy").unwrap();
        let roots: Vec<_> = hierarchy.get("RootParts").unwrap().items().collect();
        assert_eq!(roots.len(), 1);
        assert_eq!(
            roots[0].value.as_deref(),
            Some("ref!! 0b7e6f50-0000-4000-8000-000000000002")
        );

        let parts: Vec<_> = hierarchy.get("Parts").unwrap().items().collect();
        assert_eq!(parts.len(), 1);
        let entity = parts[0].get("Entity").unwrap();
        assert_eq!(entity.child_value("Name"), Some("Crate"));
        let components = entity.get("Components").unwrap();
        assert_eq!(components.children.len(), 2);
        assert_eq!(components.children[0].tag.as_deref(), Some("TransformComponent"));
        assert_eq!(components.children[0].line, 12);
        assert_eq!(components.children[0].end_line, 16);
    }

    #[test]
    fn test_to_property_shapes() {
        let nodes = parse(SAMPLE);
        let hierarchy = nodes.iter().find(|n| n.key == "Hierarchy").unwrap();
        let parts = hierarchy.get("Parts").unwrap();
        let entity = parts.items().next().unwrap().get("Entity").unwrap();
        let component = &entity.get("Components").unwrap().children[1];
        let map = component.child_map();
        assert_eq!(map.tag.as_deref(), Some("RigidbodyComponent"));
        let shapes = map.get("ColliderShapes").unwrap().as_map().unwrap();
        let shape = shapes.values().next().unwrap().as_map().unwrap();
        assert_eq!(shape.tag.as_deref(), Some("BoxColliderShapeDesc"));
        assert_eq!(shape.get("Size").unwrap().as_map().unwrap().style, MapStyle::Flow);

        let tags = nodes.iter().find(|n| n.key == "Tags").unwrap();
        assert_eq!(tags.to_property(), PropertyValue::List(Vec::new()));
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("Name: Player"), Some(("Name", "Player")));
        assert_eq!(split_key("Components:"), Some(("Components", "")));
        assert_eq!(
            split_key("Model: 1e2f3a4b-0000-4000-8000-000000000000:Models/Box"),
            Some(("Model", "1e2f3a4b-0000-4000-8000-000000000000:Models/Box"))
        );
        assert_eq!(split_key("ref!! abc"), None);
        assert_eq!(split_key("'a: b'"), None);
    }

    #[test]
    fn test_list_of_maps() {
        let text = "Items:\n    -   Name: a\n        Value: 1\n    -   Name: b\n        Value: 2\n    - plain\n";
        let nodes = parse(text);
        let list = nodes[0].to_property();
        let items = list.as_list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].as_map().unwrap().get("Value"), Some(&PropertyValue::scalar("2")));
        assert_eq!(items[2], PropertyValue::scalar("plain"));
    }

    #[test]
    fn test_tagged_scalar_stays_whole() {
        let nodes = parse("Source: !file ../Resources/crate.png\nEmpty: !Mesh {}\n");
        assert_eq!(nodes[0].value.as_deref(), Some("!file ../Resources/crate.png"));
        assert_eq!(nodes[1].tag.as_deref(), Some("Mesh"));
        assert!(nodes[1].flow);
    }

    #[test]
    fn test_locate_prefers_top_level_components() {
        let found = locate(
            SAMPLE,
            "0b7e6f50-0000-4000-8000-000000000002",
            "BoxColliderShapeDesc",
        );
        // Nested tags are never component headers
        assert!(found.is_none());

        let body = locate(SAMPLE, "0b7e6f50-0000-4000-8000-000000000002", "Rigidbody").unwrap();
        assert_eq!(body.key, "6b0e5d2c3f4051829304b5c6d7e8f90a");
        assert_eq!(body.start_line, 16);
        assert_eq!(body.end_line, 21);
        assert!(body.raw.starts_with("                    6b0e5d2c"));
        assert!(body.properties.contains_key("ColliderShapes"));

        let transform = locate(
            SAMPLE,
            "0b7e6f50-0000-4000-8000-000000000002",
            "TransformComponent",
        )
        .unwrap();
        assert_eq!(
            transform.properties.get_as::<String>("Id").as_deref(),
            Some("7c1d2e3f-0000-4000-8000-000000000003")
        );
        assert!(locate(SAMPLE, "missing", "TransformComponent").is_none());
    }

    #[test]
    fn test_find_entity_block_with_folder() {
        let text = "\
Hierarchy:
    Parts:
        -   Folder: Props
            Entity:
                Id: 11111111-0000-4000-8000-000000000001
                Name: A
        -   Entity:
                Id: 22222222-0000-4000-8000-000000000002
                Name: B
";
        let lines = split_lines(text);
        assert_eq!(
            find_entity_block(&lines, "11111111-0000-4000-8000-000000000001"),
            Some((2, 6))
        );
        assert_eq!(
            find_entity_block(&lines, "22222222-0000-4000-8000-000000000002"),
            Some((6, 9))
        );
        assert_eq!(find_entity_block(&lines, "33333333-0000-4000-8000-000000000003"), None);
    }

    #[test]
    fn test_crlf_lines() {
        let nodes = parse("A: 1\r\nB:\r\n    C: 2\r\n");
        assert_eq!(nodes[0].value.as_deref(), Some("1"));
        assert_eq!(nodes[1].child_value("C"), Some("2"));
    }
}
