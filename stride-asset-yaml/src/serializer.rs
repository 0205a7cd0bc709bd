//! Surgical serializer for scenes and prefabs
//!
//! A clean document is written back byte for byte. A modified one is
//! patched line by line: removed entity blocks are cut out, modified ones
//! are replaced by freshly rendered text, new ones are appended to the
//! `Parts:` section and the root list is rewritten when it changed. All
//! other bytes are left alone. Documents without backing text are
//! rendered in full.

use crate::document::{DocumentKind, SceneDocument, StrideDocument};
use crate::entity::Entity;
use crate::reader::{block_end, find_entity_block, indent_width, is_blank, line_content, split_lines};
use crate::writer::BlockWriter;
use stride_asset_core::constants::keys;
use stride_asset_core::{INDENT_WIDTH, format_entity_ref};
use tracing::{debug, warn};

/// Writes a [`SceneDocument`] back to text
pub struct SceneSerializer<'a> {
    document: &'a SceneDocument,
    writer: BlockWriter,
}

impl<'a> SceneSerializer<'a> {
    pub fn new(document: &'a SceneDocument) -> Self {
        Self {
            document,
            writer: BlockWriter::new().with_line_ending(document.line_ending),
        }
    }

    pub fn serialize(&self) -> String {
        match self.document.raw.as_deref() {
            None => self.render_full(),
            Some(raw) if !self.document.is_modified() => raw.to_string(),
            Some(raw) => self.splice(raw),
        }
    }

    /// Render header, root list and every entity
    pub fn render_full(&self) -> String {
        let doc = self.document;
        let w = &self.writer;
        let step = w.indent_size();
        let mut out = String::new();

        w.line(&mut out, 0, doc.kind.header_tag());
        w.line(&mut out, 0, &format!("{}: {}", keys::ID, doc.id));
        w.line(
            &mut out,
            0,
            &format!("{}: {}", keys::SERIALIZED_VERSION, doc.serialized_version),
        );
        w.line(&mut out, 0, &format!("{}: []", keys::TAGS));
        if doc.kind == DocumentKind::Scene {
            w.line(&mut out, 0, "ChildrenIds: []");
            w.line(&mut out, 0, "Offset: {X: 0.0, Y: 0.0, Z: 0.0}");
        }
        w.line(&mut out, 0, &format!("{}:", keys::HIERARCHY));
        out.push_str(&self.render_root_parts(step, 2 * step));

        if doc.entities.is_empty() {
            w.line(&mut out, step, &format!("{}: []", keys::PARTS));
        } else {
            w.line(&mut out, step, &format!("{}:", keys::PARTS));
            for entity in doc.entities.values() {
                out.push_str(&w.render_entity(2 * step, entity));
            }
        }
        out
    }

    fn render_root_parts(&self, indent: usize, item_indent: usize) -> String {
        let mut out = String::new();
        if self.document.root_ids.is_empty() {
            self.writer
                .line(&mut out, indent, &format!("{}: []", keys::ROOT_PARTS));
        } else {
            self.writer
                .line(&mut out, indent, &format!("{}:", keys::ROOT_PARTS));
            for id in &self.document.root_ids {
                self.writer
                    .line(&mut out, item_indent, &format!("- {}", format_entity_ref(id)));
            }
        }
        out
    }

    /// Patch the original text
    fn splice(&self, raw: &str) -> String {
        let doc = self.document;
        let ending = doc.line_ending.as_str();
        let mut lines: Vec<String> = split_lines(raw).into_iter().map(str::to_string).collect();
        if let Some(last) = lines.last_mut()
            && !last.ends_with('\n')
        {
            last.push_str(ending);
        }

        for id in &doc.pending_removals {
            match find_entity_block(lines.as_slice(), id) {
                Some((start, end)) => {
                    debug!(id = %id, start, end, "removing entity block");
                    lines.drain(start..end);
                }
                None => warn!(id = %id, "removed entity has no block in the text, skipping"),
            }
        }

        let mut created: Vec<&Entity> = Vec::new();
        for entity in doc.entities.values() {
            if !entity.is_from_text() {
                created.push(entity);
                continue;
            }
            if !entity.is_dirty() {
                continue;
            }
            match find_entity_block(lines.as_slice(), entity.id()) {
                Some((start, end)) => {
                    let indent = indent_width(&lines[start]);
                    let text = self.writer.render_entity(indent, entity);
                    debug!(id = entity.id(), start, end, "replacing entity block");
                    lines.splice(start..end, to_lines(&text));
                }
                None => warn!(
                    id = entity.id(),
                    "entity block not found in the text, leaving it untouched"
                ),
            }
        }

        if !created.is_empty() {
            match self.parts_insertion_point(&mut lines) {
                Some((at, indent)) => {
                    let text: String = created
                        .iter()
                        .map(|entity| self.writer.render_entity(indent, entity))
                        .collect();
                    debug!(count = created.len(), at, "appending new entities");
                    lines.splice(at..at, to_lines(&text));
                }
                None => warn!("document has no Parts section, new entities were not written"),
            }
        }

        if doc.root_ids != doc.loaded_root_ids {
            self.rewrite_root_parts(&mut lines);
        }

        let mut out = lines.concat();
        if !raw.ends_with('\n') && out.ends_with(ending) {
            out.truncate(out.len() - ending.len());
        }
        out
    }

    /// Line to insert new entity items at, and the indent of their dash.
    /// An inline `Parts: []` is turned into a block header first.
    fn parts_insertion_point(&self, lines: &mut [String]) -> Option<(usize, usize)> {
        let parts = find_hierarchy_child(lines, keys::PARTS)?;
        let parts_indent = indent_width(&lines[parts]);
        let content = line_content(&lines[parts]).trim_start();
        if content != format!("{}:", keys::PARTS) {
            lines[parts] = format!(
                "{}{}:{}",
                " ".repeat(parts_indent),
                keys::PARTS,
                self.document.line_ending.as_str()
            );
            return Some((parts + 1, parts_indent + INDENT_WIDTH));
        }

        let end = block_end(&*lines, parts);
        let item_indent = lines[parts + 1..end]
            .iter()
            .find(|line| !is_blank(line))
            .map(|line| indent_width(line))
            .unwrap_or(parts_indent + INDENT_WIDTH);
        Some((end, item_indent))
    }

    fn rewrite_root_parts(&self, lines: &mut Vec<String>) {
        let Some(roots) = find_hierarchy_child(lines.as_slice(), keys::ROOT_PARTS) else {
            warn!("document has no RootParts list, root order was not written");
            return;
        };
        let indent = indent_width(&lines[roots]);
        let end = block_end(lines.as_slice(), roots);
        let item_indent = lines[roots + 1..end]
            .iter()
            .find(|line| !is_blank(line))
            .map(|line| indent_width(line))
            .unwrap_or(indent + INDENT_WIDTH);
        let text = self.render_root_parts(indent, item_indent);
        debug!(roots = self.document.root_ids.len(), "rewriting root list");
        lines.splice(roots..end, to_lines(&text));
    }
}

/// Line of a `key:` entry directly under the top-level `Hierarchy:`
fn find_hierarchy_child(lines: &[String], key: &str) -> Option<usize> {
    let hierarchy = lines.iter().position(|line| {
        indent_width(line) == 0 && line_content(line) == format!("{}:", keys::HIERARCHY)
    })?;
    let prefix = format!("{}:", key);
    let mut child_indent = None;
    for (i, line) in lines.iter().enumerate().skip(hierarchy + 1) {
        if is_blank(line) {
            continue;
        }
        let indent = indent_width(line);
        if indent == 0 {
            return None;
        }
        let expected = *child_indent.get_or_insert(indent);
        if indent == expected && line_content(line).trim_start().starts_with(&prefix) {
            return Some(i);
        }
    }
    None
}

fn to_lines(text: &str) -> Vec<String> {
    split_lines(text).into_iter().map(str::to_string).collect()
}
