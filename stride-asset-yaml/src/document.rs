//! Scene and prefab documents
//!
//! A [`SceneDocument`] owns its entities in an id-keyed arena; hierarchy
//! links between entities are plain id lookups. The original text is kept
//! alongside so that saving only rewrites what was touched.

use crate::component::Component;
use crate::entity::{Entity, PrefabInstanceLink, RawEntry};
use crate::reader::{self, Node, item_rest, line_content, slice_lines, split_lines};
use crate::serializer::SceneSerializer;
use crate::writer::inline_token;
use indexmap::IndexMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stride_asset_core::constants::keys;
use stride_asset_core::{
    DEFAULT_SERIALIZED_VERSION, FromProperty, LineEnding, PREFAB_ASSET_TAG, PropertyValue, Result,
    SCENE_ASSET_TAG, ScriptMetadata, StrideAssetError, ValidationMode, new_guid, parse_entity_ref,
};
use tracing::{debug, info, instrument, warn};

/// Behaviour shared by every document that can be loaded and saved
pub trait StrideDocument: Sized {
    /// Load a document from a file
    fn load<P: AsRef<Path>>(path: P) -> Result<Self>;

    /// Where the document was loaded from or last saved to
    fn file_path(&self) -> Option<&Path>;

    /// The document text as it would be written now
    fn to_yaml_string(&self) -> String;

    /// Whether saving would change the file
    fn is_modified(&self) -> bool;

    /// Carry session settings over to a freshly reloaded copy
    fn carry_settings(&self, _reloaded: &mut Self) {}

    /// Save back to the file the document came from
    fn save(&mut self) -> Result<()> {
        let path = self
            .file_path()
            .ok_or_else(|| StrideAssetError::missing_argument("path"))?
            .to_path_buf();
        self.save_as(path)
    }

    /// Serialize, write once, then reload so the in-memory document
    /// matches the bytes on disk
    fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = self.to_yaml_string();
        fs::write(path, text)?;

        let mut reloaded = Self::load(path)?;
        self.carry_settings(&mut reloaded);
        *self = reloaded;
        info!(path = %path.display(), "saved document");
        Ok(())
    }
}

/// Read a whole document file
pub fn read_document_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StrideAssetError::not_found("File", path.display().to_string())
        } else {
            StrideAssetError::Io(e)
        }
    })
}

/// Scene or prefab; the two share one layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Scene,
    Prefab,
}

impl DocumentKind {
    pub fn header_tag(&self) -> &'static str {
        match self {
            DocumentKind::Scene => SCENE_ASSET_TAG,
            DocumentKind::Prefab => PREFAB_ASSET_TAG,
        }
    }

    pub fn from_header(header: &str) -> Option<Self> {
        match header.trim() {
            SCENE_ASSET_TAG => Some(DocumentKind::Scene),
            PREFAB_ASSET_TAG => Some(DocumentKind::Prefab),
            _ => None,
        }
    }
}

/// An editable scene or prefab
#[derive(Clone)]
pub struct SceneDocument {
    pub(crate) kind: DocumentKind,
    pub(crate) id: String,
    pub(crate) serialized_version: String,
    pub(crate) root_ids: Vec<String>,
    /// Root list as read from the text
    pub(crate) loaded_root_ids: Vec<String>,
    pub(crate) entities: IndexMap<String, Entity>,
    pub(crate) pending_removals: Vec<String>,
    pub(crate) raw: Option<String>,
    pub(crate) line_ending: LineEnding,
    path: Option<PathBuf>,
    pub(crate) validation: ValidationMode,
    pub(crate) metadata: Option<Arc<dyn ScriptMetadata>>,
}

impl fmt::Debug for SceneDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneDocument")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("path", &self.path)
            .field("root_ids", &self.root_ids)
            .field("entities", &self.entities.len())
            .field("pending_removals", &self.pending_removals)
            .field("validation", &self.validation)
            .field("metadata", &self.metadata.is_some())
            .finish_non_exhaustive()
    }
}

impl SceneDocument {
    /// A new, empty document with no backing text
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            id: new_guid(),
            serialized_version: DEFAULT_SERIALIZED_VERSION.to_string(),
            root_ids: Vec::new(),
            loaded_root_ids: Vec::new(),
            entities: IndexMap::new(),
            pending_removals: Vec::new(),
            raw: None,
            line_ending: LineEnding::default(),
            path: None,
            validation: ValidationMode::default(),
            metadata: None,
        }
    }

    pub fn new_scene() -> Self {
        Self::new(DocumentKind::Scene)
    }

    pub fn new_prefab() -> Self {
        Self::new(DocumentKind::Prefab)
    }

    /// Parse document text
    #[instrument(skip(text), fields(len = text.len()))]
    pub fn parse_str(text: &str) -> Result<Self> {
        let nodes = reader::parse(text);
        let lines = split_lines(text);

        let header = nodes
            .first()
            .filter(|n| n.key.is_empty())
            .and_then(|n| n.value.as_deref())
            .ok_or_else(|| StrideAssetError::structure("missing document type header"))?;
        let kind = DocumentKind::from_header(header).ok_or_else(|| {
            StrideAssetError::structure(format!(
                "'{}' is not a scene or prefab; open it as an asset document",
                header
            ))
        })?;

        let top = |key: &str| nodes.iter().find(|n| n.key == key);
        let id = top(keys::ID)
            .and_then(|n| n.value.clone())
            .ok_or_else(|| StrideAssetError::structure("document has no Id"))?;
        let serialized_version = top(keys::SERIALIZED_VERSION)
            .and_then(|n| inline_token(&n.to_property()))
            .unwrap_or_else(|| DEFAULT_SERIALIZED_VERSION.to_string());

        let mut root_ids = Vec::new();
        let mut entities = IndexMap::new();
        if let Some(hierarchy) = top(keys::HIERARCHY) {
            if let Some(roots) = hierarchy.get(keys::ROOT_PARTS) {
                root_ids = roots
                    .items()
                    .filter_map(|item| item.value.as_deref())
                    .filter_map(parse_entity_ref)
                    .collect();
            }
            if let Some(parts) = hierarchy.get(keys::PARTS) {
                for item in parts.items() {
                    let entity = entity_from_node(item, &lines)?;
                    if entities.contains_key(entity.id()) {
                        warn!(id = entity.id(), "duplicate entity id, keeping the last block");
                    }
                    entities.insert(entity.id().to_string(), entity);
                }
            }
        } else {
            debug!("document has no Hierarchy section");
        }

        for root in &root_ids {
            if !entities.contains_key(root) {
                warn!(id = %root, "root reference does not resolve to an entity");
            }
        }

        Ok(Self {
            kind,
            id,
            serialized_version,
            loaded_root_ids: root_ids.clone(),
            root_ids,
            entities,
            pending_removals: Vec::new(),
            raw: Some(text.to_string()),
            line_ending: LineEnding::detect(text),
            path: None,
            validation: ValidationMode::default(),
            metadata: None,
        })
    }

    /// Attach a validation mode and script metadata provider
    pub fn with_validation(
        mut self,
        mode: ValidationMode,
        metadata: Option<Arc<dyn ScriptMetadata>>,
    ) -> Self {
        self.validation = mode;
        self.metadata = metadata;
        self
    }

    pub fn set_validation_mode(&mut self, mode: ValidationMode) {
        self.validation = mode;
    }

    pub fn validation_mode(&self) -> ValidationMode {
        self.validation
    }

    pub fn set_metadata(&mut self, metadata: Option<Arc<dyn ScriptMetadata>>) {
        self.metadata = metadata;
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn serialized_version(&self) -> &str {
        &self.serialized_version
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn set_line_ending(&mut self, line_ending: LineEnding) {
        self.line_ending = line_ending;
    }

    /// The text the document was loaded from, if any
    pub fn raw_text(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Root entity ids in order
    pub fn root_ids(&self) -> &[String] {
        &self.root_ids
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn entities(&self) -> impl ExactSizeIterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn root_entities(&self) -> Vec<&Entity> {
        self.root_ids
            .iter()
            .filter_map(|id| self.entities.get(id))
            .collect()
    }

    /// Ids removed since loading that still have a block in the text
    pub fn pending_removals(&self) -> &[String] {
        &self.pending_removals
    }

    pub(crate) fn require_entity(&self, id: &str) -> Result<&Entity> {
        self.entities
            .get(id)
            .ok_or_else(|| StrideAssetError::not_found("Entity", id))
    }

    pub(crate) fn require_entity_mut(&mut self, id: &str) -> Result<&mut Entity> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| StrideAssetError::not_found("Entity", id))
    }
}

impl StrideDocument for SceneDocument {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = read_document_text(path)?;
        let mut document = Self::parse_str(&text)?;
        document.path = Some(path.to_path_buf());
        info!(
            entities = document.entities.len(),
            kind = ?document.kind,
            "loaded document"
        );
        Ok(document)
    }

    fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn to_yaml_string(&self) -> String {
        SceneSerializer::new(self).serialize()
    }

    fn is_modified(&self) -> bool {
        self.raw.is_none()
            || !self.pending_removals.is_empty()
            || self.root_ids != self.loaded_root_ids
            || self.entities.values().any(Entity::is_dirty)
    }

    fn carry_settings(&self, reloaded: &mut Self) {
        reloaded.validation = self.validation;
        reloaded.metadata = self.metadata.clone();
    }
}

fn entity_from_node(item: &Node, lines: &[&str]) -> Result<Entity> {
    let entity = item.get(keys::ENTITY).ok_or_else(|| {
        StrideAssetError::parse("part without an Entity block", item.line + 1)
    })?;
    let id = entity
        .child_value(keys::ID)
        .ok_or_else(|| StrideAssetError::parse("entity without an Id", entity.line + 1))?
        .to_string();
    let name_token = entity.child_value(keys::NAME).unwrap_or_default().to_string();
    let folder = item
        .child_value(keys::FOLDER)
        .and_then(|token| String::from_property(&PropertyValue::scalar(token)));

    let base = item.get(keys::BASE).map(|base| PrefabInstanceLink {
        base_part_asset: base
            .child_value(keys::BASE_PART_ASSET)
            .unwrap_or_default()
            .to_string(),
        base_part_id: base
            .child_value(keys::BASE_PART_ID)
            .unwrap_or_default()
            .to_string(),
        instance_id: base
            .child_value(keys::INSTANCE_ID)
            .unwrap_or_default()
            .to_string(),
    });

    let components = entity
        .get(keys::COMPONENTS)
        .map(|components| {
            components
                .children
                .iter()
                .filter(|c| !c.is_item)
                .map(|c| {
                    Component::from_raw(
                        c.key.clone(),
                        c.tag.clone().unwrap_or_default(),
                        c.child_value(keys::ID).unwrap_or_default().to_string(),
                        slice_lines(lines, c.line, c.end_line),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let entity_entries = raw_entries(entity, lines, &[keys::ID, keys::NAME, keys::COMPONENTS]);
    let part_entries = raw_entries(item, lines, &[keys::FOLDER, keys::ENTITY, keys::BASE]);
    Ok(Entity::from_text(id, name_token, folder, base, components)
        .with_raw_entries(entity_entries, part_entries))
}

/// Children of `node` outside `known`, each tagged with the known key it
/// followed
fn raw_entries(node: &Node, lines: &[&str], known: &[&str]) -> Vec<RawEntry> {
    let mut after: Option<String> = None;
    let mut entries = Vec::new();
    for child in node.children.iter().filter(|c| !c.is_item) {
        if known.contains(&child.key.as_str()) {
            after = Some(child.key.clone());
            continue;
        }
        entries.push(RawEntry {
            after: after.clone(),
            indent: child.indent,
            text: entry_text(lines, child),
        });
    }
    entries
}

/// Original text of an entry; one opening a `-   Key:` item line loses
/// the dash
fn entry_text(lines: &[&str], node: &Node) -> String {
    let text = slice_lines(lines, node.line, node.end_line);
    let Some(&first) = lines.get(node.line) else {
        return text;
    };
    match item_rest(line_content(first).trim_start()) {
        Some(rest) => format!(
            "{}{}{}{}",
            " ".repeat(node.indent),
            rest.trim_start(),
            &first[line_content(first).len()..],
            &text[first.len()..]
        ),
        None => text,
    }
}
