//! Constants and type definitions for the Stride YAML dialect
//!
//! This module contains the header tags, section keys and well-known
//! component types used throughout parsing and serialization.

/// Header tag of a scene document
pub const SCENE_ASSET_TAG: &str = "!SceneAsset";

/// Header tag of a prefab document
pub const PREFAB_ASSET_TAG: &str = "!PrefabAsset";

/// Serialized version written into freshly created scene/prefab documents
pub const DEFAULT_SERIALIZED_VERSION: &str = "{Stride: 3.1.0.1}";

/// Prefix of an intra-document entity reference
pub const ENTITY_REF_PREFIX: &str = "ref!! ";

/// Prefix of an external file pointer
pub const FILE_REF_PREFIX: &str = "!file ";

/// Number of spaces per indentation level
pub const INDENT_WIDTH: usize = 4;

/// Width a tab character counts for when measuring indentation
pub const TAB_WIDTH: usize = 4;

/// Literal used by the format for an uninitialized value
pub const NULL_LITERAL: &str = "null";

/// Section and field keys of scene/prefab documents
pub mod keys {
    pub const ID: &str = "Id";
    pub const NAME: &str = "Name";
    pub const SERIALIZED_VERSION: &str = "SerializedVersion";
    pub const TAGS: &str = "Tags";
    pub const HIERARCHY: &str = "Hierarchy";
    pub const ROOT_PARTS: &str = "RootParts";
    pub const PARTS: &str = "Parts";
    pub const ENTITY: &str = "Entity";
    pub const FOLDER: &str = "Folder";
    pub const COMPONENTS: &str = "Components";
    pub const BASE: &str = "Base";
    pub const BASE_PART_ASSET: &str = "BasePartAsset";
    pub const BASE_PART_ID: &str = "BasePartId";
    pub const INSTANCE_ID: &str = "InstanceId";
    pub const CHILDREN: &str = "Children";
    pub const POSITION: &str = "Position";
    pub const ROTATION: &str = "Rotation";
    pub const SCALE: &str = "Scale";
}

/// Well-known component type tags
pub mod component_types {
    /// The positional component every entity carries
    pub const TRANSFORM: &str = "TransformComponent";
}

/// Line ending types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Unix, // \n
    Windows, // \r\n
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Unix => "\n",
            LineEnding::Windows => "\r\n",
        }
    }

    /// Detect the line ending used by `text` (first line break wins)
    pub fn detect(text: &str) -> Self {
        match text.find('\n') {
            Some(pos) if pos > 0 && text.as_bytes()[pos - 1] == b'\r' => LineEnding::Windows,
            _ => LineEnding::Unix,
        }
    }
}
