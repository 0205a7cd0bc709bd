//! Stride Asset YAML
//!
//! Reader and surgical writer for Stride's YAML dialect. Scenes and
//! prefabs load into a [`SceneDocument`] whose entities and components can
//! be edited in place; flat assets load into an [`AssetDocument`]. Saving
//! rewrites only the parts of the text that were touched.
//!
//! # Examples
//!
//! ```rust,no_run
//! use stride_asset_yaml::{SceneDocument, StrideDocument};
//! use stride_asset_core::Vector3;
//!
//! let mut scene = SceneDocument::load("Assets/MainScene.sdscene")?;
//! let player = scene.resolve_entity("Player")?;
//! scene.set(&player, "TransformComponent", "Position", Vector3::new(10.0, 5.0, 0.0))?;
//! scene.save()?;
//! # Ok::<(), stride_asset_core::StrideAssetError>(())
//! ```

// Re-export core types
pub use stride_asset_core::{
    FromProperty, PropertyMap, PropertyValue, Quaternion, Result, ScriptCatalog, ScriptMetadata,
    StrideAssetError, ValidationMode, Value, Vector3,
};

pub mod asset;
pub mod component;
pub mod document;
pub mod editor;
pub mod entity;
pub mod reader;
pub mod script_catalog;
pub mod serializer;
pub mod writer;

// Re-export main types
pub use asset::AssetDocument;
pub use component::{Component, TypeMatch};
pub use document::{DocumentKind, SceneDocument, StrideDocument};
pub use editor::Placement;
pub use entity::{Entity, PrefabInstanceLink, RawEntry};
pub use reader::{LocatedComponent, Node, locate, parse};
pub use script_catalog::{load_script_catalog, parse_script_catalog};
pub use serializer::SceneSerializer;
pub use writer::BlockWriter;
