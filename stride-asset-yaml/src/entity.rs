//! Entities of a scene or prefab

use crate::component::{Component, TypeMatch};
use indexmap::IndexMap;
use stride_asset_core::scalar::format_string;
use stride_asset_core::{
    AssetRef, EntityRef, FromProperty, PropertyValue, Quaternion, Result, StrideAssetError,
    Vector3, constants::keys, new_guid, require,
};

/// Link from a prefab instance part back to the prefab it came from
#[derive(Debug, Clone, PartialEq)]
pub struct PrefabInstanceLink {
    /// `guid:path` reference to the prefab asset
    pub base_part_asset: String,
    /// Id of the entity inside the prefab
    pub base_part_id: String,
    /// Id shared by every part of one instance
    pub instance_id: String,
}

impl PrefabInstanceLink {
    pub fn asset(&self) -> Option<AssetRef> {
        AssetRef::parse(&self.base_part_asset)
    }
}

/// Original text of an entry the editor does not model, written back
/// verbatim when its entity is re-rendered
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    /// Known key the entry followed; `None` when it came before all of them
    pub after: Option<String>,
    /// Indentation column of the entry's key
    pub indent: usize,
    pub text: String,
}

/// An entity: a name, an optional folder label and its components
#[derive(Debug, Clone)]
pub struct Entity {
    id: String,
    name: String,
    folder: Option<String>,
    base: Option<PrefabInstanceLink>,
    components: IndexMap<String, Component>,
    /// Exact token the name was read from, reused until renamed
    name_token: Option<String>,
    /// Unknown keys of the `Entity:` map
    entity_entries: Vec<RawEntry>,
    /// Unknown keys of the part item next to `Entity:`
    part_entries: Vec<RawEntry>,
    dirty: bool,
    from_text: bool,
}

impl Entity {
    /// A new entity with a default transform
    pub fn new(name: &str) -> Result<Self> {
        let name = require("name", name)?;
        let mut entity = Self {
            id: new_guid(),
            name: name.to_string(),
            folder: None,
            base: None,
            components: IndexMap::new(),
            name_token: None,
            entity_entries: Vec::new(),
            part_entries: Vec::new(),
            dirty: true,
            from_text: false,
        };
        entity.push_component(Component::transform());
        Ok(entity)
    }

    pub(crate) fn from_text(
        id: String,
        name_token: String,
        folder: Option<String>,
        base: Option<PrefabInstanceLink>,
        components: Vec<Component>,
    ) -> Self {
        let name = String::from_property(&PropertyValue::scalar(name_token.as_str()))
            .unwrap_or_default();
        Self {
            id,
            name,
            folder,
            base,
            components: components
                .into_iter()
                .map(|c| (c.key().to_string(), c))
                .collect(),
            name_token: Some(name_token),
            entity_entries: Vec::new(),
            part_entries: Vec::new(),
            dirty: false,
            from_text: true,
        }
    }

    /// Keep entries read from the text that have no typed field
    pub(crate) fn with_raw_entries(
        mut self,
        entity_entries: Vec<RawEntry>,
        part_entries: Vec<RawEntry>,
    ) -> Self {
        self.entity_entries = entity_entries;
        self.part_entries = part_entries;
        self
    }

    /// Unknown keys of the `Entity:` map, in document order
    pub fn entity_entries(&self) -> &[RawEntry] {
        &self.entity_entries
    }

    /// Unknown keys of the part item, in document order
    pub fn part_entries(&self) -> &[RawEntry] {
        &self.part_entries
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name as it should be written
    pub fn name_token(&self) -> String {
        self.name_token
            .clone()
            .unwrap_or_else(|| format_string(&self.name))
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        let name = require("name", name)?;
        self.name = name.to_string();
        self.name_token = None;
        self.dirty = true;
        Ok(())
    }

    /// Editor folder label; purely organisational
    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    pub fn set_folder(&mut self, folder: Option<&str>) {
        self.folder = folder
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        self.dirty = true;
    }

    pub fn prefab_link(&self) -> Option<&PrefabInstanceLink> {
        self.base.as_ref()
    }

    pub fn is_prefab_instance(&self) -> bool {
        self.base.is_some()
    }

    /// Whether the entity was changed since it was loaded
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the entity was read from the document text
    pub fn is_from_text(&self) -> bool {
        self.from_text
    }

    pub fn components(&self) -> impl ExactSizeIterator<Item = &Component> {
        self.components.values()
    }

    /// Best match for a type name: exact tag, then class name, then
    /// substring
    pub fn component(&self, type_name: &str) -> Option<&Component> {
        self.best_match(type_name)
            .and_then(|key| self.components.get(&key))
    }

    /// Mutable access to a component; the entity is marked as modified
    pub fn component_mut(&mut self, type_name: &str) -> Option<&mut Component> {
        let key = self.best_match(type_name)?;
        self.dirty = true;
        self.components.get_mut(&key)
    }

    fn best_match(&self, type_name: &str) -> Option<String> {
        self.components
            .values()
            .filter_map(|c| c.matches(type_name).map(|rank| (rank, c.key())))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, key)| key.to_string())
    }

    pub fn has_component(&self, type_name: &str) -> bool {
        self.component(type_name).is_some()
    }

    /// Whether some component's tag matches exactly
    pub fn has_exact_component(&self, type_tag: &str) -> bool {
        self.components()
            .any(|c| c.matches(type_tag) == Some(TypeMatch::Exact))
    }

    /// Add a component; returns its key
    pub fn add_component(&mut self, component: Component) -> String {
        self.dirty = true;
        self.push_component(component)
    }

    fn push_component(&mut self, component: Component) -> String {
        let key = component.key().to_string();
        self.components.insert(key.clone(), component);
        key
    }

    /// Remove the best-matching component
    pub fn remove_component(&mut self, type_name: &str) -> Result<Component> {
        let key = self
            .best_match(type_name)
            .ok_or_else(|| StrideAssetError::not_found("Component", type_name))?;
        self.dirty = true;
        self.components
            .shift_remove(&key)
            .ok_or_else(|| StrideAssetError::not_found("Component", type_name))
    }

    pub fn transform(&self) -> Option<&Component> {
        self.components().find(|c| c.is_transform())
    }

    pub fn transform_mut(&mut self) -> Option<&mut Component> {
        let key = self.transform()?.key().to_string();
        self.dirty = true;
        self.components.get_mut(&key)
    }

    /// Id of the transform component, the target of `Children` references
    pub fn transform_id(&self) -> Option<&str> {
        self.transform().map(Component::id)
    }

    /// Entity references held by the transform's `Children` collection,
    /// as transform component ids
    pub fn child_transform_ids(&self) -> Vec<String> {
        self.transform()
            .map(|t| {
                t.properties()
                    .list_values(keys::CHILDREN)
                    .into_iter()
                    .filter_map(EntityRef::from_property)
                    .map(|r| r.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn position(&self) -> Option<Vector3> {
        self.transform()?.get(keys::POSITION)
    }

    pub fn rotation(&self) -> Option<Quaternion> {
        self.transform()?.get(keys::ROTATION)
    }

    pub fn scale(&self) -> Option<Vector3> {
        self.transform()?.get(keys::SCALE)
    }

    pub fn set_position(&mut self, position: Vector3) -> Result<()> {
        self.set_transform_value(keys::POSITION, position)
    }

    pub fn set_rotation(&mut self, rotation: Quaternion) -> Result<()> {
        self.set_transform_value(keys::ROTATION, rotation)
    }

    pub fn set_scale(&mut self, scale: Vector3) -> Result<()> {
        self.set_transform_value(keys::SCALE, scale)
    }

    fn set_transform_value<V: Into<stride_asset_core::Value>>(
        &mut self,
        key: &str,
        value: V,
    ) -> Result<()> {
        let id = self.id.clone();
        self.transform_mut()
            .ok_or_else(|| StrideAssetError::not_found("TransformComponent on entity", id))?
            .set(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity_has_transform() {
        let entity = Entity::new("Player").unwrap();
        assert!(entity.is_dirty());
        assert!(!entity.is_from_text());
        assert_eq!(entity.position(), Some(Vector3::ZERO));
        assert_eq!(entity.scale(), Some(Vector3::ONE));
        assert!(entity.child_transform_ids().is_empty());
        assert!(Entity::new("  ").is_err());
    }

    #[test]
    fn test_component_lookup_prefers_exact() {
        let mut entity = Entity::new("Camera").unwrap();
        entity.add_component(Component::new("Game.CameraControllerExtra,Game"));
        entity.add_component(Component::new("CameraComponent"));

        assert_eq!(entity.component("CameraComponent").unwrap().type_tag(), "CameraComponent");
        assert_eq!(
            entity.component("CameraControllerExtra").unwrap().type_tag(),
            "Game.CameraControllerExtra,Game"
        );
        // Substring matches fall back to the first candidate
        assert!(entity.component("camera").is_some());
        assert!(entity.component("Light").is_none());
    }

    #[test]
    fn test_remove_component() {
        let mut entity = Entity::new("Lamp").unwrap();
        entity.add_component(Component::new("LightComponent"));
        let removed = entity.remove_component("Light").unwrap();
        assert_eq!(removed.type_tag(), "LightComponent");
        assert!(entity.remove_component("Light").unwrap_err().is_not_found());
    }

    #[test]
    fn test_set_position_marks_dirty() {
        let mut entity = Entity::from_text(
            "0b7e6f50-0000-4000-8000-000000000002".to_string(),
            "'42'".to_string(),
            None,
            None,
            vec![Component::transform()],
        );
        assert_eq!(entity.name(), "42");
        assert_eq!(entity.name_token(), "'42'");
        assert!(!entity.is_dirty());

        entity.set_position(Vector3::new(10.0, 5.0, 0.0)).unwrap();
        assert!(entity.is_dirty());
        assert_eq!(entity.position(), Some(Vector3::new(10.0, 5.0, 0.0)));
    }
}
