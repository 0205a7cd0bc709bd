//! Structural editing and hierarchy queries
//!
//! Parenting goes through the transform component: a parent's
//! `Children` collection holds `ref!! <child transform id>` entries.
//! Folders are only labels and never affect the hierarchy.

use crate::component::Component;
use crate::document::SceneDocument;
use crate::entity::Entity;
use std::collections::HashSet;
use stride_asset_core::constants::keys;
use stride_asset_core::{
    EntityRef, FromProperty, PropertyValue, Result, StrideAssetError, ValidationMode, Value,
    coerce_to_declared, require, resolve_type_tag, validate_property,
};
use tracing::debug;

/// Where a new entity goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement<'a> {
    /// Appended to the root list
    Root,
    /// A root entity with a folder label
    Folder(&'a str),
    /// Child of an existing entity, by id
    Parent(&'a str),
    /// Child of the entity at a `/`-separated name path; missing path
    /// segments are created as empty entities
    Path(&'a str),
}

impl SceneDocument {
    /// Find an entity by id, falling back to the first entity with that name
    pub fn resolve_entity(&self, id_or_name: &str) -> Result<String> {
        let key = require("entity", id_or_name)?.trim();
        if self.entities.contains_key(key) {
            return Ok(key.to_string());
        }
        self.find_entity_by_name(key)
            .map(|e| e.id().to_string())
            .ok_or_else(|| StrideAssetError::not_found("Entity", key))
    }

    /// First entity with the given name
    pub fn find_entity_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.values().find(|e| e.name() == name)
    }

    /// Every entity with the given name, in document order
    pub fn find_entities_by_name(&self, name: &str) -> Vec<&Entity> {
        self.entities.values().filter(|e| e.name() == name).collect()
    }

    pub fn entities_in_folder(&self, folder: &str) -> Vec<&Entity> {
        self.entities
            .values()
            .filter(|e| e.folder() == Some(folder))
            .collect()
    }

    /// Entity owning the given transform component
    pub fn entity_by_transform_id(&self, transform_id: &str) -> Option<&Entity> {
        self.entities
            .values()
            .find(|e| e.transform_id() == Some(transform_id))
    }

    /// Create an entity with a default transform; returns its id
    pub fn create_entity(&mut self, name: &str, placement: Placement<'_>) -> Result<String> {
        let mut entity = Entity::new(name)?;
        let id = entity.id().to_string();

        match placement {
            Placement::Root => {
                self.entities.insert(id.clone(), entity);
                self.root_ids.push(id.clone());
            }
            Placement::Folder(folder) => {
                entity.set_folder(Some(require("folder", folder)?));
                self.entities.insert(id.clone(), entity);
                self.root_ids.push(id.clone());
            }
            Placement::Parent(parent) => {
                self.require_entity(parent)?;
                self.entities.insert(id.clone(), entity);
                self.attach_child(parent, &id)?;
            }
            Placement::Path(path) => {
                let parent = self.ensure_path(path)?;
                self.entities.insert(id.clone(), entity);
                match parent {
                    Some(parent) => self.attach_child(&parent, &id)?,
                    None => self.root_ids.push(id.clone()),
                }
            }
        }

        debug!(id = %id, name, "created entity");
        Ok(id)
    }

    /// Resolve a `/`-separated path of entity names, creating missing
    /// segments; returns the last entity's id
    fn ensure_path(&mut self, path: &str) -> Result<Option<String>> {
        let mut parent: Option<String> = None;
        for segment in path.split('/').map(str::trim).filter(|s| !s.is_empty()) {
            let existing = match &parent {
                Some(parent) => self
                    .children(parent)
                    .into_iter()
                    .find(|e| e.name() == segment)
                    .map(|e| e.id().to_string()),
                None => self
                    .root_entities()
                    .into_iter()
                    .find(|e| e.name() == segment)
                    .map(|e| e.id().to_string()),
            };
            let next = match existing {
                Some(id) => id,
                None => {
                    let placement = match &parent {
                        Some(parent) => Placement::Parent(parent),
                        None => Placement::Root,
                    };
                    self.create_entity(segment, placement)?
                }
            };
            parent = Some(next);
        }
        Ok(parent)
    }

    /// Remove an entity and every reference to it. Its children are left
    /// in place, unreferenced.
    pub fn remove_entity(&mut self, id: &str) -> Result<Entity> {
        let removed = self
            .entities
            .shift_remove(id)
            .ok_or_else(|| StrideAssetError::not_found("Entity", id))?;

        self.root_ids.retain(|root| root != id);
        if let Some(transform_id) = removed.transform_id() {
            for entity in self.entities.values_mut() {
                detach_transform(entity, transform_id);
            }
        }
        if removed.is_from_text() {
            self.pending_removals.push(id.to_string());
        }
        debug!(id, "removed entity");
        Ok(removed)
    }

    /// Add a component by type name; script class names are expanded to
    /// their full tag through the metadata provider. Returns the key.
    pub fn add_component(&mut self, entity_id: &str, type_name: &str) -> Result<String> {
        let type_name = require("type", type_name)?.trim();
        let type_tag = resolve_type_tag(self.metadata.as_deref(), type_name);
        let entity = self.require_entity_mut(entity_id)?;
        Ok(entity.add_component(Component::new(type_tag)))
    }

    pub fn remove_component(&mut self, entity_id: &str, type_name: &str) -> Result<Component> {
        self.require_entity_mut(entity_id)?
            .remove_component(type_name)
    }

    pub fn rename_entity(&mut self, entity_id: &str, name: &str) -> Result<()> {
        self.require_entity_mut(entity_id)?.set_name(name)
    }

    pub fn set_entity_folder(&mut self, entity_id: &str, folder: Option<&str>) -> Result<()> {
        self.require_entity_mut(entity_id)?.set_folder(folder);
        Ok(())
    }

    /// Direct children, in the order of the parent's `Children` collection
    pub fn children(&self, entity_id: &str) -> Vec<&Entity> {
        self.entities
            .get(entity_id)
            .map(|entity| {
                entity
                    .child_transform_ids()
                    .iter()
                    .filter_map(|tid| self.entity_by_transform_id(tid))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The entity whose `Children` reference this entity's transform
    pub fn parent(&self, entity_id: &str) -> Option<&Entity> {
        let transform_id = self.entities.get(entity_id)?.transform_id()?;
        self.entities
            .values()
            .find(|e| e.child_transform_ids().iter().any(|t| t == transform_id))
    }

    /// All entities below this one, depth first. Each entity is visited
    /// once even when the references form a cycle.
    pub fn descendants(&self, entity_id: &str) -> Vec<&Entity> {
        let mut visited = HashSet::from([entity_id.to_string()]);
        let mut out = Vec::new();
        self.collect_descendants(entity_id, &mut visited, &mut out);
        out
    }

    fn collect_descendants<'a>(
        &'a self,
        entity_id: &str,
        visited: &mut HashSet<String>,
        out: &mut Vec<&'a Entity>,
    ) {
        for child in self.children(entity_id) {
            if visited.insert(child.id().to_string()) {
                out.push(child);
                self.collect_descendants(child.id(), visited, out);
            }
        }
    }

    /// Parent, grandparent and so on up to a root
    pub fn ancestors(&self, entity_id: &str) -> Vec<&Entity> {
        let mut visited = HashSet::from([entity_id.to_string()]);
        let mut out = Vec::new();
        let mut current = self.parent(entity_id);
        while let Some(parent) = current {
            if !visited.insert(parent.id().to_string()) {
                break;
            }
            out.push(parent);
            current = self.parent(parent.id());
        }
        out
    }

    /// Move an entity under another entity, or to the root list with `None`
    pub fn reparent(&mut self, entity_id: &str, new_parent: Option<&str>) -> Result<()> {
        let transform_id = self
            .require_entity(entity_id)?
            .transform_id()
            .ok_or_else(|| StrideAssetError::not_found("TransformComponent on entity", entity_id))?
            .to_string();

        if let Some(parent) = new_parent {
            self.require_entity(parent)?;
            if parent == entity_id || self.descendants(entity_id).iter().any(|e| e.id() == parent)
            {
                return Err(StrideAssetError::structure(format!(
                    "cannot move '{}' under its own descendant '{}'",
                    entity_id, parent
                )));
            }
        }

        for entity in self.entities.values_mut() {
            detach_transform(entity, &transform_id);
        }
        self.root_ids.retain(|root| root != entity_id);

        match new_parent {
            Some(parent) => self.attach_child(parent, entity_id),
            None => {
                self.root_ids.push(entity_id.to_string());
                Ok(())
            }
        }
    }

    fn attach_child(&mut self, parent_id: &str, child_id: &str) -> Result<()> {
        let transform_id = self
            .require_entity(child_id)?
            .transform_id()
            .ok_or_else(|| StrideAssetError::not_found("TransformComponent on entity", child_id))?
            .to_string();
        self.require_entity_mut(parent_id)?
            .transform_mut()
            .ok_or_else(|| StrideAssetError::not_found("TransformComponent on entity", parent_id))?
            .append_to_list(keys::CHILDREN, EntityRef::new(transform_id))?;
        Ok(())
    }

    /// Read a component property
    pub fn get<T: FromProperty>(&self, entity_id: &str, component: &str, path: &str) -> Option<T> {
        self.entities.get(entity_id)?.component(component)?.get(path)
    }

    /// Write a component property. With metadata loaded, single-segment
    /// writes are narrowed to the declared type; in strict mode they are
    /// also checked against it.
    pub fn set<V: Into<Value>>(
        &mut self,
        entity_id: &str,
        component: &str,
        path: &str,
        value: V,
    ) -> Result<()> {
        let mut value = value.into();
        let path = require("path", path)?.trim();
        let type_tag = self
            .require_entity(entity_id)?
            .component(component)
            .ok_or_else(|| StrideAssetError::not_found("Component", component))?
            .type_tag()
            .to_string();

        if let Some(metadata) = self.metadata.as_deref()
            && !path.contains('.')
        {
            value = coerce_to_declared(metadata, &type_tag, path, value);
        }
        if self.validation == ValidationMode::Strict && !path.contains('.') {
            match self.metadata.as_deref() {
                Some(metadata) => validate_property(metadata, &type_tag, path, &value)?,
                None => debug!(path, "strict mode without metadata, skipping validation"),
            }
        }

        self.component_mut(entity_id, component)?.set(path, value)
    }

    fn component_mut(&mut self, entity_id: &str, component: &str) -> Result<&mut Component> {
        self.require_entity_mut(entity_id)?
            .component_mut(component)
            .ok_or_else(|| StrideAssetError::not_found("Component", component))
    }

    /// Append to a GUID-keyed list on a component; returns the element key
    pub fn append_to_list<V: Into<Value>>(
        &mut self,
        entity_id: &str,
        component: &str,
        path: &str,
        value: V,
    ) -> Result<String> {
        self.component_mut(entity_id, component)?
            .append_to_list(path, value)
    }

    /// Insert or update a `guid~key` dictionary entry on a component
    pub fn set_dictionary_entry<V: Into<Value>>(
        &mut self,
        entity_id: &str,
        component: &str,
        path: &str,
        key: &str,
        value: V,
    ) -> Result<String> {
        self.component_mut(entity_id, component)?
            .set_dictionary_entry(path, key, value)
    }

    /// Replace a list on a component; returns the fresh element keys
    pub fn replace_list<I, V>(
        &mut self,
        entity_id: &str,
        component: &str,
        path: &str,
        values: I,
    ) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.component_mut(entity_id, component)?
            .replace_list(path, values)
    }
}

/// Drop every `Children` reference to a transform; the entity is only
/// marked modified when something was removed
fn detach_transform(entity: &mut Entity, transform_id: &str) {
    let refers = |value: &PropertyValue| {
        EntityRef::from_property(value).is_some_and(|r| r.id == transform_id)
    };
    if !entity.child_transform_ids().iter().any(|t| t == transform_id) {
        return;
    }
    if let Some(transform) = entity.transform_mut() {
        transform.edit(|properties| match properties.get_mut(keys::CHILDREN) {
            Some(PropertyValue::Map(children)) => children.retain(|_, v| !refers(&*v)),
            Some(PropertyValue::List(children)) => children.retain(|v| !refers(v)),
            _ => {}
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_asset_core::{ScriptCatalog, ScriptClass, ScriptMetadata, parse_scalar};
    use std::sync::Arc;

    fn chain() -> (SceneDocument, String, String, String) {
        let mut doc = SceneDocument::new_scene();
        let a = doc.create_entity("A", Placement::Root).unwrap();
        let b = doc.create_entity("B", Placement::Parent(&a)).unwrap();
        let c = doc.create_entity("C", Placement::Parent(&b)).unwrap();
        (doc, a, b, c)
    }

    fn ids(entities: Vec<&Entity>) -> Vec<String> {
        entities.into_iter().map(|e| e.id().to_string()).collect()
    }

    #[test]
    fn test_hierarchy_chain() {
        let (doc, a, b, c) = chain();
        assert_eq!(ids(doc.children(&a)), vec![b.clone()]);
        assert_eq!(doc.parent(&b).map(Entity::id), Some(a.as_str()));
        assert_eq!(ids(doc.descendants(&a)), vec![b.clone(), c.clone()]);
        assert_eq!(ids(doc.ancestors(&c)), vec![b.clone(), a.clone()]);
        assert_eq!(doc.root_ids(), [a.as_str()]);
        assert!(doc.parent(&a).is_none());
    }

    #[test]
    fn test_remove_middle_keeps_grandchild() {
        let (mut doc, a, b, c) = chain();
        doc.remove_entity(&b).unwrap();
        assert!(doc.descendants(&a).is_empty());
        assert!(doc.entity(&c).is_some());
        assert!(doc.parent(&c).is_none());
        // Never part of the loaded text, so nothing to cut out
        assert!(doc.pending_removals().is_empty());
        assert!(doc.remove_entity(&b).unwrap_err().is_not_found());
    }

    #[test]
    fn test_path_placement_creates_segments() {
        let mut doc = SceneDocument::new_scene();
        let lamp = doc
            .create_entity("Lamp", Placement::Path("Level/Props"))
            .unwrap();
        let chair = doc
            .create_entity("Chair", Placement::Path("Level/Props"))
            .unwrap();

        let level = doc.find_entity_by_name("Level").unwrap().id().to_string();
        let props = doc.find_entity_by_name("Props").unwrap().id().to_string();
        assert_eq!(doc.root_ids(), [level.as_str()]);
        assert_eq!(ids(doc.children(&props)), vec![lamp, chair]);
        assert_eq!(doc.entity_count(), 4);
        assert_eq!(doc.parent(&props).map(Entity::id), Some(level.as_str()));
    }

    #[test]
    fn test_folder_is_a_label_only() {
        let mut doc = SceneDocument::new_scene();
        let id = doc
            .create_entity("Tree", Placement::Folder("Environment"))
            .unwrap();
        assert_eq!(ids(doc.entities_in_folder("Environment")), vec![id.clone()]);
        assert!(doc.parent(&id).is_none());
        assert_eq!(doc.root_ids(), [id.as_str()]);
        doc.set_entity_folder(&id, None).unwrap();
        assert!(doc.entities_in_folder("Environment").is_empty());
    }

    #[test]
    fn test_reparent_and_cycle_refusal() {
        let (mut doc, a, b, c) = chain();
        assert!(doc.reparent(&a, Some(&c)).is_err());
        assert!(doc.reparent(&a, Some(&a)).is_err());

        doc.reparent(&c, None).unwrap();
        assert!(doc.root_ids().contains(&c));
        assert!(doc.children(&b).is_empty());

        doc.reparent(&c, Some(&a)).unwrap();
        assert_eq!(ids(doc.children(&a)), vec![b.clone(), c.clone()]);
        assert!(!doc.root_ids().contains(&c));
    }

    #[test]
    fn test_descendants_survive_reference_cycle() {
        let (mut doc, a, _b, c) = chain();
        // Corrupt the hierarchy: C lists A as a child
        let a_transform = doc.entity(&a).unwrap().transform_id().unwrap().to_string();
        doc.entity_mut(&c)
            .unwrap()
            .transform_mut()
            .unwrap()
            .append_to_list(keys::CHILDREN, EntityRef::new(a_transform))
            .unwrap();
        assert_eq!(doc.descendants(&a).len(), 2);
        assert_eq!(doc.ancestors(&a).len(), 2);
    }

    #[test]
    fn test_strict_mode_validation() {
        let catalog = ScriptCatalog::from_classes([ScriptClass::new(
            Some("MyGame"),
            "PlayerController",
            "MyGame",
        )
        .with_property("Speed", "float")
        .with_property("Lives", "int")]);
        let metadata: Arc<dyn ScriptMetadata> = Arc::new(catalog);
        let mut doc =
            SceneDocument::new_scene().with_validation(ValidationMode::Strict, Some(metadata));
        let player = doc.create_entity("Player", Placement::Root).unwrap();
        let key = doc.add_component(&player, "PlayerController").unwrap();
        assert_eq!(key.len(), 32);
        assert_eq!(
            doc.entity(&player)
                .unwrap()
                .component("PlayerController")
                .unwrap()
                .type_tag(),
            "MyGame.PlayerController,MyGame"
        );

        let err = doc
            .set(&player, "PlayerController", "Speed", "fast")
            .unwrap_err();
        assert!(matches!(err, StrideAssetError::Validation { .. }));
        assert!(doc.set(&player, "PlayerController", "Sped", 1.0).is_err());
        doc.set(&player, "PlayerController", "Speed", 5.5).unwrap();
        assert_eq!(doc.get::<f32>(&player, "PlayerController", "Speed"), Some(5.5));

        // Numeric text reads as a float; declared ints are written back as ints
        doc.set(&player, "PlayerController", "Lives", parse_scalar("3")).unwrap();
        doc.set(&player, "PlayerController", "Speed", parse_scalar("100")).unwrap();
        let lives = doc.get::<String>(&player, "PlayerController", "Lives");
        assert_eq!(lives.as_deref(), Some("3"));
        let speed = doc.get::<String>(&player, "PlayerController", "Speed");
        assert_eq!(speed.as_deref(), Some("100.0"));

        // Loose mode lets anything through
        doc.set_validation_mode(ValidationMode::Loose);
        doc.set(&player, "PlayerController", "Anything", "goes").unwrap();
    }

    #[test]
    fn test_collection_helpers() {
        let mut doc = SceneDocument::new_scene();
        let id = doc.create_entity("Bag", Placement::Root).unwrap();
        doc.add_component(&id, "Game.Inventory,Game").unwrap();

        let first = doc.append_to_list(&id, "Inventory", "Items", "Sword").unwrap();
        let second = doc.append_to_list(&id, "Inventory", "Items", "Shield").unwrap();
        assert_ne!(first, second);
        doc.set_dictionary_entry(&id, "Inventory", "Counts", "Arrows", 20)
            .unwrap();
        let keys = doc
            .replace_list(&id, "Inventory", "Items", ["Bow"])
            .unwrap();
        assert_eq!(keys.len(), 1);

        let items: Vec<String> = doc.get(&id, "Inventory", "Items").unwrap();
        assert_eq!(items, vec!["Bow".to_string()]);
        let component = doc.entity(&id).unwrap().component("Inventory").unwrap();
        let counts = component.properties().dictionary_entries("Counts");
        assert_eq!(counts[0].0, "Arrows");
    }

    #[test]
    fn test_resolve_entity() {
        let (doc, a, _, _) = chain();
        assert_eq!(doc.resolve_entity("A").unwrap(), a);
        assert_eq!(doc.resolve_entity(&a).unwrap(), a);
        assert!(doc.resolve_entity("Z").unwrap_err().is_not_found());
        assert!(doc.resolve_entity(" ").is_err());
    }
}
