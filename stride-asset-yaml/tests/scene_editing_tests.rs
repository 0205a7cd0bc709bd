//! Scene editing tests
//!
//! Load, edit and save a scene through the file system and check that
//! only the touched bytes change.

use std::fs;
use std::sync::Arc;
use stride_asset_yaml::{
    Placement, SceneDocument, ScriptMetadata, StrideAssetError, StrideDocument, ValidationMode,
    Vector3, load_script_catalog,
};
use tempfile::TempDir;

const PLAYER: &str = "10000000-0000-4000-8000-000000000001";
const WEAPON: &str = "10000000-0000-4000-8000-000000000002";
const CAMERA: &str = "10000000-0000-4000-8000-000000000003";

const SCENE: &str = "\
!SceneAsset
Id: 0a000000-0000-4000-8000-000000000000
SerializedVersion: {Stride: 3.1.0.1}
Tags: []
ChildrenIds: []
Offset: {X: 0.0, Y: 0.0, Z: 0.0}
Hierarchy:
    RootParts:
        - ref!! 10000000-0000-4000-8000-000000000001
        - ref!! 10000000-0000-4000-8000-000000000003
    Parts:
        -   Entity:
                Id: 10000000-0000-4000-8000-000000000001
                Name: Player
                Components:
                    a0000000000000000000000000000001: !TransformComponent
                        Id: 20000000-0000-4000-8000-000000000001
                        Position: {X: 0.0, Y: 0.0, Z: 0.0}
                        Rotation: {X: 0.0, Y: 0.0, Z: 0.0, W: 1.0}
                        Scale: {X: 1.0, Y: 1.0, Z: 1.0}
                        Children:
                            b0000000000000000000000000000001: ref!! 20000000-0000-4000-8000-000000000002
                    a0000000000000000000000000000002: !MyGame.PlayerController,MyGame
                        Id: 30000000-0000-4000-8000-000000000001
                        Speed: 5.0
                        Target: null
        -   Entity:
                Id: 10000000-0000-4000-8000-000000000002
                Name: Weapon
                Components:
                    a0000000000000000000000000000003: !TransformComponent
                        Id: 20000000-0000-4000-8000-000000000002
                        Position: {X: 0.5, Y: 1.0, Z: 0.0}
                        Rotation: {X: 0.0, Y: 0.0, Z: 0.0, W: 1.0}
                        Scale: {X: 1.0, Y: 1.0, Z: 1.0}
                        Children: {}
        -   Folder: Cameras
            Entity:
                Id: 10000000-0000-4000-8000-000000000003
                Name: Main Camera
                Components:
                    a0000000000000000000000000000004: !TransformComponent
                        Id: 20000000-0000-4000-8000-000000000003
                        Position: {X: 0.0, Y: 2.0, Z: -10.0}
                        Rotation: {X: 0.0, Y: 0.0, Z: 0.0, W: 1.0}
                        Scale: {X: 1.0, Y: 1.0, Z: 1.0}
                        Children: {}
                    a0000000000000000000000000000005: !CameraComponent
                        Id: 30000000-0000-4000-8000-000000000002
                        Projection: Perspective
                        VerticalFieldOfView: 45.0
";

fn camera_block() -> &'static str {
    let start = SCENE.find("        -   Folder: Cameras").unwrap();
    &SCENE[start..]
}

fn write_scene(dir: &TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("MainScene.sdscene");
    fs::write(&path, text).unwrap();
    path
}

fn changed_lines(before: &str, after: &str) -> Vec<usize> {
    let before: Vec<&str> = before.lines().collect();
    let after: Vec<&str> = after.lines().collect();
    assert_eq!(before.len(), after.len(), "line count changed");
    (0..before.len()).filter(|&i| before[i] != after[i]).collect()
}

#[test]
fn test_load_reads_hierarchy() {
    let scene = SceneDocument::parse_str(SCENE).unwrap();
    assert_eq!(scene.entity_count(), 3);
    assert_eq!(scene.root_ids(), [PLAYER, CAMERA]);

    let children: Vec<&str> = scene.children(PLAYER).iter().map(|e| e.id()).collect();
    assert_eq!(children, [WEAPON]);
    assert_eq!(scene.parent(WEAPON).unwrap().name(), "Player");

    let camera = scene.entity(CAMERA).unwrap();
    assert_eq!(camera.name(), "Main Camera");
    assert_eq!(camera.folder(), Some("Cameras"));
    assert_eq!(
        scene.get::<f32>(CAMERA, "CameraComponent", "VerticalFieldOfView"),
        Some(45.0)
    );
    assert_eq!(
        scene.get::<Vector3>(WEAPON, "Transform", "Position"),
        Some(Vector3::new(0.5, 1.0, 0.0))
    );
}

#[test]
fn test_unmodified_save_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let path = write_scene(&dir, SCENE);

    let mut scene = SceneDocument::load(&path).unwrap();
    // Reads alone never mark anything as modified
    let _ = scene.get::<f32>(PLAYER, "PlayerController", "Speed");
    assert!(!scene.is_modified());

    scene.save().unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), SCENE);
}

#[test]
fn test_position_edit_touches_one_line() {
    let dir = TempDir::new().unwrap();
    let path = write_scene(&dir, SCENE);

    let mut scene = SceneDocument::load(&path).unwrap();
    let player = scene.resolve_entity("Player").unwrap();
    scene
        .set(&player, "TransformComponent", "Position", Vector3::new(10.0, 5.0, 0.0))
        .unwrap();
    assert!(scene.is_modified());
    scene.save().unwrap();

    let saved = fs::read_to_string(&path).unwrap();
    assert_eq!(changed_lines(SCENE, &saved), vec![17]);
    assert_eq!(
        saved.lines().nth(17),
        Some("                        Position: {X: 10.0, Y: 5.0, Z: 0.0}")
    );

    // The document was reloaded from disk
    assert!(!scene.is_modified());
    assert_eq!(
        scene.entity(PLAYER).unwrap().position(),
        Some(Vector3::new(10.0, 5.0, 0.0))
    );
}

#[test]
fn test_script_property_edit() {
    let mut scene = SceneDocument::parse_str(SCENE).unwrap();
    scene.set(PLAYER, "PlayerController", "Speed", 7.5).unwrap();
    scene.set(PLAYER, "PlayerController", "Target", "Weapon").unwrap();

    let text = scene.to_yaml_string();
    assert_eq!(changed_lines(SCENE, &text), vec![24, 25]);
    assert!(text.contains("                        Speed: 7.5\n"));
    assert!(text.contains("                        Target: Weapon\n"));
}

#[test]
fn test_remove_entity_leaves_other_blocks_alone() {
    let mut scene = SceneDocument::parse_str(SCENE).unwrap();
    let removed = scene.remove_entity(WEAPON).unwrap();
    assert_eq!(removed.name(), "Weapon");

    let text = scene.to_yaml_string();
    assert!(!text.contains(WEAPON));
    assert!(!text.contains("20000000-0000-4000-8000-000000000002"));
    assert!(text.ends_with(camera_block()));

    let reread = SceneDocument::parse_str(&text).unwrap();
    assert_eq!(reread.entity_count(), 2);
    assert!(reread.children(PLAYER).is_empty());
    assert_eq!(reread.root_ids(), [PLAYER, CAMERA]);
}

#[test]
fn test_add_child_entity_and_save() {
    let dir = TempDir::new().unwrap();
    let path = write_scene(&dir, SCENE);

    let mut scene = SceneDocument::load(&path).unwrap();
    let shield = scene.create_entity("Shield", Placement::Parent(PLAYER)).unwrap();
    scene.add_component(&shield, "ModelComponent").unwrap();
    scene.save().unwrap();

    let saved = fs::read_to_string(&path).unwrap();
    assert!(saved.contains(camera_block().trim_end()));
    assert!(saved.contains(&format!("                Id: {}\n", shield)));

    let children: Vec<String> = scene
        .children(PLAYER)
        .iter()
        .map(|e| e.name().to_string())
        .collect();
    assert_eq!(children, ["Weapon", "Shield"]);
    assert!(scene.entity(&shield).unwrap().has_component("ModelComponent"));
    assert_eq!(scene.root_ids(), [PLAYER, CAMERA]);
}

#[test]
fn test_create_under_path_and_folder() {
    let mut scene = SceneDocument::parse_str(SCENE).unwrap();
    let light = scene
        .create_entity("Torch", Placement::Path("Player/Weapon"))
        .unwrap();
    let sun = scene.create_entity("Sun", Placement::Folder("Lighting")).unwrap();

    let reread = SceneDocument::parse_str(&scene.to_yaml_string()).unwrap();
    assert_eq!(reread.parent(&light).unwrap().id(), WEAPON);
    let ancestors: Vec<&str> = reread.ancestors(&light).iter().map(|e| e.name()).collect();
    assert_eq!(ancestors, ["Weapon", "Player"]);

    assert_eq!(reread.entity(&sun).unwrap().folder(), Some("Lighting"));
    assert_eq!(reread.root_ids(), [PLAYER, CAMERA, sun.as_str()]);
}

#[test]
fn test_reparent_to_root_rewrites_root_list() {
    let mut scene = SceneDocument::parse_str(SCENE).unwrap();
    scene.reparent(WEAPON, None).unwrap();

    let text = scene.to_yaml_string();
    assert!(text.contains(&format!(
        "    RootParts:\n        - ref!! {}\n        - ref!! {}\n        - ref!! {}\n",
        PLAYER, CAMERA, WEAPON
    )));

    let reread = SceneDocument::parse_str(&text).unwrap();
    assert!(reread.parent(WEAPON).is_none());
    assert!(reread.children(PLAYER).is_empty());
    assert!(reread.root_entities().iter().any(|e| e.id() == WEAPON));

    assert!(scene.reparent(PLAYER, Some(PLAYER)).is_err());
}

#[test]
fn test_unknown_entity_keys_survive_rerender() {
    let text = SCENE
        .replace(
            "                Name: Main Camera\n",
            "                Name: Main Camera\n                Flags: 3\n",
        )
        .replace(
            "        -   Folder: Cameras\n",
            "        -   Layer: {Index: 2}\n            Folder: Cameras\n",
        )
        + "            Extra: keep-me\n";
    let mut scene = SceneDocument::parse_str(&text).unwrap();
    assert_eq!(scene.to_yaml_string(), text);

    scene.rename_entity(CAMERA, "Overview Camera").unwrap();
    scene
        .set(CAMERA, "TransformComponent", "Position", Vector3::new(4.0, 2.0, -10.0))
        .unwrap();
    let saved = scene.to_yaml_string();

    let expected = text
        .replace("Name: Main Camera", "Name: Overview Camera")
        .replace("{X: 0.0, Y: 2.0, Z: -10.0}", "{X: 4.0, Y: 2.0, Z: -10.0}");
    assert_eq!(saved, expected);

    let reread = SceneDocument::parse_str(&saved).unwrap();
    let camera = reread.entity(CAMERA).unwrap();
    assert_eq!(camera.folder(), Some("Cameras"));
    assert_eq!(camera.entity_entries().len(), 1);
    assert_eq!(camera.part_entries().len(), 2);
}

#[test]
fn test_crlf_is_preserved() {
    let crlf = SCENE.replace('\n', "\r\n");
    let mut scene = SceneDocument::parse_str(&crlf).unwrap();
    assert_eq!(scene.to_yaml_string(), crlf);

    scene
        .set(WEAPON, "TransformComponent", "Scale", Vector3::new(2.0, 2.0, 2.0))
        .unwrap();
    scene.create_entity("Marker", Placement::Root).unwrap();

    let text = scene.to_yaml_string();
    assert!(text.contains("Scale: {X: 2.0, Y: 2.0, Z: 2.0}\r\n"));
    assert!(!text.replace("\r\n", "").contains('\n'));
}

#[test]
fn test_strict_mode_with_catalog_file() {
    let dir = TempDir::new().unwrap();
    let catalog_path = dir.path().join("scripts.yaml");
    fs::write(
        &catalog_path,
        "classes:\n  - name: PlayerController\n    namespace: MyGame\n    assembly: MyGame\n    properties:\n      Speed: float\n      Target: Entity\n",
    )
    .unwrap();
    let path = write_scene(&dir, SCENE);

    let catalog: Arc<dyn ScriptMetadata> = Arc::new(load_script_catalog(&catalog_path).unwrap());
    let mut scene = SceneDocument::load(&path)
        .unwrap()
        .with_validation(ValidationMode::Strict, Some(catalog));

    let err = scene
        .set(PLAYER, "PlayerController", "Speed", "fast")
        .unwrap_err();
    match err {
        StrideAssetError::Validation { property, expected, .. } => {
            assert_eq!(property, "Speed");
            assert_eq!(expected, "float");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(scene.set(PLAYER, "PlayerController", "Sped", 1.0).is_err());
    assert!(!scene.is_modified());

    scene.set(PLAYER, "PlayerController", "Speed", 7.5).unwrap();
    scene.save().unwrap();

    // Settings survive the reload after saving
    assert_eq!(scene.validation_mode(), ValidationMode::Strict);
    assert!(scene.set(PLAYER, "PlayerController", "Speed", true).is_err());
    assert_eq!(scene.get::<f32>(PLAYER, "PlayerController", "Speed"), Some(7.5));

    // Script components added by class name get their full tag
    let spawn = scene.create_entity("Spawn", Placement::Root).unwrap();
    scene.add_component(&spawn, "PlayerController").unwrap();
    assert_eq!(
        scene
            .entity(&spawn)
            .unwrap()
            .component("PlayerController")
            .unwrap()
            .type_tag(),
        "MyGame.PlayerController,MyGame"
    );
}
