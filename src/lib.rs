//! Stride Asset Editor
//!
//! Surgical, minimal-diff editing of Stride scenes, prefabs and flat asset
//! files. Only the parts of a document that were touched are rewritten on
//! save, so version-control diffs stay small.
//!
//! # Examples
//!
//! ```rust,no_run
//! use stride_asset::{SceneDocument, StrideDocument, Vector3};
//! use stride_asset::project::ProjectIndex;
//!
//! let index = ProjectIndex::scan("MyGame")?;
//! if let Some(scene) = index.find_by_name("MainScene", Some("SceneAsset")) {
//!     let mut doc = SceneDocument::load(&scene.absolute_path)?;
//!     let player = doc.resolve_entity("Player")?;
//!     doc.set(&player, "TransformComponent", "Position", Vector3::new(10.0, 5.0, 0.0))?;
//!     doc.save()?;
//! }
//!
//! # Ok::<(), stride_asset::StrideAssetError>(())
//! ```

// Re-export from core and YAML crates
pub use stride_asset_core::{
    AssetRef, EntityRef, FromProperty, LineEnding, PropertyMap, PropertyValue, Quaternion,
    Result, ScriptCatalog, ScriptClass, ScriptMetadata, StrideAssetError, ValidationMode, Value,
    Vector3, constants::*, format_value, parse_scalar,
};

pub use stride_asset_yaml::{
    AssetDocument, BlockWriter, Component, DocumentKind, Entity, Placement, PrefabInstanceLink,
    SceneDocument, StrideDocument, load_script_catalog,
};

/// Index of the asset files in a project directory
pub mod project {
    use crate::{AssetRef, Result, StrideAssetError};
    use globset::Glob;
    use std::fs::File;
    use std::io::{BufRead, BufReader};
    use std::path::{Path, PathBuf};
    use stride_asset_core::constants::keys;
    use tracing::{debug, warn};

    /// Directories that never hold project assets
    const SKIPPED_DIRECTORIES: &[&str] = &["bin", "obj", ".git", ".vs"];

    /// Stride asset files all use an `.sd*` extension
    const ASSET_EXTENSION_PREFIX: &str = "sd";

    /// How far into a file the header and `Id:` line are looked for
    const HEADER_SCAN_LINES: usize = 32;

    /// Where an asset lives and what it is
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct AssetIdentity {
        pub id: String,
        /// File name without extension
        pub name: String,
        /// Path relative to the project root, with forward slashes
        pub relative_path: String,
        pub absolute_path: PathBuf,
        /// Header tag without the `!`, e.g. `MaterialAsset`
        pub type_tag: String,
    }

    impl AssetIdentity {
        /// `<guid>:<path>` reference as written into other assets; the path
        /// has no extension
        pub fn to_asset_ref(&self) -> AssetRef {
            let path = self
                .relative_path
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(&self.relative_path);
            AssetRef::new(self.id.clone(), path)
        }

        /// Match a type filter: the header tag with or without its `Asset`
        /// suffix, or the file extension
        pub fn matches_type(&self, filter: &str) -> bool {
            let filter = filter.trim().trim_start_matches('!');
            let short = self.type_tag.strip_suffix("Asset").unwrap_or(&self.type_tag);
            let extension = self
                .absolute_path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            self.type_tag.eq_ignore_ascii_case(filter)
                || short.eq_ignore_ascii_case(filter)
                || extension.eq_ignore_ascii_case(filter.trim_start_matches('.'))
        }
    }

    /// Asset files found under a project root
    #[derive(Debug, Clone)]
    pub struct ProjectIndex {
        root: PathBuf,
        assets: Vec<AssetIdentity>,
    }

    impl ProjectIndex {
        /// Walk a project directory and index every asset file
        pub fn scan<P: AsRef<Path>>(root: P) -> Result<Self> {
            let mut index = Self {
                root: root.as_ref().to_path_buf(),
                assets: Vec::new(),
            };
            index.rescan()?;
            Ok(index)
        }

        /// Re-read the whole directory tree
        pub fn rescan(&mut self) -> Result<()> {
            if !self.root.is_dir() {
                return Err(StrideAssetError::not_found(
                    "Directory",
                    self.root.display().to_string(),
                ));
            }

            let mut assets = Vec::new();
            traverse_directory(&self.root, &self.root, &mut assets)?;
            assets.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
            debug!(root = %self.root.display(), assets = assets.len(), "indexed project");
            self.assets = assets;
            Ok(())
        }

        pub fn root(&self) -> &Path {
            &self.root
        }

        pub fn assets(&self) -> &[AssetIdentity] {
            &self.assets
        }

        pub fn len(&self) -> usize {
            self.assets.len()
        }

        pub fn is_empty(&self) -> bool {
            self.assets.is_empty()
        }

        /// First asset with this file name, optionally of one type
        pub fn find_by_name(&self, name: &str, type_filter: Option<&str>) -> Option<&AssetIdentity> {
            self.find_all_by_name(name, type_filter).into_iter().next()
        }

        pub fn find_all_by_name(&self, name: &str, type_filter: Option<&str>) -> Vec<&AssetIdentity> {
            let name = name.trim();
            self.assets
                .iter()
                .filter(|a| a.name == name)
                .filter(|a| type_filter.is_none_or(|filter| a.matches_type(filter)))
                .collect()
        }

        /// Assets whose relative path matches a glob, e.g. `Materials/**/*.sdmat`
        pub fn find_by_pattern(&self, pattern: &str) -> Result<Vec<&AssetIdentity>> {
            let matcher = Glob::new(pattern.trim())
                .map_err(|e| StrideAssetError::pattern(format!("'{}': {}", pattern, e)))?
                .compile_matcher();
            Ok(self
                .assets
                .iter()
                .filter(|a| matcher.is_match(&a.relative_path))
                .collect())
        }

        pub fn find_by_id(&self, id: &str) -> Option<&AssetIdentity> {
            let id = id.trim();
            self.assets.iter().find(|a| a.id.eq_ignore_ascii_case(id))
        }
    }

    /// Recursively walk a directory, indexing asset files
    fn traverse_directory(root: &Path, dir: &Path, assets: &mut Vec<AssetIdentity>) -> Result<()> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            StrideAssetError::format(format!("Failed to read directory {:?}: {}", dir, e))
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                StrideAssetError::format(format!("Failed to read directory entry: {}", e))
            })?;
            let path = entry.path();

            if path.is_dir() {
                let skipped = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| SKIPPED_DIRECTORIES.contains(&n));
                if !skipped {
                    traverse_directory(root, &path, assets)?;
                }
            } else if is_asset_file(&path) {
                match read_identity(root, &path) {
                    Ok(Some(identity)) => assets.push(identity),
                    Ok(None) => debug!(path = %path.display(), "no asset header, skipping"),
                    Err(e) => warn!(path = %path.display(), error = %e, "failed to index asset"),
                }
            }
        }

        Ok(())
    }

    fn is_asset_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                e.len() > ASSET_EXTENSION_PREFIX.len() && e.starts_with(ASSET_EXTENSION_PREFIX)
            })
    }

    /// Read the type header and top-level `Id:` of an asset file
    fn read_identity(root: &Path, path: &Path) -> Result<Option<AssetIdentity>> {
        let reader = BufReader::new(File::open(path)?);
        let id_prefix = format!("{}:", keys::ID);

        let mut type_tag = None;
        let mut id = None;
        for line in reader.lines().take(HEADER_SCAN_LINES) {
            let line = line?;
            let line = line.trim_end();
            if type_tag.is_none() && line.starts_with('!') {
                type_tag = Some(line.trim_start_matches('!').to_string());
            } else if let Some(value) = line.strip_prefix(&id_prefix) {
                id = Some(value.trim().to_string());
                break;
            }
        }

        let (Some(type_tag), Some(id)) = (type_tag, id) else {
            return Ok(None);
        };
        let relative = path.strip_prefix(root).unwrap_or(path);
        Ok(Some(AssetIdentity {
            id,
            name: path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string(),
            relative_path: relative.to_string_lossy().replace('\\', "/"),
            absolute_path: path.to_path_buf(),
            type_tag,
        }))
    }
}
