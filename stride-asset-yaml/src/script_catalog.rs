//! Script metadata files
//!
//! Strict mode needs declared property types of user scripts. When the
//! introspection step is not available, the same information can be
//! supplied as a YAML file:
//!
//! ```yaml
//! classes:
//!   - name: PlayerController
//!     namespace: MyGame
//!     assembly: MyGame
//!     properties:
//!       Speed: float
//!       Target: Entity
//! ```

use std::path::Path;
use stride_asset_core::{Result, ScriptCatalog, StrideAssetError};
use tracing::info;

use crate::document::read_document_text;

/// Parse a script catalog from YAML text
pub fn parse_script_catalog(text: &str) -> Result<ScriptCatalog> {
    let mut catalog: ScriptCatalog = serde_yaml::from_str(text)
        .map_err(|e| StrideAssetError::format(format!("invalid script metadata: {}", e)))?;
    catalog.reindex();
    Ok(catalog)
}

/// Load a script catalog from a YAML file
pub fn load_script_catalog<P: AsRef<Path>>(path: P) -> Result<ScriptCatalog> {
    let path = path.as_ref();
    let catalog = parse_script_catalog(&read_document_text(path)?)?;
    info!(path = %path.display(), classes = catalog.len(), "loaded script metadata");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_asset_core::ScriptMetadata;

    #[test]
    fn test_parse_catalog() {
        let catalog = parse_script_catalog(
            "classes:\n  - name: PlayerController\n    namespace: MyGame\n    assembly: MyGame\n    properties:\n      Speed: float\n  - name: Spinner\n    assembly: Game\n",
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);

        let player = catalog.resolve("MyGame.PlayerController").unwrap();
        assert_eq!(player.full_type_tag(), "MyGame.PlayerController,MyGame");
        assert_eq!(player.properties.get("Speed").map(String::as_str), Some("float"));
        assert_eq!(catalog.resolve("Spinner").unwrap().full_type_tag(), ".Spinner,Game");
    }

    #[test]
    fn test_invalid_catalog() {
        let err = parse_script_catalog("classes: 5").unwrap_err();
        assert!(matches!(err, StrideAssetError::Format(_)));
    }
}
