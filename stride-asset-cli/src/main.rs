//! Stride Asset CLI
//!
//! Command-line interface for inspecting and batch editing Stride scenes,
//! prefabs and assets.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stride_asset::project::ProjectIndex;
use stride_asset::{
    AssetDocument, BlockWriter, DocumentKind, Placement, PropertyValue, SceneDocument,
    ScriptMetadata, StrideDocument, ValidationMode, Value, load_script_catalog, parse_scalar,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stride-asset")]
#[command(about = "Surgical editing of Stride scenes, prefabs and assets")]
#[command(version)]
struct Cli {
    /// Validate script property writes against the metadata file
    #[arg(long, global = true)]
    strict: bool,

    /// Script metadata file used by strict mode and component tags
    #[arg(long, global = true)]
    metadata: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the entity tree of a scene or the entries of an asset
    Inspect {
        /// Input file path
        input: PathBuf,
    },

    /// Read a property
    Get {
        /// Input file path
        input: PathBuf,

        /// Dotted property path
        path: String,

        /// Entity id or name (scenes and prefabs)
        #[arg(short, long)]
        entity: Option<String>,

        /// Component type name (scenes and prefabs)
        #[arg(short, long)]
        component: Option<String>,
    },

    /// Write a property and save the file
    Set {
        /// Input file path
        input: PathBuf,

        /// Dotted property path
        path: String,

        /// New value, e.g. `7.5`, `true`, `{X: 1.0, Y: 0.0, Z: 0.0}`
        value: String,

        /// Entity id or name (scenes and prefabs)
        #[arg(short, long)]
        entity: Option<String>,

        /// Component type name (scenes and prefabs)
        #[arg(short, long)]
        component: Option<String>,
    },

    /// Create an entity and save the file
    AddEntity {
        /// Scene or prefab file path
        input: PathBuf,

        /// Name of the new entity
        name: String,

        /// Parent entity id or name, or a `/`-separated name path
        #[arg(long, conflicts_with = "folder")]
        parent: Option<String>,

        /// Folder label for a root entity
        #[arg(long)]
        folder: Option<String>,

        /// Components to add besides the transform
        #[arg(long = "component")]
        components: Vec<String>,
    },

    /// Remove an entity and save the file
    RemoveEntity {
        /// Scene or prefab file path
        input: PathBuf,

        /// Entity id or name
        entity: String,
    },

    /// Search a project directory for assets
    Find {
        /// Project root directory
        root: PathBuf,

        /// File name without extension
        #[arg(long)]
        name: Option<String>,

        /// Asset type filter, e.g. `MaterialAsset` or `sdmat`
        #[arg(long = "type")]
        type_filter: Option<String>,

        /// Glob over project-relative paths
        #[arg(long, conflicts_with_all = ["name", "id"])]
        pattern: Option<String>,

        /// Asset id
        #[arg(long, conflicts_with = "name")]
        id: Option<String>,
    },
}

/// Validation settings shared by every command
struct Settings {
    mode: ValidationMode,
    metadata: Option<Arc<dyn ScriptMetadata>>,
}

impl Settings {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let metadata = match &cli.metadata {
            Some(path) => {
                let catalog = load_script_catalog(path)
                    .with_context(|| format!("Failed to load metadata {}", path.display()))?;
                Some(Arc::new(catalog) as Arc<dyn ScriptMetadata>)
            }
            None => None,
        };
        if cli.strict && metadata.is_none() {
            tracing::warn!("--strict without --metadata, script properties are not validated");
        }
        Ok(Self {
            mode: if cli.strict {
                ValidationMode::Strict
            } else {
                ValidationMode::Loose
            },
            metadata,
        })
    }
}

/// A document opened by the CLI
enum Opened {
    Scene(SceneDocument),
    Asset(AssetDocument),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let settings = Settings::from_cli(&cli)?;

    match cli.command {
        Commands::Inspect { input } => inspect_command(&input, &settings),
        Commands::Get {
            input,
            path,
            entity,
            component,
        } => get_command(&input, &path, entity.as_deref(), component.as_deref(), &settings),
        Commands::Set {
            input,
            path,
            value,
            entity,
            component,
        } => set_command(
            &input,
            &path,
            &value,
            entity.as_deref(),
            component.as_deref(),
            &settings,
        ),
        Commands::AddEntity {
            input,
            name,
            parent,
            folder,
            components,
        } => add_entity_command(
            &input,
            &name,
            parent.as_deref(),
            folder.as_deref(),
            &components,
            &settings,
        ),
        Commands::RemoveEntity { input, entity } => {
            remove_entity_command(&input, &entity, &settings)
        }
        Commands::Find {
            root,
            name,
            type_filter,
            pattern,
            id,
        } => find_command(
            &root,
            name.as_deref(),
            type_filter.as_deref(),
            pattern.as_deref(),
            id.as_deref(),
        ),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Open a file as a scene/prefab or a flat asset, depending on its header
fn open(path: &Path, settings: &Settings) -> Result<Opened> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let header = text.lines().next().unwrap_or_default().trim();
    debug!(path = %path.display(), header, "opening document");

    if DocumentKind::from_header(header).is_some() {
        let scene = SceneDocument::load(path)?
            .with_validation(settings.mode, settings.metadata.clone());
        Ok(Opened::Scene(scene))
    } else {
        Ok(Opened::Asset(AssetDocument::load(path)?))
    }
}

fn open_scene(path: &Path, settings: &Settings) -> Result<SceneDocument> {
    match open(path, settings)? {
        Opened::Scene(scene) => Ok(scene),
        Opened::Asset(asset) => bail!(
            "{} is a {} asset, not a scene or prefab",
            path.display(),
            asset.type_tag()
        ),
    }
}

fn inspect_command(input: &Path, settings: &Settings) -> Result<()> {
    match open(input, settings)? {
        Opened::Scene(scene) => {
            println!("{} {}", scene.kind().header_tag(), scene.id());
            println!("  Entities: {}", scene.entity_count());
            let mut visited = HashSet::new();
            for root in scene.root_entities() {
                print_entity(&scene, root.id(), 1, &mut visited);
            }
            let orphans: Vec<_> = scene
                .entities()
                .filter(|e| !visited.contains(e.id()))
                .collect();
            if !orphans.is_empty() {
                println!("  Unreferenced:");
                for entity in orphans {
                    println!("    {} [{}]", entity.name(), entity.id());
                }
            }
        }
        Opened::Asset(asset) => {
            println!("{} {}", asset.type_tag(), asset.id().unwrap_or_default());
            for (key, value) in asset.properties().iter() {
                let summary = match value {
                    PropertyValue::Scalar(token) => token.clone(),
                    PropertyValue::Map(map) => format!("{} entries", map.len()),
                    PropertyValue::List(items) => format!("{} items", items.len()),
                };
                println!("  {}: {}", key, summary);
            }
        }
    }
    Ok(())
}

fn print_entity(scene: &SceneDocument, id: &str, depth: usize, visited: &mut HashSet<String>) {
    if !visited.insert(id.to_string()) {
        return;
    }
    let Some(entity) = scene.entity(id) else {
        return;
    };

    let indent = "  ".repeat(depth);
    let folder = entity
        .folder()
        .map(|f| format!(" ({})", f))
        .unwrap_or_default();
    println!("{}{} [{}]{}", indent, entity.name(), entity.id(), folder);
    for component in entity.components() {
        println!("{}  - {}", indent, component.type_tag());
    }
    for child in scene.children(id) {
        print_entity(scene, child.id(), depth + 1, visited);
    }
}

fn get_command(
    input: &Path,
    path: &str,
    entity: Option<&str>,
    component: Option<&str>,
    settings: &Settings,
) -> Result<()> {
    let value = match open(input, settings)? {
        Opened::Scene(scene) => {
            let (Some(entity), Some(component)) = (entity, component) else {
                bail!("--entity and --component are required for scenes and prefabs");
            };
            let id = scene.resolve_entity(entity)?;
            scene.get::<PropertyValue>(&id, component, path)
        }
        Opened::Asset(asset) => asset.get::<PropertyValue>(path),
    };

    let Some(value) = value else {
        bail!("Property '{}' not found", path);
    };
    match &value {
        PropertyValue::Scalar(token) => println!("{}", token),
        other => {
            let mut out = String::new();
            let key = path.rsplit('.').next().unwrap_or(path);
            BlockWriter::new().write_entry(&mut out, 0, key, other);
            print!("{}", out);
        }
    }
    Ok(())
}

fn set_command(
    input: &Path,
    path: &str,
    value: &str,
    entity: Option<&str>,
    component: Option<&str>,
    settings: &Settings,
) -> Result<()> {
    let value = parse_scalar(value);
    match open(input, settings)? {
        Opened::Scene(mut scene) => {
            let (Some(entity), Some(component)) = (entity, component) else {
                bail!("--entity and --component are required for scenes and prefabs");
            };
            let id = scene.resolve_entity(entity)?;
            let current = scene.get::<String>(&id, component, path);
            scene.set(&id, component, path, keep_integer_shape(current, value))?;
            scene.save()?;
        }
        Opened::Asset(mut asset) => {
            let current = asset.get::<String>(path);
            asset.set(path, keep_integer_shape(current, value))?;
            asset.save()?;
        }
    }
    println!("Updated {} in {}", path, input.display());
    Ok(())
}

/// Numbers typed on the command line read as floats; a whole number written
/// over an integer token stays an integer
fn keep_integer_shape(current: Option<String>, value: Value) -> Value {
    match (current, &value) {
        (Some(token), Value::Float(f))
            if f.fract() == 0.0 && token.trim().parse::<i64>().is_ok() =>
        {
            debug!(%token, "keeping integer form of the replaced value");
            Value::Integer(*f as i64)
        }
        _ => value,
    }
}

fn add_entity_command(
    input: &Path,
    name: &str,
    parent: Option<&str>,
    folder: Option<&str>,
    components: &[String],
    settings: &Settings,
) -> Result<()> {
    let mut scene = open_scene(input, settings)?;

    let parent_id = match parent {
        Some(parent) if !parent.contains('/') => Some(scene.resolve_entity(parent)?),
        _ => None,
    };
    let placement = match (parent, parent_id.as_deref(), folder) {
        (_, Some(id), _) => Placement::Parent(id),
        (Some(path), None, _) => Placement::Path(path),
        (None, None, Some(folder)) => Placement::Folder(folder),
        (None, None, None) => Placement::Root,
    };

    let id = scene.create_entity(name, placement)?;
    for component in components {
        scene.add_component(&id, component)?;
    }
    scene.save()?;
    println!("Created {} [{}]", name, id);
    Ok(())
}

fn remove_entity_command(input: &Path, entity: &str, settings: &Settings) -> Result<()> {
    let mut scene = open_scene(input, settings)?;
    let id = scene.resolve_entity(entity)?;
    let removed = scene.remove_entity(&id)?;
    scene.save()?;
    println!("Removed {} [{}]", removed.name(), removed.id());
    Ok(())
}

fn find_command(
    root: &Path,
    name: Option<&str>,
    type_filter: Option<&str>,
    pattern: Option<&str>,
    id: Option<&str>,
) -> Result<()> {
    let index = ProjectIndex::scan(root)?;

    let found = match (name, pattern, id) {
        (Some(name), _, _) => index.find_all_by_name(name, type_filter),
        (None, Some(pattern), _) => index.find_by_pattern(pattern)?,
        (None, None, Some(id)) => index.find_by_id(id).into_iter().collect(),
        (None, None, None) => index
            .assets()
            .iter()
            .filter(|a| type_filter.is_none_or(|filter| a.matches_type(filter)))
            .collect(),
    };

    if found.is_empty() {
        println!("No assets found");
    }
    for asset in found {
        println!("{}  {}  {}", asset.id, asset.type_tag, asset.relative_path);
    }
    Ok(())
}
