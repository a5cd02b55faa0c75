//! Map data repository
//!
//! Loads everything the simulation knows about the world's geography at
//! startup and serves it immutably afterwards: per-map rectangular extents
//! and four-way connections from the JSON manifest, walkability grids
//! decoded from the navmap textures, and one quadtree per map sized to the
//! map's world AABB.
//!
//! The quadtrees are the one mutable piece (cleared and refilled by the
//! tick engine every tick) so they sit behind mutexes; everything
//! else is plain shared data. Navmaps are handed out as `Arc<Navmap>` so
//! path tasks can hold them across worker threads.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::info;
use serde::Deserialize;

use shared::math::{Aabb, Vec2, Vec3};
use shared::navmap::{Navmap, TileKind};
use shared::object::MapName;
use shared::quadtree::Quadtree;
use shared::{MAP_GAME_SCALE, NAVMAP_SIZE};

use crate::error::ServerError;

/// Grayscale value below which a navmap pixel reads as solid
const SOLID_THRESHOLD: u8 = 128;

/// Z center of every map's quadtree volume
const QUADTREE_Z_CENTER: f32 = 20.0;

/// Z extent of every map's quadtree volume
const QUADTREE_Z_EXTENT: f32 = 1.0;

/// Index into a map's connection array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum ConnectionDir {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

/// Static description of one map
#[derive(Debug, Clone, PartialEq)]
pub struct MapMetadata {
    /// Manifest-space center; multiply by `MAP_GAME_SCALE` for world space
    pub center: Vec2,
    /// Manifest-space dimensions
    pub dimensions: Vec2,
    /// Neighbor names indexed by [`ConnectionDir`]; `None` where the
    /// manifest says "None"
    pub connections: [Option<MapName>; 4],
}

impl MapMetadata {
    /// Map center in world space
    pub fn world_origin(&self) -> Vec2 {
        self.center * MAP_GAME_SCALE
    }

    /// World-space AABB covered by this map
    pub fn world_aabb(&self) -> Aabb {
        Aabb::new(
            Vec3::new(
                self.center.x * MAP_GAME_SCALE,
                self.center.y * MAP_GAME_SCALE,
                QUADTREE_Z_CENTER,
            ),
            Vec3::new(
                self.dimensions.x * MAP_GAME_SCALE,
                self.dimensions.y * MAP_GAME_SCALE,
                QUADTREE_Z_EXTENT,
            ),
        )
    }

    pub fn east_edge(&self) -> f32 {
        self.center.x * MAP_GAME_SCALE + self.dimensions.x * MAP_GAME_SCALE / 2.0
    }

    pub fn west_edge(&self) -> f32 {
        self.center.x * MAP_GAME_SCALE - self.dimensions.x * MAP_GAME_SCALE / 2.0
    }

    pub fn north_edge(&self) -> f32 {
        self.center.y * MAP_GAME_SCALE + self.dimensions.y * MAP_GAME_SCALE / 2.0
    }

    pub fn south_edge(&self) -> f32 {
        self.center.y * MAP_GAME_SCALE - self.dimensions.y * MAP_GAME_SCALE / 2.0
    }

    pub fn connection(&self, dir: ConnectionDir) -> Option<&MapName> {
        self.connections[dir as usize].as_ref()
    }
}

struct MapEntry {
    metadata: MapMetadata,
    navmap: Arc<Navmap>,
    quadtree: Mutex<Quadtree>,
}

/// All loaded maps, immutable after construction (quadtrees excepted)
pub struct MapRepository {
    maps: HashMap<MapName, MapEntry>,
}

#[derive(Deserialize)]
struct ManifestTransform {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

#[derive(Deserialize)]
struct ManifestConnections {
    top: String,
    right: String,
    bottom: String,
    left: String,
}

#[derive(Deserialize)]
struct Manifest {
    map_transforms: HashMap<String, ManifestTransform>,
    map_connections: HashMap<String, ManifestConnections>,
}

/// Strips a trailing `.json` and treats the literal "None" as no neighbor
fn connection_name(raw: &str) -> Option<MapName> {
    let name = raw.strip_suffix(".json").unwrap_or(raw);
    if name == "None" {
        None
    } else {
        Some(name.to_string())
    }
}

impl MapRepository {
    /// Loads manifest, navmaps and quadtrees from the assets directory
    pub fn load(assets_dir: &Path) -> Result<Self, ServerError> {
        let metadata = load_manifest(assets_dir)?;
        let navmaps = load_navmaps(assets_dir, &metadata)?;

        if metadata.len() != navmaps.len() {
            return Err(ServerError::Config(format!(
                "manifest describes {} maps but {} navmaps were decoded",
                metadata.len(),
                navmaps.len()
            )));
        }

        let mut maps = HashMap::new();
        for (name, meta) in metadata {
            let navmap = navmaps.get(&name).ok_or_else(|| {
                ServerError::Config(format!("no navmap decoded for map '{name}'"))
            })?;
            let quadtree = Mutex::new(Quadtree::new(meta.world_aabb()));
            maps.insert(
                name,
                MapEntry {
                    metadata: meta,
                    navmap: Arc::clone(navmap),
                    quadtree,
                },
            );
        }

        Ok(Self { maps })
    }

    /// Builds a repository from in-memory parts; used by tests and tooling
    /// that have no asset directory.
    pub fn from_parts(parts: Vec<(MapName, MapMetadata, Navmap)>) -> Self {
        let maps = parts
            .into_iter()
            .map(|(name, metadata, navmap)| {
                let quadtree = Mutex::new(Quadtree::new(metadata.world_aabb()));
                (
                    name,
                    MapEntry {
                        metadata,
                        navmap: Arc::new(navmap),
                        quadtree,
                    },
                )
            })
            .collect();
        Self { maps }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.maps.contains_key(name)
    }

    pub fn metadata(&self, name: &str) -> Option<&MapMetadata> {
        self.maps.get(name).map(|entry| &entry.metadata)
    }

    pub fn navmap(&self, name: &str) -> Option<&Arc<Navmap>> {
        self.maps.get(name).map(|entry| &entry.navmap)
    }

    pub fn quadtree(&self, name: &str) -> Option<&Mutex<Quadtree>> {
        self.maps.get(name).map(|entry| &entry.quadtree)
    }

    /// Map names in sorted order, for deterministic iteration
    pub fn map_names(&self) -> Vec<&MapName> {
        let mut names: Vec<&MapName> = self.maps.keys().collect();
        names.sort();
        names
    }

    /// Clears every map's quadtree; called at the top of each tick
    pub fn clear_quadtrees(&self) {
        for entry in self.maps.values() {
            entry.quadtree.lock().expect("quadtree poisoned").clear();
        }
    }
}

fn load_manifest(assets_dir: &Path) -> Result<HashMap<MapName, MapMetadata>, ServerError> {
    let manifest_path = assets_dir.join("map_global_data.json");
    let raw = std::fs::read_to_string(&manifest_path).map_err(|e| {
        ServerError::Config(format!("cannot read {}: {e}", manifest_path.display()))
    })?;
    let manifest: Manifest = serde_json::from_str(&raw).map_err(|e| {
        ServerError::Config(format!("cannot parse {}: {e}", manifest_path.display()))
    })?;

    let mut metadata = HashMap::new();
    for (file_name, transform) in &manifest.map_transforms {
        let name = file_name
            .strip_suffix(".json")
            .unwrap_or(file_name)
            .to_string();

        let connections = manifest.map_connections.get(file_name).ok_or_else(|| {
            ServerError::Config(format!("manifest has no connections for '{file_name}'"))
        })?;

        metadata.insert(
            name,
            MapMetadata {
                center: Vec2::new(transform.x, transform.y),
                dimensions: Vec2::new(transform.width, transform.height),
                connections: [
                    connection_name(&connections.top),
                    connection_name(&connections.right),
                    connection_name(&connections.bottom),
                    connection_name(&connections.left),
                ],
            },
        );
    }

    info!("Loaded map metadata for {} maps.", metadata.len());
    Ok(metadata)
}

fn load_navmaps(
    assets_dir: &Path,
    metadata: &HashMap<MapName, MapMetadata>,
) -> Result<HashMap<MapName, Arc<Navmap>>, ServerError> {
    let navmap_dir = assets_dir.join("navmaps");
    let entries = std::fs::read_dir(&navmap_dir).map_err(|e| {
        ServerError::Config(format!("cannot read {}: {e}", navmap_dir.display()))
    })?;

    let mut navmaps = HashMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| ServerError::Config(format!("directory walk failed: {e}")))?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(map_name) = file_name.strip_suffix("_navmap.png") else {
            continue;
        };

        let meta = metadata.get(map_name).ok_or_else(|| {
            ServerError::Config(format!(
                "navmap '{file_name}' has no manifest entry for map '{map_name}'"
            ))
        })?;

        let navmap = decode_navmap(&entry.path(), meta)?;
        navmaps.insert(map_name.to_string(), Arc::new(navmap));
    }

    info!("Loaded navmap data for {} maps.", navmaps.len());
    Ok(navmaps)
}

fn decode_navmap(path: &Path, meta: &MapMetadata) -> Result<Navmap, ServerError> {
    let dynamic = image::open(path)
        .map_err(|e| ServerError::Config(format!("cannot decode {}: {e}", path.display())))?;
    let pixels = dynamic.to_rgba8();

    if pixels.width() as usize != NAVMAP_SIZE || pixels.height() as usize != NAVMAP_SIZE {
        return Err(ServerError::Config(format!(
            "{} is {}x{}, expected {NAVMAP_SIZE}x{NAVMAP_SIZE}",
            path.display(),
            pixels.width(),
            pixels.height()
        )));
    }

    // Image rows run north to south; the grid wants row 0 at the southern
    // edge, so the rows flip here.
    let mut tiles = vec![TileKind::Solid; NAVMAP_SIZE * NAVMAP_SIZE];
    for (x, y, pixel) in pixels.enumerate_pixels() {
        let grid_row = NAVMAP_SIZE - 1 - y as usize;
        tiles[grid_row * NAVMAP_SIZE + x as usize] = if pixel[0] < SOLID_THRESHOLD {
            TileKind::Solid
        } else {
            TileKind::Walkable
        };
    }

    let tile_width = meta.dimensions.x * MAP_GAME_SCALE / NAVMAP_SIZE as f32;
    let tile_height = meta.dimensions.y * MAP_GAME_SCALE / NAVMAP_SIZE as f32;
    Ok(Navmap::new(NAVMAP_SIZE, tile_width, tile_height, tiles))
}
