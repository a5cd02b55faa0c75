//! # Shared simulation library
//!
//! Data model and wire protocol shared between the authoritative tick
//! server and its clients: math primitives and colliders, the object model,
//! the tile-based navigation grid, the per-map quadtree, the versioned
//! message catalogue, and the gameplay constants both sides must agree on.
//!
//! Everything in this crate is deterministic and side-effect free; the
//! server crate owns all I/O, threading and randomness.

pub mod math;
pub mod navmap;
pub mod object;
pub mod protocol;
pub mod quadtree;

pub use math::{colliders_intersect, Aabb, Collider, ColliderShape, Facing, Vec2, Vec3};
pub use navmap::{Navmap, TileCoord, TileKind};
pub use object::{
    collider_for, AttackType, Faction, MapName, ObjectData, ObjectId, ObjectState, ObjectType,
    ProjectileType, NO_OBJECT,
};
pub use protocol::{decode, encode, MessageType, Packet, Version, WireError, PROTOCOL_VERSION};
pub use quadtree::Quadtree;

/// Global scalar applied to manifest map centers and dimensions to produce
/// world-space coordinates
pub const MAP_GAME_SCALE: f32 = 1.0;

/// Side length of every navmap grid, in tiles
pub const NAVMAP_SIZE: usize = 128;

/// World-space size of one navigation tile for the shipped 8x8 maps
pub const MAP_TILE_SIZE: f32 = 0.0625;

/// Distance inside which an NPC will acquire a hostile target
pub const AGGRO_RANGE: f32 = MAP_TILE_SIZE * 4.0;

/// Seconds an idle NPC waits between loiter steps
pub const NPC_LOITER_SECS: f32 = 5.0;

/// Seconds between NPC melee swings while a target stays in contact
pub const NPC_ATTACK_ANIM_SECS: f32 = 0.5;

/// Seconds between chase-path recalculations
pub const NPC_PATH_RECALC_SECS: f32 = 0.05;

/// Wind-up before a melee hit volume materializes
pub const FAST_MELEE_CHARGE_SECS: f32 = 0.3;

/// Lifetime of a materialized melee hit volume
pub const FAST_MELEE_SLASH_SECS: f32 = 0.3;

/// Player movement speed in world units per millisecond
pub const PLAYER_BASE_SPEED: f32 = 3.0e-4;

/// Simulation frequency
pub const TICK_RATE_HZ: u32 = 40;

/// Target interval between ticks
pub const TICK_INTERVAL_MS: u64 = 1000 / TICK_RATE_HZ as u64;

/// UDP port the server binds
pub const SERVER_PORT: u16 = 7777;

/// Transport peer limit
pub const MAX_PEERS: usize = 32;

/// Planar offset, relative to the attacker, at which a melee hit volume
/// spawns for a given facing; +y is north
///
/// Cardinal swings reach further on their axis than diagonal ones, matching
/// the client-side slash animations.
pub fn melee_spawn_offset(facing: Facing) -> Vec2 {
    let (dx, dy) = match facing {
        Facing::South => (0.0, -0.8),
        Facing::North => (0.0, 0.8),
        Facing::West => (-0.5, 0.0),
        Facing::East => (0.5, 0.0),
        Facing::NorthWest => (-0.3, 0.6),
        Facing::NorthEast => (0.3, 0.6),
        Facing::SouthWest => (-0.3, -0.6),
        Facing::SouthEast => (0.3, -0.6),
    };
    Vec2::new(dx * MAP_TILE_SIZE, dy * MAP_TILE_SIZE)
}
