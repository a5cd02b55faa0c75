//! Authoritative world state
//!
//! The object table and its supporting lifecycle collections: deferred
//! spawns waiting out their wind-up and lifetime timers for temporary
//! objects. The tick engine is the sole mutator; everything here is plain
//! data and deterministic helpers so the engine's dispatch code stays
//! focused on transport handling and tick sequencing.
//!
//! The lifetime map is shared (behind a mutex) with the event-bus
//! subscriber that zeroes an object's remaining lifetime when it collides
//! with world geometry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::info;

use shared::math::{Vec2, Vec3};
use shared::object::{
    collider_for, AttackType, Faction, ObjectData, ObjectId, ObjectState, ObjectType,
    ProjectileType,
};
use shared::{melee_spawn_offset, FAST_MELEE_SLASH_SECS, MAP_TILE_SIZE, PLAYER_BASE_SPEED};

use crate::rng::WorldRng;

/// Render-layer height every simulated object lives at
pub const OBJECT_Z: f32 = 20.0;

/// Map new players and the seed NPC start on
pub const STARTING_MAP: &str = "forest_1";

/// Tile the seed NPC stands on at server start
pub const SEED_NPC_TILE: (i32, i32) = (32, 32);

/// Half extent of the randomized player spawn zone around the map center
const SPAWN_ZONE_EXTENT: f32 = MAP_TILE_SIZE * 2.0;

/// Shared lifetime timers: object id to seconds remaining
pub type LifetimeMap = Arc<Mutex<HashMap<ObjectId, f32>>>;

/// An object committed to appear once its wind-up elapses
#[derive(Debug, Clone)]
pub struct PendingSpawn {
    pub object: ObjectData,
    pub spawn_in_secs: f32,
}

/// Object table plus lifecycle bookkeeping
pub struct GameWorld {
    pub objects: HashMap<ObjectId, ObjectData>,
    pub pending_spawns: Vec<PendingSpawn>,
    pub lifetimes: LifetimeMap,
    next_id: ObjectId,
}

impl GameWorld {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            pending_spawns: Vec::new(),
            lifetimes: Arc::new(Mutex::new(HashMap::new())),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Ids of live objects in ascending order, for deterministic ticks
    pub fn sorted_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Creates the initial NPC roster: one evil wanderer on the starting
    /// map moving at half player speed.
    pub fn seed_roster(&mut self, position: Vec3) -> ObjectId {
        let id = self.allocate_id();
        let mut npc = ObjectData::new_root(
            id,
            ObjectType::Npc,
            Faction::Evil,
            position,
            STARTING_MAP.to_string(),
        );
        npc.speed = PLAYER_BASE_SPEED / 2.0;
        npc.scale = 0.1;
        npc.action_timer = 3.0;

        info!("Seeded NPC {id} on {STARTING_MAP} at ({}, {})", position.x, position.y);
        self.objects.insert(id, npc);
        id
    }

    /// Creates a player object for a fresh connection
    pub fn spawn_player(&mut self, position: Vec3) -> ObjectId {
        let id = self.allocate_id();
        let mut player = ObjectData::new_root(
            id,
            ObjectType::Player,
            Faction::Good,
            position,
            STARTING_MAP.to_string(),
        );
        player.state = ObjectState::Running;
        player.speed = PLAYER_BASE_SPEED;
        player.scale = 0.1;

        self.objects.insert(id, player);
        id
    }

    /// Uniform position inside the starting zone
    pub fn random_spawn_position(rng: &mut WorldRng, zone_center: Vec2) -> Vec3 {
        Vec3::new(
            rng.range_f32(zone_center.x - SPAWN_ZONE_EXTENT, zone_center.x + SPAWN_ZONE_EXTENT),
            rng.range_f32(zone_center.y - SPAWN_ZONE_EXTENT, zone_center.y + SPAWN_ZONE_EXTENT),
            OBJECT_Z,
        )
    }

    /// Builds a melee hit volume for `attacker` and defers its spawn
    ///
    /// The object appears at the facing-specific offset from the attacker
    /// after `charge_secs`. Its lifetime is registered now but only starts
    /// counting once the object materializes into the table.
    pub fn queue_melee_attack(
        &mut self,
        attacker: &ObjectData,
        projectile_type: ProjectileType,
        charge_secs: f32,
    ) -> ObjectId {
        let id = self.allocate_id();
        let offset = melee_spawn_offset(attacker.facing);

        let attack = ObjectData {
            object_id: id,
            parent_id: attacker.object_id,
            object_type: ObjectType::Attack,
            attack_type: AttackType::Melee,
            projectile_type,
            position: attacker.position + Vec3::new(offset.x, offset.y, 0.0),
            velocity: Vec3::ZERO,
            speed: 0.0,
            facing: attacker.facing,
            state: ObjectState::Idle,
            faction: attacker.faction,
            collider: collider_for(ObjectType::Attack, AttackType::Melee),
            scale: 0.125,
            action_timer: 0.0,
            current_map: attacker.current_map.clone(),
        };

        self.lifetimes
            .lock()
            .expect("lifetime map poisoned")
            .insert(id, FAST_MELEE_SLASH_SECS);
        self.pending_spawns.push(PendingSpawn {
            object: attack,
            spawn_in_secs: charge_secs,
        });
        id
    }

    /// Drops every pending spawn parented to `attacker_id`, with their
    /// pre-registered lifetimes.
    pub fn cancel_attacks_from(&mut self, attacker_id: ObjectId) {
        let mut lifetimes = self.lifetimes.lock().expect("lifetime map poisoned");
        self.pending_spawns.retain(|pending| {
            if pending.object.parent_id == attacker_id {
                lifetimes.remove(&pending.object.object_id);
                false
            } else {
                true
            }
        });
    }

    /// Removes an object and its lifetime entry
    pub fn remove_object(&mut self, id: ObjectId) -> Option<ObjectData> {
        self.lifetimes
            .lock()
            .expect("lifetime map poisoned")
            .remove(&id);
        self.objects.remove(&id)
    }
}

impl Default for GameWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Quadtree entry for an object: (center, full size) of its scaled collider
pub fn object_aabb(object: &ObjectData) -> (Vec3, Vec3) {
    let half = object.collider.half_extents * object.scale;
    (
        object.position,
        Vec3::new(half.x * 2.0, half.y * 2.0, 1.0),
    )
}
