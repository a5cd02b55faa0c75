//! Authoritative object model
//!
//! Every simulated thing in the world (connected players, roaming NPCs,
//! melee hit-volumes and projectiles) is one `ObjectData` record. The
//! struct is the unit of both simulation and replication: the server mutates
//! these records each tick and broadcasts them verbatim as snapshots, so the
//! layout is part of the wire protocol.

use serde::{Deserialize, Serialize};

use crate::math::{Collider, Facing, Vec3};

/// Object identifier; positive, unique for the lifetime of the process
pub type ObjectId = u32;

/// Sentinel meaning "no object", used e.g. for collisions with geometry
pub const NO_OBJECT: ObjectId = 0;

/// Map identifier, e.g. `"forest_1"`
pub type MapName = String;

/// Coarse object category driving per-tick behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    Player,
    Npc,
    Attack,
    Static,
}

/// Attack delivery mode; `None` for anything that is not an attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackType {
    None,
    Melee,
    Projectile,
}

/// Projectile flavor, relevant only when `attack_type == Projectile`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileType {
    None,
    Fireball,
}

/// Animation/behavior state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectState {
    Idle,
    Running,
    MeleeAttack,
}

/// Aggro-eligibility tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Faction {
    Good,
    Evil,
    Neutral,
}

/// Complete state of one simulated object
///
/// Invariants maintained by the server:
/// - `parent_id` equals `object_id` for root objects and names the spawning
///   object for attacks; referents may die later, so lookups must treat a
///   missing parent as "gone".
/// - `object_type == Attack` implies `attack_type != None`.
/// - `speed` is non-negative and expressed in world units per millisecond.
/// - `collider` is derived from the type pair at creation and never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectData {
    /// Positive, unique for the process lifetime; 0 means "no object"
    pub object_id: ObjectId,

    /// Own id for root objects; the spawning object's id for attacks
    ///
    /// The referent can die while this object lives, so consumers look it
    /// up by id and treat a miss as "parent gone".
    pub parent_id: ObjectId,

    pub object_type: ObjectType,
    pub attack_type: AttackType,
    pub projectile_type: ProjectileType,

    /// World position; x east, y north, z is the render layer
    pub position: Vec3,

    /// Displacement applied this tick, not a rate; recomputed every update
    pub velocity: Vec3,

    /// Movement rate in world units per millisecond
    pub speed: f32,

    /// Eight-way heading used by animation and melee spawn offsets
    pub facing: Facing,

    pub state: ObjectState,

    /// Aggro-eligibility tag; NEUTRAL objects neither attack nor get
    /// attacked by NPCs
    pub faction: Faction,

    /// Collision volume; derived from the type pair at creation
    pub collider: Collider,

    /// Multiplier applied to the collider's half extents
    pub scale: f32,

    /// Countdown in seconds gating the next idle/attack decision
    pub action_timer: f32,

    /// Name of the map this object currently lives on
    pub current_map: MapName,
}

/// Deterministic collider assignment per object category
///
/// Players, NPCs and static props use a unit rect scaled by the object's
/// scale; attack volumes (melee slashes and projectiles) use a circle.
pub fn collider_for(object_type: ObjectType, attack_type: AttackType) -> Collider {
    match (object_type, attack_type) {
        (ObjectType::Attack, _) => Collider::circle(0.5),
        (_, _) => Collider::rect(0.5, 0.5),
    }
}

impl ObjectData {
    /// Creates a root object (its own parent) with the collider derived
    /// from the type pair and everything else at rest.
    pub fn new_root(
        object_id: ObjectId,
        object_type: ObjectType,
        faction: Faction,
        position: Vec3,
        current_map: MapName,
    ) -> Self {
        Self {
            object_id,
            parent_id: object_id,
            object_type,
            attack_type: AttackType::None,
            projectile_type: ProjectileType::None,
            position,
            velocity: Vec3::ZERO,
            speed: 0.0,
            facing: Facing::South,
            state: ObjectState::Idle,
            faction,
            collider: collider_for(object_type, AttackType::None),
            scale: 1.0,
            action_timer: 0.0,
            current_map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::ColliderShape;

    #[test]
    fn attacks_get_circle_colliders() {
        assert_eq!(
            collider_for(ObjectType::Attack, AttackType::Melee).shape,
            ColliderShape::Circle
        );
        assert_eq!(
            collider_for(ObjectType::Attack, AttackType::Projectile).shape,
            ColliderShape::Circle
        );
    }

    #[test]
    fn actors_get_rect_colliders() {
        for object_type in [ObjectType::Player, ObjectType::Npc, ObjectType::Static] {
            assert_eq!(
                collider_for(object_type, AttackType::None).shape,
                ColliderShape::Rect
            );
        }
    }

    #[test]
    fn root_objects_are_their_own_parent() {
        let obj = ObjectData::new_root(
            7,
            ObjectType::Npc,
            Faction::Evil,
            Vec3::new(1.0, 2.0, 20.0),
            "forest_1".to_string(),
        );
        assert_eq!(obj.parent_id, obj.object_id);
        assert_eq!(obj.attack_type, AttackType::None);
        assert_eq!(obj.facing, Facing::South);
        assert_eq!(obj.velocity, Vec3::ZERO);
    }
}
