//! Per-tick object behavior
//!
//! Advances the two authoritative object categories each tick: ATTACK
//! objects (projectile integration and geometry collisions) and NPCs (the
//! idle/loiter/aggro/chase/melee state machine). Players are client-driven
//! and pass through untouched; the engine only snapshots them.
//!
//! The updater owns the path controller and the NPC target table. Both sit
//! behind shared handles so the object-destroyed subscription can clean
//! them synchronously while an event is being published: destroying an
//! object drops its path, its own target entry, and every entry that was
//! targeting it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::error;

use shared::math::{colliders_intersect, Facing, Vec2};
use shared::navmap::Navmap;
use shared::object::{MapName, ObjectData, ObjectId, ObjectState, ObjectType};
use shared::{
    AttackType, Faction, ProjectileType, Vec3, AGGRO_RANGE, NPC_ATTACK_ANIM_SECS,
    NPC_LOITER_SECS, NPC_PATH_RECALC_SECS,
};

use crate::events::{Event, EventBus, EventKind, ListenerHandle};
use crate::maps::{ConnectionDir, MapRepository};
use crate::paths::{is_target_in_los, PathController};
use crate::rng::WorldRng;

/// Chase bookkeeping for one NPC
#[derive(Debug, Clone, PartialEq)]
pub struct NpcTargetEntry {
    pub target_id: ObjectId,
    /// Seconds until the chase path is recomputed
    pub recalc_timer: f32,
}

type NpcTargetMap = Arc<Mutex<HashMap<ObjectId, NpcTargetEntry>>>;

/// Advances ATTACK and NPC objects; owns paths and NPC targets
pub struct ObjectUpdater {
    maps: Arc<MapRepository>,
    pub paths: PathController,
    npc_targets: NpcTargetMap,
    objects_by_map: HashMap<MapName, Vec<ObjectId>>,
    rng: WorldRng,
    _destroyed_subscription: ListenerHandle,
}

impl ObjectUpdater {
    /// Wires the updater to the bus: object destruction cascades into path
    /// and target-entry removal before the publish returns.
    pub fn new(
        maps: Arc<MapRepository>,
        paths: PathController,
        rng: WorldRng,
        bus: &mut EventBus,
    ) -> Self {
        let npc_targets: NpcTargetMap = Arc::new(Mutex::new(HashMap::new()));

        let path_store = paths.store();
        let targets = Arc::clone(&npc_targets);
        let destroyed_subscription = bus.subscribe(EventKind::ObjectDestroyed, move |event| {
            if let Event::ObjectDestroyed { object_id } = event {
                path_store
                    .lock()
                    .expect("path store poisoned")
                    .remove(object_id);
                let mut targets = targets.lock().expect("npc target map poisoned");
                targets.remove(object_id);
                targets.retain(|_, entry| entry.target_id != *object_id);
            }
        });

        Self {
            maps,
            paths,
            npc_targets,
            objects_by_map: HashMap::new(),
            rng,
            _destroyed_subscription: destroyed_subscription,
        }
    }

    /// Tick preamble: rebuilds the per-map object index from scratch and
    /// applies every path result the workers have produced so far.
    pub fn pre_update(&mut self, objects: &HashMap<ObjectId, ObjectData>) {
        self.objects_by_map.clear();
        let mut ids: Vec<ObjectId> = objects.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            self.objects_by_map
                .entry(objects[&id].current_map.clone())
                .or_default()
                .push(id);
        }

        self.paths.update(|id| {
            objects
                .get(&id)
                .map_or(false, |o| o.object_type == ObjectType::Npc)
        });
    }

    /// Advances one object; `others` is the object table minus `object`
    pub fn update(
        &mut self,
        object: &mut ObjectData,
        others: &HashMap<ObjectId, ObjectData>,
        dt_ms: f32,
        bus: &mut EventBus,
    ) {
        match object.object_type {
            ObjectType::Attack => self.update_attack(object, dt_ms, bus),
            ObjectType::Npc => self.update_npc(object, others, dt_ms, bus),
            ObjectType::Player => {
                // Players are client-driven; the server only re-homes them
                // when their reported position crosses a map edge.
                if self.check_for_map_change(object, bus) {
                    self.paths.clear_path(object.object_id);
                }
            }
            ObjectType::Static => {}
        }
    }

    /// Chase entry for one NPC, if any
    pub fn npc_target(&self, npc_id: ObjectId) -> Option<NpcTargetEntry> {
        self.npc_targets
            .lock()
            .expect("npc target map poisoned")
            .get(&npc_id)
            .cloned()
    }

    fn update_attack(&mut self, object: &mut ObjectData, dt_ms: f32, bus: &mut EventBus) {
        object.position += object.velocity * dt_ms;

        let Some(navmap) = self.maps.navmap(&object.current_map) else {
            error!(
                "Object {} is on unknown map '{}'; skipping update",
                object.object_id, object.current_map
            );
            return;
        };
        let origin = self
            .maps
            .metadata(&object.current_map)
            .expect("navmap without metadata")
            .world_origin();

        if object.attack_type == AttackType::Projectile
            && !navmap.is_walkable(navmap.world_to_tile(object.position, origin))
        {
            bus.publish(Event::NetworkObjectCollision {
                lhs: object.object_id,
                rhs: shared::NO_OBJECT,
            });
        }

        self.check_for_map_change(object, bus);
    }

    fn update_npc(
        &mut self,
        object: &mut ObjectData,
        others: &HashMap<ObjectId, ObjectData>,
        dt_ms: f32,
        bus: &mut EventBus,
    ) {
        object.velocity = Vec3::ZERO;

        let Some(navmap) = self.maps.navmap(&object.current_map).cloned() else {
            error!(
                "NPC {} is on unknown map '{}'; skipping update",
                object.object_id, object.current_map
            );
            return;
        };
        let origin = self
            .maps
            .metadata(&object.current_map)
            .expect("navmap without metadata")
            .world_origin();

        match object.state {
            ObjectState::Running => {
                // Reserved chase-only state; currently falls straight back.
                object.state = ObjectState::Idle;
            }
            ObjectState::MeleeAttack => {
                self.update_melee(object, others, bus, &navmap, origin);
            }
            ObjectState::Idle => {
                if self.paths.has_path(object.object_id) {
                    self.follow_path(object, others, dt_ms, bus, &navmap, origin);
                } else if let Some(target_id) =
                    self.find_valid_target(object, others, &navmap, origin, dt_ms)
                {
                    self.acquire_target(object, others, target_id, bus, &navmap, origin);
                } else {
                    // The loiter branch owns its timer: a timer expiring
                    // this tick must loiter this tick.
                    self.loiter(object, &navmap, origin, dt_ms);
                    return;
                }
            }
        }

        object.action_timer -= dt_ms / 1000.0;
    }

    /// First hostile candidate on this NPC's map that is alive, in aggro
    /// range and in line of sight. Neutral NPCs never aggro.
    fn find_valid_target(
        &self,
        object: &ObjectData,
        others: &HashMap<ObjectId, ObjectData>,
        navmap: &Navmap,
        origin: Vec2,
        dt_ms: f32,
    ) -> Option<ObjectId> {
        if object.faction == Faction::Neutral {
            return None;
        }

        for &candidate_id in self.objects_by_map.get(&object.current_map)? {
            if candidate_id == object.object_id {
                continue;
            }
            let Some(candidate) = others.get(&candidate_id) else {
                continue;
            };
            if !matches!(candidate.object_type, ObjectType::Player | ObjectType::Npc) {
                continue;
            }
            if candidate.faction == object.faction {
                continue;
            }
            if (candidate.position - object.position).length() > AGGRO_RANGE {
                continue;
            }
            if !is_target_in_los(object, candidate, navmap, origin, dt_ms) {
                continue;
            }
            return Some(candidate_id);
        }
        None
    }

    fn acquire_target(
        &mut self,
        object: &mut ObjectData,
        others: &HashMap<ObjectId, ObjectData>,
        target_id: ObjectId,
        bus: &mut EventBus,
        navmap: &Arc<Navmap>,
        origin: Vec2,
    ) {
        let Some(target) = others.get(&target_id) else {
            return;
        };

        self.npc_targets
            .lock()
            .expect("npc target map poisoned")
            .insert(
                object.object_id,
                NpcTargetEntry {
                    target_id,
                    recalc_timer: NPC_PATH_RECALC_SECS,
                },
            );

        object.facing = Facing::from_vec((target.position - object.position).xy());
        bus.publish(Event::NpcAggro {
            npc_id: object.object_id,
            target_id,
        });
        self.paths.find_path(
            object.object_id,
            object.position,
            target.position,
            origin,
            navmap,
        );
    }

    /// Idle wandering: every five seconds pick one of the eight neighbor
    /// tiles at random and walk there if it is open.
    fn loiter(&mut self, object: &mut ObjectData, navmap: &Navmap, origin: Vec2, dt_ms: f32) {
        object.action_timer -= dt_ms / 1000.0;
        if object.action_timer >= 0.0 {
            return;
        }
        object.action_timer = NPC_LOITER_SECS;

        let direction = Facing::ALL[self.rng.index(Facing::ALL.len())];
        let (d_col, d_row) = direction.grid_step();
        let next_tile = navmap
            .world_to_tile(object.position, origin)
            .offset(d_col, d_row);

        if navmap.is_walkable(next_tile) {
            object.facing = direction;
            let target = navmap.tile_to_world(next_tile, origin, object.position.z);
            self.paths.set_target(object.object_id, target);
        }
    }

    /// Swing gate while in MELEE_ATTACK: keep swinging while the target
    /// stays in contact, otherwise fall back to IDLE (re-requesting a chase
    /// path if the target merely slipped out of reach).
    fn update_melee(
        &mut self,
        object: &mut ObjectData,
        others: &HashMap<ObjectId, ObjectData>,
        bus: &mut EventBus,
        navmap: &Arc<Navmap>,
        origin: Vec2,
    ) {
        if object.action_timer >= 0.0 {
            return;
        }

        let entry = self.npc_target(object.object_id);
        let Some(entry) = entry else {
            object.state = ObjectState::Idle;
            return;
        };

        let Some(target) = others.get(&entry.target_id) else {
            // Dangling target entry; treat as target gone.
            object.state = ObjectState::Idle;
            return;
        };

        let in_contact = colliders_intersect(
            object.position.xy(),
            object.scale,
            &object.collider,
            target.position.xy(),
            target.scale,
            &target.collider,
        );

        if in_contact {
            bus.publish(Event::NpcAttack {
                npc_id: object.object_id,
                attack_type: AttackType::Melee,
                projectile_type: ProjectileType::None,
            });
            object.action_timer = NPC_ATTACK_ANIM_SECS;
        } else {
            object.state = ObjectState::Idle;
            self.paths.find_path(
                object.object_id,
                object.position,
                target.position,
                origin,
                navmap,
            );
        }
    }

    fn follow_path(
        &mut self,
        object: &mut ObjectData,
        others: &HashMap<ObjectId, ObjectData>,
        dt_ms: f32,
        bus: &mut EventBus,
        navmap: &Arc<Navmap>,
        origin: Vec2,
    ) {
        let Some(waypoint) = self.paths.front(object.object_id) else {
            return;
        };

        let to_waypoint = waypoint - object.position;
        let distance = to_waypoint.length();
        let step = object.speed * dt_ms;

        if distance > step {
            object.velocity = to_waypoint.normalized() * step;
            object.position += object.velocity;
        } else {
            object.position = waypoint;
            object.velocity = Vec3::ZERO;
            if !self.paths.advance(object.object_id) {
                object.state = ObjectState::Idle;
            }
        }
        object.facing = Facing::from_vec(to_waypoint.xy());

        if let Some(entry) = self.npc_target(object.object_id) {
            let target = others.get(&entry.target_id);
            let in_contact = target.map_or(false, |t| {
                colliders_intersect(
                    object.position.xy(),
                    object.scale,
                    &object.collider,
                    t.position.xy(),
                    t.scale,
                    &t.collider,
                )
            });

            if object.action_timer < 0.0 && in_contact {
                bus.publish(Event::NpcAttack {
                    npc_id: object.object_id,
                    attack_type: AttackType::Melee,
                    projectile_type: ProjectileType::None,
                });
                object.action_timer = NPC_ATTACK_ANIM_SECS;
                object.state = ObjectState::MeleeAttack;
                self.paths.clear_path(object.object_id);
            } else {
                let mut request_path_to: Option<Vec3> = None;
                {
                    let mut targets = self.npc_targets.lock().expect("npc target map poisoned");
                    if let Some(entry) = targets.get_mut(&object.object_id) {
                        entry.recalc_timer -= dt_ms / 1000.0;
                        if entry.recalc_timer <= 0.0 {
                            entry.recalc_timer += NPC_PATH_RECALC_SECS;
                            request_path_to = target.map(|t| t.position);
                        }
                    }
                }
                if let Some(target_position) = request_path_to {
                    self.paths.find_path(
                        object.object_id,
                        object.position,
                        target_position,
                        origin,
                        navmap,
                    );
                }
            }
        }

        if self.check_for_map_change(object, bus) {
            self.paths.clear_path(object.object_id);
        }
    }

    /// Moves an object to the neighboring map when it crosses an edge
    ///
    /// Edge checks are mutually exclusive in east, west, north, south
    /// order; a missing ("None") connection leaves the map unchanged and
    /// reports no transition.
    pub fn check_for_map_change(&self, object: &mut ObjectData, bus: &mut EventBus) -> bool {
        let Some(meta) = self.maps.metadata(&object.current_map) else {
            return false;
        };

        let next = if object.position.x > meta.east_edge() {
            meta.connection(ConnectionDir::East)
        } else if object.position.x < meta.west_edge() {
            meta.connection(ConnectionDir::West)
        } else if object.position.y > meta.north_edge() {
            meta.connection(ConnectionDir::North)
        } else if object.position.y < meta.south_edge() {
            meta.connection(ConnectionDir::South)
        } else {
            None
        };

        match next {
            Some(next_map) => {
                let next_map = next_map.clone();
                object.current_map = next_map.clone();
                bus.publish(Event::MapChange { map_name: next_map });
                true
            }
            None => false,
        }
    }
}
