//! The tick engine
//!
//! Owns the world and drives it forward: drains transport events under a
//! one-millisecond service budget, advances the simulation at 40 Hz, and
//! broadcasts the results. The engine is generic over [`Transport`] so the
//! whole loop runs against the in-memory loopback in tests exactly as it
//! runs against UDP in production.
//!
//! Tick sequence, in order: clear every quadtree, run the updater preamble
//! (per-map index rebuild and path-result drain), advance each object and
//! decrement its lifetime, refill the quadtrees, materialize pending spawns
//! whose wind-up elapsed, retire expired objects, and finally broadcast one
//! unreliable state snapshot per object. Lifecycle messages (created,
//! destroyed, connected, disconnected) go out reliably the moment they
//! happen.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};

use shared::object::{ObjectData, ObjectId};
use shared::protocol::{decode, encode, Packet};
use shared::{AttackType, FAST_MELEE_CHARGE_SECS, TICK_INTERVAL_MS};

use crate::error::ServerError;
use crate::events::{Event, EventBus, EventKind, ListenerHandle};
use crate::game::{object_aabb, GameWorld, OBJECT_Z, SEED_NPC_TILE, STARTING_MAP};
use crate::maps::MapRepository;
use crate::network::{Channel, Transport, TransportEvent};
use crate::paths::PathController;
use crate::peers::PeerId;
use crate::rng::WorldRng;
use crate::updater::ObjectUpdater;

/// Transport service budget per loop iteration
const TRANSPORT_BUDGET: Duration = Duration::from_millis(1);

/// Authoritative simulation loop over a generic transport
pub struct Engine<T: Transport> {
    transport: T,
    maps: Arc<MapRepository>,
    bus: EventBus,
    updater: ObjectUpdater,
    world: GameWorld,
    peer_players: HashMap<PeerId, ObjectId>,
    to_remove: Vec<ObjectId>,
    last_tick_ms: u64,
    rng: WorldRng,
    _collision_subscription: ListenerHandle,
}

impl<T: Transport> Engine<T> {
    /// Builds the engine: seeds the NPC roster and wires the bus
    /// subscriptions (geometry collisions schedule immediate removal;
    /// object destruction cascades into path and target cleanup).
    pub fn new(transport: T, maps: Arc<MapRepository>, rng: WorldRng) -> Result<Self, ServerError> {
        let Some(navmap) = maps.navmap(STARTING_MAP) else {
            return Err(ServerError::Config(format!(
                "starting map '{STARTING_MAP}' is not in the repository"
            )));
        };
        let origin = maps
            .metadata(STARTING_MAP)
            .expect("navmap without metadata")
            .world_origin();

        let mut bus = EventBus::new();
        let mut world = GameWorld::new();

        let seed_position = navmap.tile_to_world(
            shared::TileCoord::new(SEED_NPC_TILE.0, SEED_NPC_TILE.1),
            origin,
            OBJECT_Z,
        );
        world.seed_roster(seed_position);

        // Anything that hits world geometry is gone at the end of the tick.
        let lifetimes = Arc::clone(&world.lifetimes);
        let collision_subscription =
            bus.subscribe(EventKind::NetworkObjectCollision, move |event| {
                if let Event::NetworkObjectCollision { lhs, rhs } = event {
                    if *rhs == shared::NO_OBJECT {
                        lifetimes
                            .lock()
                            .expect("lifetime map poisoned")
                            .insert(*lhs, 0.0);
                    }
                }
            });

        let updater = ObjectUpdater::new(
            Arc::clone(&maps),
            PathController::default(),
            rng.clone(),
            &mut bus,
        );

        let last_tick_ms = transport.now_ms();
        Ok(Self {
            transport,
            maps,
            bus,
            updater,
            world,
            peer_players: HashMap::new(),
            to_remove: Vec::new(),
            last_tick_ms,
            rng,
            _collision_subscription: collision_subscription,
        })
    }

    /// Main loop: service the transport, tick when due, otherwise yield
    pub async fn run(&mut self) -> Result<(), ServerError> {
        info!("Server started successfully");
        loop {
            self.service_transport();

            let now = self.transport.now_ms();
            if now.saturating_sub(self.last_tick_ms) >= TICK_INTERVAL_MS {
                self.tick(now);
            } else {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    }

    /// Drains transport events until empty or the 1 ms budget is spent
    pub fn service_transport(&mut self) {
        let began = Instant::now();
        while began.elapsed() < TRANSPORT_BUDGET {
            match self.transport.poll_event() {
                Some(event) => self.handle_transport_event(event),
                None => break,
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { peer } => self.on_peer_connected(peer),
            TransportEvent::Received { peer, data } => match decode(&data) {
                Ok(packet) => self.handle_packet(peer, packet),
                Err(e) => warn!("Dropping message from peer {peer}: {e}"),
            },
            TransportEvent::Disconnected { peer } => self.on_peer_disconnected(peer),
        }
    }

    fn on_peer_connected(&mut self, peer: PeerId) {
        let zone_center = self
            .maps
            .metadata(STARTING_MAP)
            .expect("starting map verified at construction")
            .world_origin();
        let position = GameWorld::random_spawn_position(&mut self.rng, zone_center);
        let object_id = self.world.spawn_player(position);
        self.peer_players.insert(peer, object_id);
        info!("Peer {peer} is now player object {object_id}");

        self.send_packet(peer, Channel::Reliable, &Packet::PlayerConnected { object_id });
        let object = self.world.objects[&object_id].clone();
        self.broadcast_packet(Channel::Reliable, &Packet::ObjectCreated { object });
    }

    fn on_peer_disconnected(&mut self, peer: PeerId) {
        let Some(object_id) = self.peer_players.remove(&peer) else {
            return;
        };
        info!("Peer {peer} disconnected; removing player object {object_id}");

        self.world.remove_object(object_id);
        self.bus.publish(Event::ObjectDestroyed { object_id });
        self.broadcast_packet(Channel::Reliable, &Packet::PlayerDisconnected { object_id });
    }

    fn handle_packet(&mut self, peer: PeerId, packet: Packet) {
        match packet {
            Packet::ObjectStateUpdate { object } => self.on_state_update(peer, object),
            Packet::BeginAttackRequest {
                attacker_id,
                attack_type,
                projectile_type,
            } => self.on_begin_attack(peer, attacker_id, attack_type, projectile_type),
            Packet::CancelAttack { attacker_id } => {
                self.world.cancel_attacks_from(attacker_id);
            }
            Packet::DebugGetQuadtreeRequest => self.on_debug_quadtree(peer),
            Packet::DebugGetObjectPathRequest { object_id } => {
                let waypoints = self.updater.paths.path_snapshot(object_id);
                self.send_packet(
                    peer,
                    Channel::Unreliable,
                    &Packet::DebugGetObjectPathResponse {
                        object_id,
                        waypoints,
                    },
                );
            }
            other => {
                warn!(
                    "Peer {peer} sent server-bound-invalid message {:?}; dropping",
                    other.message_type()
                );
            }
        }
    }

    /// Accepts a peer's self-reported state for its own object only
    fn on_state_update(&mut self, peer: PeerId, object: ObjectData) {
        let owned = self.peer_players.get(&peer);
        if owned != Some(&object.object_id) {
            warn!(
                "Peer {peer} sent a state update for object {} it does not own; dropping",
                object.object_id
            );
            return;
        }
        if !self.world.objects.contains_key(&object.object_id) {
            warn!(
                "State update for unknown object {}; dropping",
                object.object_id
            );
            return;
        }
        self.world.objects.insert(object.object_id, object);
    }

    fn on_begin_attack(
        &mut self,
        peer: PeerId,
        attacker_id: ObjectId,
        attack_type: AttackType,
        projectile_type: shared::ProjectileType,
    ) {
        if attack_type != AttackType::Melee {
            warn!("Peer {peer} requested unsupported attack type {attack_type:?}");
            self.send_packet(
                peer,
                Channel::Reliable,
                &Packet::BeginAttackResponse {
                    allowed: false,
                    attack_type,
                    attacker_id,
                    charge_secs: 0.0,
                    projectile_type,
                },
            );
            return;
        }

        let Some(attacker) = self.world.objects.get(&attacker_id).cloned() else {
            warn!("BeginAttackRequest for unknown attacker {attacker_id}; dropping");
            return;
        };

        self.world
            .queue_melee_attack(&attacker, projectile_type, FAST_MELEE_CHARGE_SECS);
        self.send_packet(
            peer,
            Channel::Reliable,
            &Packet::BeginAttackResponse {
                allowed: true,
                attack_type,
                attacker_id,
                charge_secs: FAST_MELEE_CHARGE_SECS,
                projectile_type,
            },
        );
    }

    fn on_debug_quadtree(&mut self, peer: PeerId) {
        let Some(&player_id) = self.peer_players.get(&peer) else {
            warn!("Quadtree debug request from peer {peer} with no player; dropping");
            return;
        };
        let Some(player) = self.world.objects.get(&player_id) else {
            return;
        };
        let rects = self
            .maps
            .quadtree(&player.current_map)
            .map(|tree| tree.lock().expect("quadtree poisoned").debug_rects())
            .unwrap_or_default();
        self.send_packet(
            peer,
            Channel::Reliable,
            &Packet::DebugGetQuadtreeResponse { rects },
        );
    }

    /// One simulation step at `now_ms`
    pub fn tick(&mut self, now_ms: u64) {
        let dt_ms = now_ms.saturating_sub(self.last_tick_ms) as f32;

        self.maps.clear_quadtrees();
        self.updater.pre_update(&self.world.objects);

        // Advance every object against a table that excludes it, then put
        // it back and index it under its (possibly new) map.
        for id in self.world.sorted_ids() {
            let Some(mut object) = self.world.objects.remove(&id) else {
                continue;
            };
            self.updater
                .update(&mut object, &self.world.objects, dt_ms, &mut self.bus);

            let expired = {
                let mut lifetimes = self.world.lifetimes.lock().expect("lifetime map poisoned");
                match lifetimes.get_mut(&id) {
                    Some(remaining) => {
                        *remaining -= dt_ms / 1000.0;
                        *remaining <= 0.0
                    }
                    None => false,
                }
            };
            if expired {
                self.to_remove.push(id);
            }

            self.insert_into_quadtree(id, &object);
            self.world.objects.insert(id, object);
        }

        // Materialize wind-ups that have elapsed.
        let mut ready = Vec::new();
        self.world.pending_spawns.retain_mut(|pending| {
            pending.spawn_in_secs -= dt_ms / 1000.0;
            if pending.spawn_in_secs <= 0.0 {
                ready.push(pending.object.clone());
                false
            } else {
                true
            }
        });
        for object in ready {
            let id = object.object_id;
            self.broadcast_packet(
                Channel::Reliable,
                &Packet::ObjectCreated {
                    object: object.clone(),
                },
            );
            self.insert_into_quadtree(id, &object);
            self.world.objects.insert(id, object);
        }

        // Retire everything whose lifetime ran out this tick.
        for object_id in std::mem::take(&mut self.to_remove) {
            self.broadcast_packet(Channel::Reliable, &Packet::ObjectDestroyed { object_id });
            self.bus.publish(Event::ObjectDestroyed { object_id });
            self.world.remove_object(object_id);
        }

        self.last_tick_ms = now_ms;

        // Unreliable full snapshot, one message per object.
        for id in self.world.sorted_ids() {
            let object = self.world.objects[&id].clone();
            self.broadcast_packet(Channel::Unreliable, &Packet::ObjectStateUpdate { object });
        }
    }

    fn insert_into_quadtree(&self, id: ObjectId, object: &ObjectData) {
        match self.maps.quadtree(&object.current_map) {
            Some(tree) => {
                let (center, size) = object_aabb(object);
                tree.lock().expect("quadtree poisoned").insert(id, center, size);
            }
            None => warn!(
                "Object {id} is on unknown map '{}'; not indexed this tick",
                object.current_map
            ),
        }
    }

    fn send_packet(&mut self, peer: PeerId, channel: Channel, packet: &Packet) {
        match encode(packet) {
            Ok(bytes) => self.transport.send(peer, channel, &bytes),
            Err(e) => warn!("Failed to encode {:?}: {e}", packet.message_type()),
        }
    }

    fn broadcast_packet(&mut self, channel: Channel, packet: &Packet) {
        match encode(packet) {
            Ok(bytes) => self.transport.broadcast(channel, &bytes),
            Err(e) => warn!("Failed to encode {:?}: {e}", packet.message_type()),
        }
    }

    // Accessors used by tests and diagnostics.

    pub fn world(&self) -> &GameWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut GameWorld {
        &mut self.world
    }

    pub fn updater(&self) -> &ObjectUpdater {
        &self.updater
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn peer_player(&self, peer: PeerId) -> Option<ObjectId> {
        self.peer_players.get(&peer).copied()
    }
}
