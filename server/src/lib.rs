//! # Authoritative tick server
//!
//! The server owns the ground truth for every simulated object (players,
//! roaming NPCs, melee hit volumes and projectiles) and for the world
//! geometry they move through. Clients submit their own kinematic state
//! and receive periodic world snapshots plus reliable lifecycle and combat
//! notifications.
//!
//! ## Architecture
//!
//! One simulation thread (the [`engine::Engine`] loop) is the sole mutator
//! of the object table, the quadtrees, the path map and the event bus. A
//! fixed pool of worker threads ([`path_pool`]) runs A* searches against
//! immutable navigation grids, sharing nothing with the simulation thread
//! except a blocking task queue and a non-blocking result queue. The
//! simulation thread itself never blocks: transport events are drained
//! under a one-millisecond budget and path results are collected with
//! non-blocking reads at each tick boundary.
//!
//! ## Module map
//!
//! - [`engine`]: the 40 Hz tick loop and message dispatch
//! - [`game`]: object table, deferred spawns, lifetime timers
//! - [`updater`]: per-tick ATTACK/NPC behavior and the NPC state machine
//! - [`paths`] / [`path_pool`] / [`pathfind`]: path ownership, the worker
//!   pool, and the A* search itself
//! - [`maps`]: manifest, navmaps and per-map quadtrees
//! - [`events`]: the typed publish/subscribe bus
//! - [`network`] / [`peers`]: transport contract, UDP adapter, peer table
//! - [`rng`], [`error`]: seedable randomness and fatal error kinds

pub mod engine;
pub mod error;
pub mod events;
pub mod game;
pub mod maps;
pub mod network;
pub mod path_pool;
pub mod pathfind;
pub mod paths;
pub mod peers;
pub mod rng;
pub mod updater;
