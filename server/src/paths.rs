//! Path ownership and line-of-sight checks
//!
//! The controller owns every object's current path (an ordered queue of
//! world waypoints consumed front to back) and the link to the A* worker
//! pool. At most one path exists per object. Requests go out through
//! [`PathController::find_path`]; finished searches are applied in batch by
//! [`PathController::update`] at the next tick boundary, any number of
//! ticks after the request.
//!
//! The waypoint table sits behind a mutex shared with the event bus
//! subscriber that clears paths when their owner is destroyed; all access
//! still happens on the simulation thread, the lock just satisfies the
//! borrow checker across the bus boundary.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use shared::math::{Vec2, Vec3};
use shared::navmap::Navmap;
use shared::object::{ObjectData, ObjectId};

use crate::path_pool::{PathTask, PathWorkerPool, DEFAULT_WORKERS};

/// Shared waypoint table; keyed by owner, queue front is the next step
pub type PathStore = Arc<Mutex<HashMap<ObjectId, VecDeque<Vec3>>>>;

/// Owns per-object paths and feeds the worker pool
pub struct PathController {
    paths: PathStore,
    pool: PathWorkerPool,
}

impl PathController {
    pub fn new(worker_count: usize) -> Self {
        Self {
            paths: Arc::new(Mutex::new(HashMap::new())),
            pool: PathWorkerPool::new(worker_count),
        }
    }

    /// Clone of the shared waypoint table, for the object-destroyed
    /// subscriber.
    pub fn store(&self) -> PathStore {
        Arc::clone(&self.paths)
    }

    /// Queues an asynchronous path search for `object_id`
    ///
    /// The result replaces the object's path once it is drained by
    /// [`update`](Self::update); until then the existing path stays in
    /// effect.
    pub fn find_path(
        &self,
        object_id: ObjectId,
        start: Vec3,
        target: Vec3,
        map_origin: Vec2,
        navmap: &Arc<Navmap>,
    ) {
        self.pool.submit(PathTask {
            object_id,
            start,
            target,
            map_origin,
            navmap: Arc::clone(navmap),
        });
    }

    /// Drains every currently available worker result
    ///
    /// Non-empty paths replace whatever the object had. Empty results
    /// (unreachable target, or start and target on the same tile) are
    /// ignored so a previous path survives. Results for ids that
    /// `is_live` rejects are stale (their owner died while the search ran)
    /// and are dropped silently.
    pub fn update(&mut self, is_live: impl Fn(ObjectId) -> bool) {
        while let Some(result) = self.pool.try_recv_result() {
            if result.waypoints.is_empty() || !is_live(result.object_id) {
                continue;
            }
            self.paths
                .lock()
                .expect("path store poisoned")
                .insert(result.object_id, result.waypoints);
        }
    }

    pub fn has_path(&self, object_id: ObjectId) -> bool {
        self.paths
            .lock()
            .expect("path store poisoned")
            .contains_key(&object_id)
    }

    /// Next waypoint, if the object has a path
    pub fn front(&self, object_id: ObjectId) -> Option<Vec3> {
        self.paths
            .lock()
            .expect("path store poisoned")
            .get(&object_id)
            .and_then(|path| path.front().copied())
    }

    /// Pops the reached waypoint; returns true while waypoints remain.
    ///
    /// A path that runs out is removed entirely so `has_path` goes false in
    /// the same call.
    pub fn advance(&mut self, object_id: ObjectId) -> bool {
        let mut paths = self.paths.lock().expect("path store poisoned");
        let Some(path) = paths.get_mut(&object_id) else {
            return false;
        };
        path.pop_front();
        if path.is_empty() {
            paths.remove(&object_id);
            false
        } else {
            true
        }
    }

    /// Replaces the object's path with a single waypoint
    pub fn set_target(&mut self, object_id: ObjectId, target: Vec3) {
        let mut paths = self.paths.lock().expect("path store poisoned");
        let path = paths.entry(object_id).or_default();
        path.clear();
        path.push_back(target);
    }

    /// Appends a waypoint to the object's path, creating one if needed
    pub fn add_target(&mut self, object_id: ObjectId, target: Vec3) {
        self.paths
            .lock()
            .expect("path store poisoned")
            .entry(object_id)
            .or_default()
            .push_back(target);
    }

    pub fn clear_path(&mut self, object_id: ObjectId) {
        self.paths
            .lock()
            .expect("path store poisoned")
            .remove(&object_id);
    }

    /// Ids that currently own a path, in ascending order
    pub fn owners(&self) -> Vec<ObjectId> {
        let mut owners: Vec<ObjectId> = self
            .paths
            .lock()
            .expect("path store poisoned")
            .keys()
            .copied()
            .collect();
        owners.sort_unstable();
        owners
    }

    /// Copy of the object's waypoints for debug replies; empty when none
    pub fn path_snapshot(&self, object_id: ObjectId) -> Vec<Vec3> {
        self.paths
            .lock()
            .expect("path store poisoned")
            .get(&object_id)
            .map(|path| path.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for PathController {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

/// Ray-marched line-of-sight test between two objects
///
/// Samples the segment from `source` toward `target` in increments of half
/// the distance the source covers in one tick, and fails on the first
/// non-walkable tile. Targets closer than one tick's travel are always in
/// sight.
pub fn is_target_in_los(
    source: &ObjectData,
    target: &ObjectData,
    navmap: &Navmap,
    map_origin: Vec2,
    dt_ms: f32,
) -> bool {
    let to_target = target.position - source.position;
    let distance = to_target.length();
    let step = source.speed * dt_ms;

    if distance <= 0.0 || distance < step {
        return true;
    }

    let increment = step / 2.0;
    if increment <= 0.0 {
        // A motionless source cannot march the ray; nothing to sample.
        return true;
    }

    let direction = to_target.normalized();
    let sample_count = (distance / increment) as i32;
    for i in 0..sample_count {
        let probe = source.position + direction * (i as f32 * increment);
        if !navmap.is_walkable(navmap.world_to_tile(probe, map_origin)) {
            return false;
        }
    }
    true
}
