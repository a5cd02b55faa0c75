//! A* worker pool
//!
//! A fixed set of OS threads that turn path tasks into path results. The
//! pool is wired to the simulation thread through two channels:
//!
//! - the task queue, where workers block on an empty queue
//!   (`crossbeam_channel::Receiver::recv`), shared by all workers so the
//!   next free one picks up the next task;
//! - the result queue, which the path controller drains without blocking
//!   (`try_recv`) once per tick.
//!
//! There is no cancellation protocol. A task for an object that dies before
//! its result lands still completes; the controller discards the stale
//! result by id lookup. Navmaps travel as `Arc<Navmap>`: they are built
//! once at startup and never mutated, so a clone of the handle is enough to
//! keep the grid alive for as long as any task or worker needs it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;

use shared::math::{Vec2, Vec3};
use shared::navmap::Navmap;
use shared::object::ObjectId;

use crate::pathfind;

/// Worker threads in the default pool
pub const DEFAULT_WORKERS: usize = 2;

/// One pathfinding request
pub struct PathTask {
    pub object_id: ObjectId,
    pub start: Vec3,
    pub target: Vec3,
    pub map_origin: Vec2,
    pub navmap: Arc<Navmap>,
}

/// One completed search; `waypoints` is empty for unreachable targets
pub struct PathResult {
    pub object_id: ObjectId,
    pub waypoints: VecDeque<Vec3>,
}

/// Handle to the worker pool held by the path controller
pub struct PathWorkerPool {
    task_tx: Sender<PathTask>,
    result_rx: Receiver<PathResult>,
    workers: Vec<JoinHandle<()>>,
}

impl PathWorkerPool {
    pub fn new(worker_count: usize) -> Self {
        let (task_tx, task_rx) = unbounded::<PathTask>();
        let (result_tx, result_rx) = unbounded::<PathResult>();

        let workers = (0..worker_count)
            .map(|index| {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                std::thread::Builder::new()
                    .name(format!("path-worker-{index}"))
                    .spawn(move || worker_loop(index, task_rx, result_tx))
                    .expect("failed to spawn path worker")
            })
            .collect();

        Self {
            task_tx,
            result_rx,
            workers,
        }
    }

    /// Queues a search; wakes one blocked worker.
    pub fn submit(&self, task: PathTask) {
        // Send can only fail once every worker has exited, which only
        // happens during shutdown; losing the task is fine then.
        let _ = self.task_tx.send(task);
    }

    /// Takes one finished result if any is ready; never blocks.
    pub fn try_recv_result(&self) -> Option<PathResult> {
        self.result_rx.try_recv().ok()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Default for PathWorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl Drop for PathWorkerPool {
    fn drop(&mut self) {
        // Closing the task channel unblocks every worker's recv; join so
        // in-flight searches finish before the navmaps can go away.
        let (closed_tx, _) = unbounded();
        drop(std::mem::replace(&mut self.task_tx, closed_tx));
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(index: usize, task_rx: Receiver<PathTask>, result_tx: Sender<PathResult>) {
    debug!("path worker {index} up");
    while let Ok(task) = task_rx.recv() {
        let waypoints = pathfind::astar(task.start, task.target, task.map_origin, &task.navmap);
        if result_tx
            .send(PathResult {
                object_id: task.object_id,
                waypoints,
            })
            .is_err()
        {
            break;
        }
    }
    debug!("path worker {index} down");
}
